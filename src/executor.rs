//! # Executor Module
//!
//! Runs commands requested by an EXECUTE directive, but only after the user
//! confirms them. Every outcome, including refusal and failure, is reported
//! as text so it can be appended to the assistant's reply.

use crate::config::ExecutorConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::io::{self, Write};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

/// Text recorded when the user declines a command.
pub const CANCELLED_MESSAGE: &str = "Command execution cancelled.";

/// Asks whether a command may run.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns `true` only if the user approved `command`.
    async fn confirm(&self, command: &str) -> Result<bool>;
}

/// Prompts on stdout and reads the answer from stdin.
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, command: &str) -> Result<bool> {
        let command = command.to_string();
        // stdin reads block, so keep them off the runtime to leave Ctrl+C responsive.
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            writeln!(stdout, "\nWould you like to execute this command: {}", command)?;
            write!(stdout, "Enter 'yes' to proceed or anything else to cancel: ")?;
            stdout.flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            Ok(input)
        })
        .await
        .map_err(io::Error::other)??;

        Ok(is_approval(&answer))
    }
}

/// Whether a typed answer approves execution.
pub fn is_approval(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Runs confirmed commands through a shell.
pub struct CommandExecutor {
    shell: String,
    timeout: Duration,
    max_output_bytes: usize,
    confirm: Box<dyn Confirm>,
}

impl CommandExecutor {
    /// Creates an executor from configuration and a confirmation source.
    pub fn new(config: &ExecutorConfig, confirm: Box<dyn Confirm>) -> Self {
        Self {
            shell: config.shell.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
            confirm,
        }
    }

    /// Asks for confirmation and, if granted, runs `command`.
    ///
    /// Returns the text to record as the command's output.
    pub async fn run(&self, command: &str) -> String {
        match self.confirm.confirm(command).await {
            Ok(true) => {}
            Ok(false) => {
                info!("User declined command: {}", command);
                return CANCELLED_MESSAGE.to_string();
            }
            Err(e) => return format!("Error executing command: {}", e),
        }

        match self.execute(command).await {
            Ok(output) => output,
            Err(reason) => format!("Error executing command: {}", reason),
        }
    }

    async fn execute(&self, command: &str) -> std::result::Result<String, String> {
        debug!("Running `{}` via {}", command, self.shell);

        let output_fut = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, output_fut).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                return Err(format!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            }
        };

        debug!("Command exited with {:?}", output.status.code());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            stdout.into_owned()
        };

        Ok(limit_output(text, self.max_output_bytes))
    }
}

fn limit_output(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let total = text.len();
    let mut truncated = truncate_utf8(&text, max_bytes).to_string();
    truncated.push_str(&format!("\n\n[Output truncated, {} bytes total]", total));
    truncated
}

/// Truncate a UTF-8 string at or before `max_bytes`, respecting char boundaries.
fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellChatError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Always(bool, Arc<AtomicUsize>);

    #[async_trait]
    impl Confirm for Always {
        async fn confirm(&self, _command: &str) -> Result<bool> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
        }
    }

    struct Broken;

    #[async_trait]
    impl Confirm for Broken {
        async fn confirm(&self, _command: &str) -> Result<bool> {
            Err(ShellChatError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed",
            )))
        }
    }

    fn executor(approve: bool) -> (CommandExecutor, Arc<AtomicUsize>) {
        let asked = Arc::new(AtomicUsize::new(0));
        let exec = CommandExecutor::new(
            &ExecutorConfig::default(),
            Box::new(Always(approve, asked.clone())),
        );
        (exec, asked)
    }

    #[test]
    fn test_is_approval() {
        assert!(is_approval("yes\n"));
        assert!(is_approval("YES"));
        assert!(is_approval("  Yes  \r\n"));
        assert!(!is_approval("y"));
        assert!(!is_approval("yes please"));
        assert!(!is_approval(""));
    }

    #[tokio::test]
    async fn test_declined_command_does_not_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let (exec, asked) = executor(false);

        let output = exec.run(&format!("touch {}", marker.display())).await;

        assert_eq!(output, CANCELLED_MESSAGE);
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_confirmed_command_returns_stdout() {
        let (exec, _) = executor(true);
        assert_eq!(exec.run("echo hello").await, "hello\n");
    }

    #[tokio::test]
    async fn test_falls_back_to_stderr_when_stdout_empty() {
        let (exec, _) = executor(true);
        assert_eq!(exec.run("echo oops 1>&2").await, "oops\n");
    }

    #[tokio::test]
    async fn test_stdout_preferred_over_stderr() {
        let (exec, _) = executor(true);
        assert_eq!(exec.run("echo out; echo err 1>&2").await, "out\n");
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let asked = Arc::new(AtomicUsize::new(0));
        let config = ExecutorConfig {
            timeout_secs: 1,
            ..ExecutorConfig::default()
        };
        let exec = CommandExecutor::new(&config, Box::new(Always(true, asked)));

        let output = exec.run("sleep 5").await;
        assert!(output.starts_with("Error executing command:"), "{}", output);
        assert!(output.contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_reported() {
        let asked = Arc::new(AtomicUsize::new(0));
        let config = ExecutorConfig {
            shell: "/nonexistent/shell".to_string(),
            ..ExecutorConfig::default()
        };
        let exec = CommandExecutor::new(&config, Box::new(Always(true, asked)));

        let output = exec.run("true").await;
        assert!(output.starts_with("Error executing command:"));
    }

    #[tokio::test]
    async fn test_confirm_failure_does_not_run() {
        let exec = CommandExecutor::new(&ExecutorConfig::default(), Box::new(Broken));
        let output = exec.run("echo hi").await;
        assert!(output.starts_with("Error executing command:"));
        assert!(output.contains("stdin closed"));
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let asked = Arc::new(AtomicUsize::new(0));
        let config = ExecutorConfig {
            max_output_bytes: 4,
            ..ExecutorConfig::default()
        };
        let exec = CommandExecutor::new(&config, Box::new(Always(true, asked)));

        let output = exec.run("printf abcdefgh").await;
        assert!(output.starts_with("abcd\n\n[Output truncated, 8 bytes total]"));
    }

    #[test]
    fn test_truncate_utf8_multibyte() {
        // '€' is 3 bytes in UTF-8
        let s = "€€";
        assert_eq!(truncate_utf8(s, 3), "€");
        assert_eq!(truncate_utf8(s, 4), "€");
        assert_eq!(truncate_utf8(s, 6), "€€");
    }
}
