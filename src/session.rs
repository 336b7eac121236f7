//! # Session Module
//!
//! A single chat turn: load the stored history, ask the model, offer to run
//! any requested command, then save the transcript.

use crate::chat::ChatMessage;
use crate::context::ContextStore;
use crate::directive;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::llm::LLMProvider;
use std::io::Write;
use tracing::info;

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The assistant reply as stored, including any appended command output.
    pub reply: String,
    /// The command output, if the reply requested a command.
    pub command_output: Option<String>,
}

impl TurnOutcome {
    /// The trailer printed after the reply when a command was handled.
    pub fn command_report(&self) -> Option<String> {
        self.command_output
            .as_ref()
            .map(|output| format!("\nCommand output:\n{}", output))
    }
}

/// Runs one request/response turn against a provider and a context file.
pub struct ChatTurn {
    provider: Box<dyn LLMProvider>,
    store: ContextStore,
    executor: CommandExecutor,
    system_prompt: String,
    stream: bool,
}

impl ChatTurn {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        store: ContextStore,
        executor: CommandExecutor,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            executor,
            system_prompt: system_prompt.into(),
            stream: false,
        }
    }

    /// Print the reply as it arrives instead of after it completes.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sends `message`, writing the reply to `out` before any confirmation prompt.
    ///
    /// Nothing is saved if the model call fails.
    pub async fn run<W: Write + Send>(&self, message: &str, out: &mut W) -> Result<TurnOutcome> {
        let history = self.store.load()?;
        info!("Starting turn with {} prior messages", history.len());

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history);
        messages.push(ChatMessage::user(message));

        let reply = if self.stream {
            let mut write_err = None;
            let mut on_chunk = |chunk: &str| {
                if write_err.is_none() {
                    if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
                        write_err = Some(e);
                    }
                }
            };
            let reply = self.provider.chat_stream(messages.clone(), &mut on_chunk).await?;
            if let Some(e) = write_err {
                return Err(e.into());
            }
            writeln!(out)?;
            reply
        } else {
            let reply = self.provider.chat(messages.clone()).await?;
            writeln!(out, "{}", reply.content)?;
            reply
        };
        out.flush()?;

        let mut content = reply.content;
        let mut command_output = None;

        if let Some(command) = directive::extract_command(&content) {
            info!("Reply requested command: {}", command);
            let output = self.executor.run(&command).await;
            content.push_str("\n\nCommand output:\n");
            content.push_str(&output);
            command_output = Some(output);
        }

        messages.push(ChatMessage::assistant(content.clone()));
        self.store.save(&messages[1..])?;

        Ok(TurnOutcome {
            reply: content,
            command_output,
        })
    }
}
