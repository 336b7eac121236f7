//! # shellchat CLI
//!
//! Sends one message to the model, printing the reply and running any
//! confirmed EXECUTE directive. Also manages the config and context files.

use clap::{Parser, Subcommand};
use shellchat::{
    ChatTurn, CommandExecutor, Config, ContextStore, RemoteLLMClient, ShellChatError,
    StdinConfirm,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Chat with an LLM from the shell, with confirmed command execution.
#[derive(Parser)]
#[command(name = "shellchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.shellchat/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key for the chat-completions endpoint.
    #[arg(long, env = "XAI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Path to the context file holding the conversation.
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// Override the configured model.
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Print the reply as it streams in.
    #[arg(long, global = true)]
    stream: bool,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The message to send.
    message: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message (same as passing it directly).
    Ask {
        /// The message to send.
        message: String,
    },

    /// Initialize a new configuration file.
    Init {
        /// Where to write the file (default: ~/.shellchat/config.toml).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the stored conversation.
    History,

    /// Delete the stored conversation.
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let result = match &cli.command {
        Some(Commands::Init { output }) => init_config(output.clone()),
        Some(Commands::History) => show_history(&cli),
        Some(Commands::Clear) => clear_history(&cli),
        Some(Commands::Ask { message }) => ask(&cli, message).await,
        None => match &cli.message {
            Some(message) => ask(&cli, message).await,
            None => Err(ShellChatError::ConfigError(
                "No message given. Usage: shellchat <MESSAGE>".to_string(),
            )),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn config_path(cli: &Cli) -> shellchat::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_path(),
    }
}

fn load_config(cli: &Cli) -> shellchat::Result<Config> {
    let path = config_path(cli)?;
    if cli.config.is_some() {
        // An explicitly named file must exist.
        Config::from_file(&path)
    } else {
        Config::load_or_default(&path)
    }
}

fn context_store(cli: &Cli, config: &Config) -> ContextStore {
    let path = cli
        .context
        .clone()
        .unwrap_or_else(|| config.context_path());
    ContextStore::new(path, config.context.max_messages)
}

/// Runs one chat turn.
async fn ask(cli: &Cli, message: &str) -> shellchat::Result<()> {
    let mut config = load_config(cli)?;
    config.llm.api_key = config.resolve_api_key(cli.api_key.as_deref())?;
    if let Some(model) = &cli.model {
        config.llm.model_name = model.clone();
    }

    let turn = ChatTurn::new(
        Box::new(RemoteLLMClient::new(config.llm.clone())),
        context_store(cli, &config),
        CommandExecutor::new(&config.executor, Box::new(StdinConfirm)),
        config.system_prompt.clone(),
    )
    .with_streaming(cli.stream);

    let mut stdout = io::stdout();
    tokio::select! {
        outcome = turn.run(message, &mut stdout) => {
            if let Some(report) = outcome?.command_report() {
                println!("{}", report);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nConversation interrupted. Goodbye!");
            // A pending confirmation read would keep the runtime from shutting down.
            std::process::exit(0);
        }
    }

    Ok(())
}

/// Initializes a new configuration file.
fn init_config(output: Option<PathBuf>) -> shellchat::Result<()> {
    let output = match output {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if output.exists() {
        println!("Configuration file '{}' already exists!", output.display());
        print!("Overwrite? (y/N): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    Config::new_default().save(&output)?;

    println!("Created configuration file: {}", output.display());
    println!("\nNext steps:");
    println!("1. Edit {} and add your API key (or set XAI_API_KEY)", output.display());
    println!("2. Run: shellchat \"what is using the most disk space?\"");

    Ok(())
}

/// Prints the stored conversation.
fn show_history(cli: &Cli) -> shellchat::Result<()> {
    let config = load_config(cli)?;
    let store = context_store(cli, &config);
    let messages = store.load()?;

    if messages.is_empty() {
        println!("No conversation stored at {}", store.path().display());
        return Ok(());
    }

    for (i, msg) in messages.iter().enumerate() {
        println!("{}. {}: {}", i + 1, msg.role, msg.content);
    }
    Ok(())
}

/// Deletes the stored conversation.
fn clear_history(cli: &Cli) -> shellchat::Result<()> {
    let config = load_config(cli)?;
    let store = context_store(cli, &config);

    if store.clear()? {
        println!("Cleared {}", store.path().display());
    } else {
        println!("Nothing to clear at {}", store.path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["shellchat", "ask", "--stream", "-m", "grok-beta", "hi"])
            .unwrap();
        assert!(cli.stream);
        assert_eq!(cli.model.as_deref(), Some("grok-beta"));
        assert!(matches!(cli.command, Some(Commands::Ask { ref message }) if message == "hi"));
    }

    #[test]
    fn test_positional_message() {
        let cli = Cli::try_parse_from(["shellchat", "--stream", "list my files"]).unwrap();
        assert!(cli.stream);
        assert!(cli.command.is_none());
        assert_eq!(cli.message.as_deref(), Some("list my files"));
    }

    #[test]
    fn test_context_override_wins_over_config() {
        let cli = Cli::try_parse_from(["shellchat", "--context", "/tmp/ctx.json", "history"])
            .unwrap();
        let store = context_store(&cli, &Config::default());
        assert_eq!(store.path(), std::path::Path::new("/tmp/ctx.json"));
    }
}
