//! # shellchat
//!
//! A command-line chat client for OpenAI-compatible APIs. Each invocation is
//! one turn: prior messages are loaded from a local context file, the new
//! message is sent, the reply is printed, and any `EXECUTE: <command>` the
//! model asks for is run only after the user confirms it.
//!
//! ```no_run
//! use shellchat::{ChatTurn, CommandExecutor, Config, ContextStore, RemoteLLMClient, StdinConfirm};
//!
//! #[tokio::main]
//! async fn main() -> shellchat::Result<()> {
//!     let config = Config::from_file("config.toml")?;
//!     let store = ContextStore::new(config.context_path(), config.context.max_messages);
//!     let executor = CommandExecutor::new(&config.executor, Box::new(StdinConfirm));
//!     let turn = ChatTurn::new(
//!         Box::new(RemoteLLMClient::new(config.llm.clone())),
//!         store,
//!         executor,
//!         config.system_prompt.clone(),
//!     );
//!     turn.run("How much disk space is free?", &mut std::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod executor;
pub mod llm;
pub mod session;

pub use chat::{ChatMessage, Role};
pub use config::Config;
pub use context::ContextStore;
pub use error::{Result, ShellChatError};
pub use executor::{CommandExecutor, Confirm, StdinConfirm};
pub use llm::{LLMProvider, RemoteLLMClient};
pub use session::{ChatTurn, TurnOutcome};
