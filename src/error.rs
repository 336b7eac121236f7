//! # Error Module
//!
//! This module defines the error type used throughout shellchat and a
//! `Result` alias built on it.

use thiserror::Error;

/// The error type for shellchat.
#[derive(Error, Debug)]
pub enum ShellChatError {
    /// The configuration is missing something or could not be read.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The LLM API returned an error or an unusable response.
    #[error("LLM error: {0}")]
    LLMError(String),

    /// The context file could not be read or written.
    #[error("Context error: {0}")]
    ContextError(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An HTTP transport error.
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The TOML configuration could not be parsed.
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

/// A `Result` alias for shellchat operations.
pub type Result<T> = std::result::Result<T, ShellChatError>;
