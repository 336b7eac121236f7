//! # Configuration Module
//!
//! Loads and saves the TOML configuration. Every field has a default, so a
//! missing file or a partial file is always usable.

use crate::error::{Result, ShellChatError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Instructions that teach the model the EXECUTE convention.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You can help users interact with their system through commands.
To execute a command, prefix it with 'EXECUTE: ' followed by the command.
Example: 'EXECUTE: ls -l'
Be cautious with system-modifying commands and always explain what a command will do before suggesting it.";

/// Placeholder written by `init`; treated as "no key configured".
pub const API_KEY_PLACEHOLDER: &str = "your-api-key-here";

/// The top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The system prompt sent ahead of the stored history.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Remote API settings.
    #[serde(default)]
    pub llm: LLMConfig,
    /// Command execution settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Context file settings.
    #[serde(default)]
    pub context: ContextConfig,
}

/// Settings for the remote chat-completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Settings for running confirmed commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

/// Settings for the context file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Path to the context file. `~` is expanded.
    #[serde(default = "default_context_path")]
    pub path: String,
    /// Keep at most this many stored messages (0 = unlimited).
    #[serde(default)]
    pub max_messages: usize,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_model_name() -> String {
    "grok-2-1212".to_string()
}

fn default_base_url() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

fn default_context_path() -> String {
    "~/.shellchat/context.json".to_string()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            base_url: default_base_url(),
            api_key: String::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            path: default_context_path(),
            max_messages: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            llm: LLMConfig::default(),
            executor: ExecutorConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ShellChatError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config: Config = toml::from_str(&content)?;
        config.llm.api_key = expand_env(&config.llm.api_key);
        Ok(config)
    }

    /// Loads the configuration, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            tracing::debug!(
                "No config at {}, using defaults",
                path.as_ref().display()
            );
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// A configuration suitable for writing out with `init`.
    pub fn new_default() -> Self {
        let mut config = Self::default();
        config.llm.api_key = API_KEY_PLACEHOLDER.to_string();
        config
    }

    /// Saves the configuration as TOML, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The default config location, `~/.shellchat/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let base = directories::BaseDirs::new().ok_or_else(|| {
            ShellChatError::ConfigError("Could not determine home directory".to_string())
        })?;
        Ok(base.home_dir().join(".shellchat").join("config.toml"))
    }

    /// The configured context file path with `~` expanded.
    pub fn context_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.context.path).into_owned())
    }

    /// Picks the API key: the explicit one if given, otherwise the configured one.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Result<String> {
        let key = explicit
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| self.llm.api_key.trim());

        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            return Err(ShellChatError::ConfigError(
                "API key not configured. Pass --api-key, set XAI_API_KEY, or edit the config file"
                    .to_string(),
            ));
        }
        Ok(key.to_string())
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}
