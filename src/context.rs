//! # Context Module
//!
//! Persists the conversation to a JSON array of role/content pairs. The file
//! never holds the system prompt; it is prepended fresh on every turn.

use crate::chat::ChatMessage;
use crate::error::{Result, ShellChatError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Reads and writes the context file.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
    max_messages: usize,
}

impl ContextStore {
    /// Creates a store for `path`. `max_messages` of 0 keeps everything.
    pub fn new(path: impl Into<PathBuf>, max_messages: usize) -> Self {
        Self {
            path: path.into(),
            max_messages,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads prior messages. A missing or unparseable file yields an empty history.
    pub fn load(&self) -> Result<Vec<ChatMessage>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Context file {} not found, starting fresh", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ShellChatError::ContextError(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&content) {
            Ok(messages) => {
                debug!("Loaded {} messages from {}", messages.len(), self.path.display());
                Ok(messages)
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed context file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Writes `messages`, trimmed to the most recent `max_messages` when set.
    pub fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        let start = if self.max_messages > 0 {
            messages.len().saturating_sub(self.max_messages)
        } else {
            0
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let write_err = |e: std::io::Error| {
            ShellChatError::ContextError(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            ))
        };

        // Write beside the target and rename over it so a crash never leaves a partial file.
        let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
        serde_json::to_writer(&mut file, &messages[start..])?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(
            "Saved {} messages to {}",
            messages.len() - start,
            self.path.display()
        );
        Ok(())
    }

    /// Deletes the context file. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
