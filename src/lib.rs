//! Kuzco - a terminal assistant for locally hosted language models.
//!
//! This library provides the core functionality for the `kuzco` CLI tool:
//! talking to the model runtime, and the two guarded boundaries through which
//! model suggestions reach the system - the command gate for shell commands
//! and the edit applier (backed by the backup store) for file writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod backup;
pub mod cli;
pub mod config;
pub mod edit;
pub mod files;
pub mod gate;
pub mod prompts;
pub mod runtime;
pub mod sanitize;
pub mod session;
pub mod sys;
pub mod ui;


/// Library-level error type for Kuzco operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        /// Names of similarly named files in the same directory
        suggestions: Vec<String>,
    },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Command timed out after {}s: {command}", timeout.as_secs_f32())]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Backup of {} failed: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Edit rejected for {}: {reason}", path.display())]
    EditValidationFailed { path: PathBuf, reason: String },

    #[error("Model runtime unavailable at {url}: {reason}")]
    ModelUnavailable { url: String, reason: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map an I/O error that happened while touching `path` onto the taxonomy.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
                suggestions: Vec::new(),
            },
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Error::Io(err),
        }
    }

    /// Short category label used in user-facing messages.
    pub fn category(&self) -> &'static str {
        match self {
            Error::FileNotFound { .. } | Error::PermissionDenied { .. } => "file",
            Error::CommandTimeout { .. } => "command",
            Error::BackupFailed { .. } => "backup",
            Error::EditValidationFailed { .. } => "edit",
            Error::ModelUnavailable { .. } | Error::ModelNotFound(_) => "model",
            Error::InvalidInput(_) => "input",
            Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal",
        }
    }

    /// A suggested next step for the user, when one exists.
    pub fn remedy(&self) -> Option<String> {
        match self {
            Error::FileNotFound { path, .. } => {
                let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
                match parent {
                    Some(dir) if !dir.exists() => {
                        Some(format!("Directory '{}' does not exist.", dir.display()))
                    }
                    _ => Some("Check the file name and your current directory.".to_string()),
                }
            }
            Error::PermissionDenied { path } => Some(format!(
                "Check the permissions of '{}' (ls -l) or run as a user who can access it.",
                path.display()
            )),
            Error::CommandTimeout { .. } => Some(
                "Raise COMMAND_TIMEOUT or run the command yourself in another terminal."
                    .to_string(),
            ),
            Error::BackupFailed { .. } => Some(
                "The file was left untouched. Check free disk space and write permission for the backup directory."
                    .to_string(),
            ),
            Error::EditValidationFailed { .. } => Some(
                "The file was left untouched. Rephrase the instruction or edit the file manually."
                    .to_string(),
            ),
            Error::ModelUnavailable { .. } => {
                Some("Make sure the runtime is running: ollama serve".to_string())
            }
            Error::ModelNotFound(name) => Some(format!(
                "List installed models with `ollama list` or pull one with `ollama pull {}`.",
                name
            )),
            _ => None,
        }
    }
}

/// Result type alias for Kuzco operations.
pub type Result<T> = std::result::Result<T, Error>;
