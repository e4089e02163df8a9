//! The edit applier: the only path by which model output reaches a file.
//!
//! Each request moves through
//! `Requested -> Validated -> BackedUp -> Written`, ending early in
//! `Rejected` (validation failed, nothing touched) or `Failed` (backup or
//! write failed, target unchanged). The write itself is atomic, so no
//! intermediate state is ever visible on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::{BackupRecord, BackupStore};
use crate::config::Settings;
use crate::files::atomic_write;
use crate::{Error, Result};

/// Lifecycle of an edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Requested,
    Validated,
    BackedUp,
    Written,
    Failed,
    Rejected,
}

impl std::fmt::Display for EditState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EditState::Requested => "requested",
            EditState::Validated => "validated",
            EditState::BackedUp => "backed-up",
            EditState::Written => "written",
            EditState::Failed => "failed",
            EditState::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// A proposed replacement of a file's full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub target: PathBuf,
    /// What the user asked for; kept for logs and messages
    pub instruction: String,
    pub new_content: String,
}

impl EditRequest {
    pub fn new(
        target: impl Into<PathBuf>,
        instruction: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            instruction: instruction.into(),
            new_content: new_content.into(),
        }
    }
}

/// A successfully written edit.
#[derive(Debug, Clone)]
pub struct AppliedEdit {
    /// Canonical path that was written
    pub target: PathBuf,
    /// Snapshot taken before the write, when backups were on
    pub backup: Option<BackupRecord>,
    pub bytes_written: usize,
}

/// Final report of an edit request.
#[derive(Debug)]
pub enum EditOutcome {
    Written(AppliedEdit),
    /// Validation failed; nothing was touched
    Rejected(Error),
    /// Backup or write failed; the target is unchanged
    Failed {
        backup: Option<BackupRecord>,
        error: Error,
    },
}

impl EditOutcome {
    pub fn state(&self) -> EditState {
        match self {
            EditOutcome::Written(_) => EditState::Written,
            EditOutcome::Rejected(_) => EditState::Rejected,
            EditOutcome::Failed { .. } => EditState::Failed,
        }
    }

    pub fn into_result(self) -> Result<AppliedEdit> {
        match self {
            EditOutcome::Written(applied) => Ok(applied),
            EditOutcome::Rejected(error) | EditOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Rules the applier enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPolicy {
    pub safe_mode: bool,
    pub create_backups: bool,
    pub max_edit_size: u64,
}

impl EditPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            safe_mode: settings.safe_mode,
            create_backups: settings.create_backups,
            max_edit_size: settings.max_edit_size,
        }
    }

    /// Safe mode forces a backup; otherwise `create_backups` decides.
    pub fn backups_required(&self) -> bool {
        self.safe_mode || self.create_backups
    }
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Validates, backs up and writes edit requests.
#[derive(Debug, Clone, Default)]
pub struct EditApplier {
    policy: EditPolicy,
    store: BackupStore,
}

impl EditApplier {
    pub fn new(policy: EditPolicy, store: BackupStore) -> Self {
        Self { policy, store }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            EditPolicy::from_settings(settings),
            BackupStore::from_settings(settings),
        )
    }

    pub fn policy(&self) -> &EditPolicy {
        &self.policy
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Run a request through the full state machine.
    pub fn apply(&self, request: &EditRequest) -> EditOutcome {
        tracing::debug!(path = %request.target.display(), state = %EditState::Requested, "edit");

        let (target, original) = match self.validate(request) {
            Ok(validated) => validated,
            Err(error) => {
                tracing::warn!(path = %request.target.display(), %error, "edit rejected");
                return EditOutcome::Rejected(error);
            }
        };
        tracing::debug!(path = %target.display(), state = %EditState::Validated, "edit");

        let backup = if self.policy.backups_required() {
            match self.store.backup(&target, &original) {
                Ok(record) => {
                    tracing::debug!(path = %target.display(), state = %EditState::BackedUp, "edit");
                    Some(record)
                }
                Err(error) => {
                    tracing::warn!(path = %target.display(), %error, "edit failed before write");
                    return EditOutcome::Failed {
                        backup: None,
                        error,
                    };
                }
            }
        } else {
            tracing::warn!(path = %target.display(), "backups disabled; overwriting without a snapshot");
            None
        };

        let bytes = request.new_content.as_bytes();
        match atomic_write(&target, bytes) {
            Ok(()) => {
                tracing::info!(path = %target.display(), bytes = bytes.len(), "edit written");
                EditOutcome::Written(AppliedEdit {
                    target,
                    backup,
                    bytes_written: bytes.len(),
                })
            }
            Err(e) => {
                let error = Error::from_io(&target, e);
                tracing::warn!(path = %target.display(), %error, "edit write failed");
                EditOutcome::Failed { backup, error }
            }
        }
    }

    /// Check the target and the new content; return the canonical target
    /// and its current bytes.
    fn validate(&self, request: &EditRequest) -> Result<(PathBuf, Vec<u8>)> {
        let target = fs::canonicalize(&request.target)
            .map_err(|e| Error::from_io(&request.target, e))?;
        let reject = |reason: String| Error::EditValidationFailed {
            path: target.clone(),
            reason,
        };

        let meta = fs::metadata(&target).map_err(|e| Error::from_io(&target, e))?;
        if !meta.is_file() {
            return Err(reject("not a regular file".to_string()));
        }
        let limit = self.policy.max_edit_size;
        if meta.len() > limit {
            return Err(reject(format!(
                "file is {} bytes, over the {} byte limit",
                meta.len(),
                limit
            )));
        }
        if request.new_content.len() as u64 > limit {
            return Err(reject(format!(
                "new content is {} bytes, over the {} byte limit",
                request.new_content.len(),
                limit
            )));
        }

        let original = fs::read(&target).map_err(|e| Error::from_io(&target, e))?;
        if !is_text(&original) {
            return Err(reject("file is not UTF-8 text".to_string()));
        }
        if request.new_content.contains('\0') {
            return Err(reject("new content contains NUL bytes".to_string()));
        }

        Ok((target, original))
    }

    /// Put a backup's content back over `target`.
    ///
    /// Goes through [`apply`](Self::apply), so the current content of
    /// `target` is itself backed up first.
    pub fn restore(&self, backup: &Path, target: &Path) -> EditOutcome {
        let bytes = match fs::read(backup) {
            Ok(bytes) => bytes,
            Err(e) => return EditOutcome::Rejected(Error::from_io(backup, e)),
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                return EditOutcome::Rejected(Error::EditValidationFailed {
                    path: backup.to_path_buf(),
                    reason: "backup is not UTF-8 text".to_string(),
                });
            }
        };
        let request = EditRequest::new(
            target,
            format!("restore from {}", backup.display()),
            content,
        );
        self.apply(&request)
    }
}

fn is_text(bytes: &[u8]) -> bool {
    !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
}
