//! CLI argument definitions for Kuzco.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Version string with build metadata, e.g. `0.1.0 (abc1234 2024-05-01T12:00:00Z)`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("KUZCO_GIT_COMMIT"),
    " ",
    env!("KUZCO_BUILD_TIMESTAMP"),
    ")"
);

/// Kuzco - a terminal assistant for locally hosted language models.
///
/// Without flags, starts an interactive chat. File edits are backed up before
/// they are written, and suggested shell commands run only after confirmation.
#[derive(Parser, Debug)]
#[command(name = "kuzco")]
#[command(author, version, long_version = LONG_VERSION, about = "A terminal assistant for local LLMs with guarded file edits and shell commands", long_about = None)]
pub struct Cli {
    /// Model to use (defaults to DEFAULT_MODEL, or a choice among installed models)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Analyze a file
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["edit", "system"])]
    pub read: Option<PathBuf>,

    /// Custom instruction for --read
    #[arg(short, long, requires = "read")]
    pub prompt: Option<String>,

    /// Edit a file (requires --instruction)
    #[arg(short, long, value_name = "FILE", requires = "instruction", conflicts_with = "system")]
    pub edit: Option<PathBuf>,

    /// What to change in the file given to --edit
    #[arg(short, long, requires = "edit")]
    pub instruction: Option<String>,

    /// Ask a system administration question
    #[arg(short, long, value_name = "QUESTION")]
    pub system: Option<String>,

    /// Start interactive chat (also the default when no action is given)
    #[arg(short, long)]
    pub chat: bool,

    /// Run non-sensitive suggested commands without asking.
    /// Commands using sudo or matching destructive patterns still require typing 'yes'.
    #[arg(short, long)]
    pub yes: bool,

    /// Model runtime URL (overrides OLLAMA_HOST)
    #[arg(long, global = true, value_name = "URL")]
    pub host: Option<String>,

    /// Enable debug logging (overridden by KUZCO_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands that do not talk to the model runtime
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved configuration and where each value came from
    Config,

    /// List backups of a file, oldest first
    Backups {
        /// File whose backups to list
        file: PathBuf,
    },

    /// Restore a backup over a file (the current content is backed up first)
    Restore {
        /// Backup file to restore
        backup: PathBuf,
        /// File to overwrite
        file: PathBuf,
    },
}

/// What the user asked the assistant to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Read {
        file: PathBuf,
        prompt: Option<String>,
    },
    Edit {
        file: PathBuf,
        instruction: String,
    },
    System(String),
    Chat,
}

impl Cli {
    /// The model-backed action selected by the flags.
    pub fn action(&self) -> Action {
        if let Some(ref file) = self.read {
            return Action::Read {
                file: file.clone(),
                prompt: self.prompt.clone(),
            };
        }
        if let (Some(file), Some(instruction)) = (&self.edit, &self.instruction) {
            return Action::Edit {
                file: file.clone(),
                instruction: instruction.clone(),
            };
        }
        if let Some(ref question) = self.system {
            return Action::System(question.clone());
        }
        Action::Chat
    }
}
