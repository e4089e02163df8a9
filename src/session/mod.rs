//! User-facing workflows: analyze a file, edit a file, answer a system
//! question, and the interactive chat loop (see [`chat`]).
//!
//! An [`Assistant`] owns every capability a workflow needs (model runtime,
//! prompter, output, command gate, edit applier and sanitizer), so tests can
//! swap any of them.

pub mod chat;

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::edit::{AppliedEdit, EditApplier, EditRequest};
use crate::files::{self, FileInfo};
use crate::gate::{
    CommandGate, GatePolicy, Prompter, ReviewedCommand, TerminalPrompter, extract_commands,
    prompt::is_yes,
};
use crate::runtime::{Message, ModelRuntime};
use crate::sanitize::{ArtifactStripper, Sanitizer, validate_content};
use crate::{Error, Result, prompts, ui};

/// A configured assistant bound to one model.
pub struct Assistant {
    settings: Settings,
    model: String,
    runtime: Box<dyn ModelRuntime>,
    prompter: Box<dyn Prompter>,
    out: Box<dyn Write>,
    gate: CommandGate,
    applier: EditApplier,
    sanitizer: Box<dyn Sanitizer>,
    conversation: Vec<Message>,
}

impl Assistant {
    /// Assistant on stdin/stdout with the default sanitizer.
    ///
    /// `batch` lets non-sensitive commands run without confirmation.
    pub fn new(
        settings: Settings,
        model: impl Into<String>,
        runtime: Box<dyn ModelRuntime>,
        batch: bool,
    ) -> Self {
        let gate = CommandGate::new(GatePolicy::from_settings(&settings, batch));
        let applier = EditApplier::from_settings(&settings);
        Self {
            settings,
            model: model.into(),
            runtime,
            prompter: Box::new(TerminalPrompter::stdio()),
            out: Box::new(std::io::stdout()),
            gate,
            applier,
            sanitizer: Box::new(ArtifactStripper),
            conversation: Vec::new(),
        }
    }

    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_gate(mut self, gate: CommandGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Box<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Send `messages` and print the reply as it streams in.
    fn stream(&mut self, messages: &[Message]) -> Result<String> {
        let out = &mut self.out;
        let reply = self.runtime.chat(&self.model, messages, &mut |token| {
            let _ = out.write_all(token.as_bytes());
            let _ = out.flush();
        })?;
        if !reply.ends_with('\n') {
            writeln!(self.out)?;
        }
        Ok(reply)
    }

    /// Show a file's summary and preview, then stream the model's analysis.
    pub fn analyze_file(&mut self, path: &Path, prompt: Option<&str>) -> Result<String> {
        let path = files::resolve(path)?;
        let content = files::read_text(&path)?;

        writeln!(self.out, "{}", FileInfo::new(&path, &content))?;
        let preview = files::preview(&content, self.settings.max_preview_size);
        writeln!(self.out, "\n{}", ui::section("Preview"))?;
        writeln!(self.out, "{}", preview.text)?;
        if preview.truncated {
            writeln!(
                self.out,
                "... (preview truncated: {} of {} bytes shown)",
                preview.text.len(),
                content.len()
            )?;
        }

        writeln!(self.out, "\n{}", ui::section(&format!("Analysis of {}", path.display())))?;
        let messages = [Message::user(prompts::analysis_prompt(&path, &content, prompt))];
        self.stream(&messages)
    }

    /// Ask the model for a new version of a file and apply it through the
    /// edit applier.
    ///
    /// Returns `Ok(None)` when the model proposed no change.
    pub fn edit_file(&mut self, path: &Path, instruction: &str) -> Result<Option<AppliedEdit>> {
        let path = files::resolve(path)?;
        let original = files::read_text(&path)?;

        writeln!(self.out, "Editing {}...", path.display())?;
        writeln!(self.out, "Instruction: {}", instruction.trim())?;

        let prompt = prompts::edit_prompt(&path, &original, instruction);
        let raw = self.runtime.infer(&prompt, &self.model)?;

        let mut cleaned = self.sanitizer.clean(&raw, &original);
        if original.ends_with('\n') && !cleaned.is_empty() && !cleaned.ends_with('\n') {
            cleaned.push('\n');
        }

        if let Err(reason) = validate_content(&original, &cleaned) {
            writeln!(self.out, "\n{}", ui::section("Raw model response"))?;
            writeln!(self.out, "{}", raw.trim_end())?;
            return Err(Error::EditValidationFailed { path, reason });
        }

        if cleaned == original {
            writeln!(self.out, "No changes suggested; {} left as is.", path.display())?;
            return Ok(None);
        }

        let request = EditRequest::new(&path, instruction, cleaned);
        let applied = self.applier.apply(&request).into_result()?;
        match &applied.backup {
            Some(record) => writeln!(self.out, "Backup created: {}", record.backup.display())?,
            None => writeln!(
                self.out,
                "{}",
                ui::format_warning("backup", "backups are disabled; no snapshot was taken", None)
            )?,
        }
        writeln!(self.out, "Edited {} ({} bytes).", applied.target.display(), applied.bytes_written)?;
        Ok(Some(applied))
    }

    /// Answer a system question and offer any suggested commands to the gate.
    pub fn system_question(&mut self, question: &str) -> Result<Vec<ReviewedCommand>> {
        writeln!(self.out, "{}", ui::section("System assistant"))?;
        let messages = [
            Message::system(prompts::system_prompt()),
            Message::user(prompts::system_question_prompt(question)),
        ];
        let reply = self.stream(&messages)?;
        self.offer_commands(&reply)
    }

    /// Run the gate over every command marked in `reply`.
    fn offer_commands(&mut self, reply: &str) -> Result<Vec<ReviewedCommand>> {
        let commands = extract_commands(reply);
        self.gate
            .review(&commands, self.prompter.as_mut(), self.out.as_mut())
    }

    /// Restore `backup` over `target` after confirmation.
    pub fn restore(&mut self, backup: &Path, target: &Path) -> Result<Option<AppliedEdit>> {
        restore_backup(
            &self.applier,
            backup,
            target,
            self.prompter.as_mut(),
            self.out.as_mut(),
        )
    }

    /// Print the backups of `target`, oldest first.
    pub fn list_backups(&mut self, target: &Path) -> Result<Vec<PathBuf>> {
        list_backups(&self.applier, target, self.out.as_mut())
    }
}

/// Ask, then put `backup` back over `target`. The current content of
/// `target` is backed up first.
pub fn restore_backup(
    applier: &EditApplier,
    backup: &Path,
    target: &Path,
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
) -> Result<Option<AppliedEdit>> {
    if !backup.is_file() {
        return Err(Error::FileNotFound {
            path: backup.to_path_buf(),
            suggestions: Vec::new(),
        });
    }
    let answer = prompter.ask(&format!(
        "Restore {} from {}? [y/N] ",
        target.display(),
        backup.display()
    ))?;
    if !answer.as_deref().is_some_and(is_yes) {
        writeln!(out, "Restore cancelled.")?;
        return Ok(None);
    }

    let applied = applier.restore(backup, target).into_result()?;
    if let Some(record) = &applied.backup {
        writeln!(out, "Previous content saved to {}", record.backup.display())?;
    }
    writeln!(out, "Restored {}.", applied.target.display())?;
    Ok(Some(applied))
}

/// Print the backups of `target`, oldest first, and return their paths.
pub fn list_backups(
    applier: &EditApplier,
    target: &Path,
    out: &mut dyn Write,
) -> Result<Vec<PathBuf>> {
    let entries = applier.store().list(target)?;
    if entries.is_empty() {
        writeln!(out, "No backups of {}.", target.display())?;
    }
    for entry in &entries {
        writeln!(
            out,
            "{}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.path.display()
        )?;
    }
    Ok(entries.into_iter().map(|e| e.path).collect())
}

/// Pick the model to use.
///
/// A requested model must be installed (`name` or `name:latest`). Without a
/// request, a single installed model is used directly and several are
/// offered as a numbered list.
pub fn select_model(
    runtime: &dyn ModelRuntime,
    requested: Option<&str>,
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
) -> Result<String> {
    let models = runtime.list_models()?;

    if let Some(name) = requested {
        let tagged = format!("{}:latest", name);
        return models
            .iter()
            .find(|m| m.name == name || m.name == tagged)
            .map(|m| m.name.clone())
            .ok_or_else(|| Error::ModelNotFound(name.to_string()));
    }

    match models.len() {
        0 => Err(Error::Other(
            "No models are installed. Pull one with `ollama pull <model>`.".to_string(),
        )),
        1 => {
            writeln!(out, "Using model {}", models[0].name)?;
            Ok(models[0].name.clone())
        }
        n => {
            writeln!(out, "Available models:")?;
            for (i, model) in models.iter().enumerate() {
                writeln!(out, "  {}. {}", i + 1, model.name)?;
            }
            let answer = prompter
                .ask(&format!("Select a model [1-{}]: ", n))?
                .ok_or_else(|| Error::InvalidInput("no model selected".to_string()))?;
            let choice: usize = answer
                .trim()
                .parse()
                .ok()
                .filter(|c| (1..=n).contains(c))
                .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a model number", answer.trim())))?;
            Ok(models[choice - 1].name.clone())
        }
    }
}
