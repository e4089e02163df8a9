//! The interactive chat loop.
//!
//! Plain input is sent to the model together with the conversation so far.
//! Lines starting with `/` are commands:
//!
//! | Command                       | Effect                                  |
//! |-------------------------------|-----------------------------------------|
//! | `/read <file> [prompt]`       | analyze a file                          |
//! | `/edit <file> <instruction>`  | edit a file (backed up first)           |
//! | `/system <question>`          | system question with command suggestions|
//! | `/backups <file>`             | list backups of a file                  |
//! | `/restore <backup> <file>`    | restore a backup                        |
//! | `/save [path]`                | save the conversation as JSON           |
//! | `/load <path>`                | load a saved conversation               |
//! | `/clear`                      | forget the conversation                 |
//! | `/help`                       | list commands                           |
//!
//! Any configured exit word (or end of input) leaves the loop. Errors are
//! printed and the loop continues.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use super::Assistant;
use crate::runtime::Message;
use crate::{Error, Result, prompts, ui};

const HELP: &str = "Commands:
  /read <file> [prompt]        analyze a file
  /edit <file> <instruction>   edit a file (a backup is taken first)
  /system <question>           ask a system question; suggested commands need confirmation
  /backups <file>              list backups of a file
  /restore <backup> <file>     restore a backup over a file
  /save [path]                 save the conversation as JSON
  /load <path>                 load a saved conversation
  /clear                       forget the conversation
  /help                        show this help";

/// Write `messages` to `path` as pretty JSON.
pub fn save_conversation(path: &Path, messages: &[Message]) -> Result<()> {
    let json = serde_json::to_string_pretty(messages)?;
    std::fs::write(path, json).map_err(|e| Error::from_io(path, e))
}

/// Read a conversation saved by [`save_conversation`].
pub fn load_conversation(path: &Path) -> Result<Vec<Message>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// File name used by `/save` without an argument.
fn default_save_path() -> PathBuf {
    PathBuf::from(format!(
        "chat_{}.json",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Split `s` at the first run of whitespace.
fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

impl Assistant {
    /// Run the chat loop until an exit word or end of input.
    pub fn chat(&mut self) -> Result<()> {
        writeln!(self.out, "Kuzco chat with {}", self.model)?;
        writeln!(
            self.out,
            "Type a question, /help for commands, or '{}' to leave.",
            self.settings
                .exit_commands
                .first()
                .map(String::as_str)
                .unwrap_or("exit")
        )?;

        loop {
            let Some(line) = self.prompter.ask("\nYou: ")? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if self.settings.is_exit_command(input) {
                break;
            }

            let step = match input.strip_prefix('/') {
                Some(command) => self.handle_command(command),
                None => self.chat_turn(input).map(|_| ControlFlow::Continue(())),
            };
            match step {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "chat step failed");
                    writeln!(self.out, "{}", ui::report(&e))?;
                }
            }
        }

        writeln!(self.out, "Goodbye!")?;
        Ok(())
    }

    /// One round of conversation; suggested commands go through the gate.
    fn chat_turn(&mut self, input: &str) -> Result<String> {
        self.conversation.push(Message::user(input));
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(Message::system(prompts::system_prompt()));
        messages.extend(self.conversation.iter().cloned());

        writeln!(self.out)?;
        let reply = match self.stream(&messages) {
            Ok(reply) => reply,
            Err(e) => {
                self.conversation.pop();
                return Err(e);
            }
        };
        self.conversation.push(Message::assistant(reply.clone()));
        self.offer_commands(&reply)?;
        Ok(reply)
    }

    fn handle_command(&mut self, command: &str) -> Result<ControlFlow<()>> {
        let (name, args) = split_first(command);
        match name {
            "help" | "?" => writeln!(self.out, "{}", HELP)?,
            "read" => {
                let (file, prompt) = split_first(args);
                if file.is_empty() {
                    return Err(Error::InvalidInput("usage: /read <file> [prompt]".to_string()));
                }
                let prompt = (!prompt.is_empty()).then_some(prompt);
                self.analyze_file(Path::new(file), prompt)?;
            }
            "edit" => {
                let (file, instruction) = split_first(args);
                if file.is_empty() || instruction.is_empty() {
                    return Err(Error::InvalidInput(
                        "usage: /edit <file> <instruction>".to_string(),
                    ));
                }
                self.edit_file(Path::new(file), instruction)?;
            }
            "system" => {
                if args.is_empty() {
                    return Err(Error::InvalidInput("usage: /system <question>".to_string()));
                }
                self.system_question(args)?;
            }
            "backups" => {
                if args.is_empty() {
                    return Err(Error::InvalidInput("usage: /backups <file>".to_string()));
                }
                self.list_backups(Path::new(args))?;
            }
            "restore" => {
                let (backup, target) = split_first(args);
                if backup.is_empty() || target.is_empty() {
                    return Err(Error::InvalidInput(
                        "usage: /restore <backup> <file>".to_string(),
                    ));
                }
                self.restore(Path::new(backup), Path::new(target))?;
            }
            "save" => {
                let path = if args.is_empty() {
                    default_save_path()
                } else {
                    PathBuf::from(args)
                };
                save_conversation(&path, &self.conversation)?;
                writeln!(self.out, "Conversation saved to {}", path.display())?;
            }
            "load" => {
                if args.is_empty() {
                    return Err(Error::InvalidInput("usage: /load <path>".to_string()));
                }
                let path = Path::new(args);
                self.conversation = load_conversation(path)?;
                writeln!(
                    self.out,
                    "Loaded {} messages from {}",
                    self.conversation.len(),
                    path.display()
                )?;
            }
            "clear" => {
                self.conversation.clear();
                writeln!(self.out, "Conversation cleared.")?;
            }
            "exit" | "quit" => return Ok(ControlFlow::Break(())),
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown command '/{}'; type /help for a list",
                    other
                )));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// The conversation so far (without the system message).
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }
}
