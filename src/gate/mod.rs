//! The command gate: the only path by which a model-suggested shell command
//! reaches the operating system.
//!
//! Every command is classified first. Sensitive commands (privilege
//! elevation or destructive patterns) run only after the user types exactly
//! `yes`, in batch mode too; when no answer can be read they are declined.
//! Other commands need `y`/`yes` unless the gate runs in batch mode.
//! Declining spawns nothing.

pub mod classify;
pub mod exec;
pub mod extract;
pub mod prompt;

use std::io::Write;
use std::time::Duration;

pub use classify::{RiskTier, SuggestedCommand, classify};
pub use exec::{CommandOutcome, CommandRunner};
pub use extract::extract_commands;
pub use prompt::{LinePrompter, Prompter, ScriptedPrompter, TerminalPrompter};

use crate::config::Settings;
use crate::Result;

/// Rules the gate enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    /// First words that mark a command as privilege-elevating
    pub sensitive_prefixes: Vec<String>,
    pub timeout: Duration,
    /// Run non-sensitive commands without asking (`--yes`)
    pub batch: bool,
    /// The assistant itself runs as root
    pub running_as_root: bool,
}

impl GatePolicy {
    pub fn from_settings(settings: &Settings, batch: bool) -> Self {
        Self {
            sensitive_prefixes: settings.sudo_prefixes.clone(),
            timeout: settings.command_timeout,
            batch,
            running_as_root: crate::sys::running_as_root(),
        }
    }
}

/// What happened to one submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Executed(CommandOutcome),
    Declined,
}

/// A command from a reviewed batch with its result.
#[derive(Debug)]
pub struct ReviewedCommand {
    pub command: SuggestedCommand,
    pub result: Result<GateOutcome>,
}

/// How a batch of suggestions is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Approval {
    /// User approved the whole batch; only sensitive commands ask again
    All,
    /// Ask for every command
    EachCommand,
}

/// Confirms and runs suggested commands.
#[derive(Debug, Clone)]
pub struct CommandGate {
    policy: GatePolicy,
    runner: CommandRunner,
}

impl CommandGate {
    pub fn new(policy: GatePolicy) -> Self {
        let runner = CommandRunner::new(policy.timeout);
        Self { policy, runner }
    }

    /// Replace the runner (used to pin the working directory).
    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn classify(&self, command: &str) -> SuggestedCommand {
        classify(command, &self.policy.sensitive_prefixes)
    }

    /// Confirm and, if approved, run a single command.
    ///
    /// Returns `Declined` when the user says no; a timeout is an error.
    pub fn submit(
        &self,
        command: &str,
        prompter: &mut dyn Prompter,
        out: &mut dyn Write,
    ) -> Result<GateOutcome> {
        let suggested = self.classify(command);
        self.gate(&suggested, Approval::EachCommand, prompter, out)
    }

    /// Present a batch of suggestions and handle the user's choice: `yes`
    /// runs all, `selective` asks per command, anything else skips all.
    pub fn review(
        &self,
        commands: &[String],
        prompter: &mut dyn Prompter,
        out: &mut dyn Write,
    ) -> Result<Vec<ReviewedCommand>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let suggested: Vec<SuggestedCommand> = commands.iter().map(|c| self.classify(c)).collect();

        writeln!(out, "\nSuggested commands:")?;
        for (i, cmd) in suggested.iter().enumerate() {
            let marker = if cmd.is_sensitive() { "  [!]" } else { "" };
            writeln!(out, "  {}. {}{}", i + 1, cmd.raw, marker)?;
        }

        let approval = if self.policy.batch {
            Approval::All
        } else {
            let answer = prompter.ask(
                "Execute these commands? Enter 'yes' to run all, 'selective' to choose, anything else to skip: ",
            )?;
            match answer.as_deref().map(|a| a.trim().to_lowercase()) {
                Some(a) if a == "yes" || a == "y" => Approval::All,
                Some(a) if a == "selective" || a == "s" => Approval::EachCommand,
                _ => {
                    writeln!(out, "Commands skipped.")?;
                    return Ok(suggested
                        .into_iter()
                        .map(|command| ReviewedCommand {
                            command,
                            result: Ok(GateOutcome::Declined),
                        })
                        .collect());
                }
            }
        };

        let mut reviewed = Vec::with_capacity(suggested.len());
        for command in suggested {
            let result = self.gate(&command, approval, prompter, out);
            if let Err(ref e) = result {
                writeln!(out, "{}", crate::ui::report(e))?;
            }
            reviewed.push(ReviewedCommand { command, result });
        }
        Ok(reviewed)
    }

    fn gate(
        &self,
        command: &SuggestedCommand,
        approval: Approval,
        prompter: &mut dyn Prompter,
        out: &mut dyn Write,
    ) -> Result<GateOutcome> {
        writeln!(out, "\nCommand: {}", command.raw)?;
        for warning in &command.warnings {
            writeln!(out, "  warning: {}", warning)?;
        }
        if self.policy.running_as_root {
            writeln!(out, "  warning: kuzco is running as root; so will this command.")?;
        }

        let approved = if command.is_sensitive() {
            let answer = prompter.ask(&format!(
                "This command is {} risk. Type 'yes' to run it: ",
                command.risk
            ))?;
            let approved = answer.as_deref().is_some_and(prompt::is_explicit_yes);
            if !approved {
                tracing::warn!(command = %command.raw, risk = %command.risk, "sensitive command declined");
            }
            approved
        } else if self.policy.batch || approval == Approval::All {
            true
        } else {
            let answer = prompter.ask("Run this command? [y/N] ")?;
            answer.as_deref().is_some_and(prompt::is_yes)
        };

        if !approved {
            writeln!(out, "Skipped: {}", command.raw)?;
            return Ok(GateOutcome::Declined);
        }

        let outcome = self.runner.run(&command.raw)?;
        print_outcome(&outcome, out)?;
        Ok(GateOutcome::Executed(outcome))
    }
}

fn print_outcome(outcome: &CommandOutcome, out: &mut dyn Write) -> Result<()> {
    let stdout = outcome.stdout.trim_end();
    let stderr = outcome.stderr.trim_end();
    if !stdout.is_empty() {
        writeln!(out, "{}", stdout)?;
    }
    if !stderr.is_empty() {
        writeln!(out, "{}", stderr)?;
    }
    match outcome.exit_code {
        Some(0) => writeln!(out, "Done ({:.1}s).", outcome.duration.as_secs_f32())?,
        Some(code) => writeln!(out, "Failed with exit code {}.", code)?,
        None => writeln!(out, "Terminated by a signal.")?,
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Error;
    use crate::test_utils::TestEnv;

    fn gate(env: &TestEnv, batch: bool) -> CommandGate {
        let policy = GatePolicy {
            sensitive_prefixes: vec!["sudo".to_string(), "su".to_string()],
            timeout: Duration::from_secs(10),
            batch,
            running_as_root: false,
        };
        let runner = CommandRunner::new(policy.timeout).with_cwd(env.path());
        CommandGate::new(policy).with_runner(runner)
    }

    #[test]
    fn test_plain_command_runs_after_y() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::new(["y"]);
        let mut out = Vec::new();

        let outcome = gate(&env, false)
            .submit("touch made.txt", &mut prompter, &mut out)
            .unwrap();

        assert!(matches!(outcome, GateOutcome::Executed(ref o) if o.success()));
        assert!(env.path().join("made.txt").exists());
    }

    #[test]
    fn test_declining_spawns_nothing() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::new(["n"]);
        let mut out = Vec::new();

        let outcome = gate(&env, false)
            .submit("touch made.txt", &mut prompter, &mut out)
            .unwrap();

        assert_eq!(outcome, GateOutcome::Declined);
        assert!(env.entries().is_empty());
    }

    #[test]
    fn test_batch_runs_plain_command_without_asking() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::default();
        let mut out = Vec::new();

        let outcome = gate(&env, true)
            .submit("touch made.txt", &mut prompter, &mut out)
            .unwrap();

        assert!(matches!(outcome, GateOutcome::Executed(_)));
        assert!(prompter.questions.is_empty());
    }

    #[test]
    fn test_sudo_requires_exact_yes() {
        let env = TestEnv::new();
        for answer in ["y", "YES", "sure", ""] {
            let mut prompter = ScriptedPrompter::new([answer]);
            let mut out = Vec::new();
            let outcome = gate(&env, false)
                .submit("sudo apt update", &mut prompter, &mut out)
                .unwrap();
            assert_eq!(outcome, GateOutcome::Declined, "answer {:?}", answer);
            assert!(String::from_utf8(out).unwrap().contains("warning:"));
        }
    }

    #[test]
    fn test_sensitive_needs_yes_even_in_batch_mode() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::default();
        let mut out = Vec::new();

        let outcome = gate(&env, true)
            .submit("rm -rf ./victim", &mut prompter, &mut out)
            .unwrap();

        assert_eq!(outcome, GateOutcome::Declined);
        assert_eq!(prompter.questions.len(), 1);
    }

    #[test]
    fn test_wrapped_sudo_still_asks_in_batch_mode() {
        let env = TestEnv::new();
        for command in [
            "env sudo touch made.txt",
            "DEBIAN_FRONTEND=noninteractive sudo touch made.txt",
            "(sudo touch made.txt)",
        ] {
            let mut prompter = ScriptedPrompter::default();
            let mut out = Vec::new();

            let outcome = gate(&env, true)
                .submit(command, &mut prompter, &mut out)
                .unwrap();

            assert_eq!(outcome, GateOutcome::Declined, "{}", command);
            assert_eq!(prompter.questions.len(), 1, "{}", command);
            assert!(prompter.questions[0].contains("Type 'yes'"));
        }
        assert!(!env.path().join("made.txt").exists());
    }

    #[test]
    fn test_sensitive_runs_after_explicit_yes() {
        let env = TestEnv::new();
        std::fs::create_dir(env.path().join("victim")).unwrap();
        let mut prompter = ScriptedPrompter::new(["yes"]);
        let mut out = Vec::new();

        let outcome = gate(&env, false)
            .submit("rm -rf ./victim", &mut prompter, &mut out)
            .unwrap();

        assert!(matches!(outcome, GateOutcome::Executed(_)));
        assert!(!env.path().join("victim").exists());
    }

    #[test]
    fn test_timeout_surfaces_as_error() {
        let policy = GatePolicy {
            sensitive_prefixes: Vec::new(),
            timeout: Duration::from_millis(200),
            batch: true,
            running_as_root: false,
        };
        let mut out = Vec::new();
        let err = CommandGate::new(policy)
            .submit("sleep 30", &mut ScriptedPrompter::default(), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let env = TestEnv::new();
        let mut out = Vec::new();
        let outcome = gate(&env, true)
            .submit("exit 4", &mut ScriptedPrompter::default(), &mut out)
            .unwrap();
        match outcome {
            GateOutcome::Executed(o) => assert_eq!(o.exit_code, Some(4)),
            other => panic!("expected execution, got {:?}", other),
        }
        assert!(String::from_utf8(out).unwrap().contains("exit code 4"));
    }

    #[test]
    fn test_review_skip_all() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::new(["no"]);
        let mut out = Vec::new();
        let commands = vec!["touch a".to_string(), "touch b".to_string()];

        let reviewed = gate(&env, false)
            .review(&commands, &mut prompter, &mut out)
            .unwrap();

        assert_eq!(reviewed.len(), 2);
        assert!(env.entries().is_empty());
    }

    #[test]
    fn test_review_yes_runs_all_but_sudo_still_asks() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::new(["yes", "no"]);
        let mut out = Vec::new();
        let commands = vec![
            "touch a".to_string(),
            "sudo touch b".to_string(),
            "touch c".to_string(),
        ];

        let reviewed = gate(&env, false)
            .review(&commands, &mut prompter, &mut out)
            .unwrap();

        assert_eq!(env.entries(), vec!["a".to_string(), "c".to_string()]);
        assert!(matches!(reviewed[1].result, Ok(GateOutcome::Declined)));
        assert_eq!(prompter.questions.len(), 2);
    }

    #[test]
    fn test_review_selective() {
        let env = TestEnv::new();
        let mut prompter = ScriptedPrompter::new(["selective", "n", "y"]);
        let mut out = Vec::new();
        let commands = vec!["touch a".to_string(), "touch b".to_string()];

        gate(&env, false)
            .review(&commands, &mut prompter, &mut out)
            .unwrap();

        assert_eq!(env.entries(), vec!["b".to_string()]);
    }

    #[test]
    fn test_review_eof_skips_everything() {
        let env = TestEnv::new();
        let mut out = Vec::new();
        gate(&env, false)
            .review(
                &["touch a".to_string()],
                &mut ScriptedPrompter::default(),
                &mut out,
            )
            .unwrap();
        assert!(env.entries().is_empty());
    }
}
