//! Asking the user questions.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::Result;

/// Source of user answers.
pub trait Prompter {
    /// Show `question` and read one line of answer.
    ///
    /// Returns `Ok(None)` when input is exhausted (EOF), which callers treat
    /// as "no".
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

/// Prompts on a writer and reads answers line by line from a reader.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Prompter bound to the process's stdin and stdout.
pub type TerminalPrompter = LinePrompter<io::StdinLock<'static>, io::Stdout>;

impl TerminalPrompter {
    pub fn stdio() -> Self {
        LinePrompter::new(io::stdin().lock(), io::stdout())
    }
}

/// Replays canned answers and records the questions asked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    /// Answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front())
    }
}

/// `y` or `yes`, any case.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Exactly `yes`, as required for sensitive commands.
pub fn is_explicit_yes(answer: &str) -> bool {
    answer.trim() == "yes"
}
