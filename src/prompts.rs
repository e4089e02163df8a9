//! Prompt templates sent to the model.

use std::path::Path;

use crate::files::language_hint;
use crate::gate::extract::COMMAND_MARKER;

/// Instruction used by `--read` when no `--prompt` is given.
pub const DEFAULT_ANALYSIS_PROMPT: &str = "Analyze this code and provide insights about its structure, functionality, and potential improvements.";

/// System message for chat and system questions.
///
/// `{marker}` is replaced with the command marker the gate looks for.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are Kuzco, a helpful assistant for software development and Linux system administration, running in the user's terminal.
Give clear, practical answers and explain what commands do.
When you want to suggest a shell command the user can run right away, put it on its own line in exactly this form:
{marker} <command>
Suggest one command per line. Never suggest destructive commands without explaining the consequences."#;

/// The system message, with the command marker filled in.
pub fn system_prompt() -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{marker}", COMMAND_MARKER)
}

/// Prompt for analyzing a file.
pub fn analysis_prompt(path: &Path, content: &str, instruction: Option<&str>) -> String {
    let instruction = instruction
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .unwrap_or(DEFAULT_ANALYSIS_PROMPT);
    format!(
        "File: {}\nContent:\n```{}\n{}\n```\n\n{}",
        path.display(),
        language_hint(path),
        content,
        instruction
    )
}

/// Prompt asking for the complete modified content of a file.
pub fn edit_prompt(path: &Path, content: &str, instruction: &str) -> String {
    format!(
        r#"You are a code editor. Your task is to modify the file according to the instruction.

CRITICAL RULES:
1. Return ONLY the complete modified file content
2. Do NOT include any explanations, thoughts, or markdown formatting
3. Do NOT wrap the code in backticks or code blocks
4. Do NOT add prefixes like "Here's the modified file:"
5. Start directly with the actual file content

File: {}
Current content:
---START FILE---
{}
---END FILE---

Instruction: {}

Return the complete modified file content below (no formatting, no explanations):
"#,
        path.display(),
        content,
        instruction.trim()
    )
}

/// Prompt for a system administration question.
pub fn system_question_prompt(question: &str) -> String {
    format!(
        "Question about this Linux/Unix system: {}\n\nIf commands would help, list each on its own line as `{} <command>`.",
        question.trim(),
        COMMAND_MARKER
    )
}
