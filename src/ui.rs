//! User-facing message formatting.
//!
//! Errors and warnings printed to stderr follow one layout:
//! ```text
//! kuzco: error: <category>: <brief>
//!
//!   <details>
//!
//!   <suggestion>
//! ```

use std::fmt::Write;

use crate::Error;

/// Append an indented block, preceded by a blank line.
fn push_block(msg: &mut String, block: &str) {
    msg.push_str("\n\n");
    for line in block.lines() {
        let _ = writeln!(msg, "  {}", line);
    }
    if msg.ends_with('\n') {
        msg.pop();
    }
}

/// Format an error message.
///
/// `details` and `suggestion` are indented under the headline.
pub fn format_error(
    category: &str,
    brief: &str,
    details: Option<&str>,
    suggestion: Option<&str>,
) -> String {
    let mut msg = format!("kuzco: error: {}: {}", category, brief);
    if let Some(details) = details {
        push_block(&mut msg, details);
    }
    if let Some(suggestion) = suggestion {
        push_block(&mut msg, suggestion);
    }
    msg
}

/// Format a warning message.
pub fn format_warning(category: &str, brief: &str, details: Option<&str>) -> String {
    let mut msg = format!("kuzco: warning: {}: {}", category, brief);
    if let Some(details) = details {
        push_block(&mut msg, details);
    }
    msg
}

/// Render a library error for the terminal.
pub fn report(err: &Error) -> String {
    let details = match err {
        Error::FileNotFound { suggestions, .. } if !suggestions.is_empty() => {
            Some(format!("Did you mean: {}", suggestions.join(", ")))
        }
        Error::BackupFailed { path, .. } => {
            Some(format!("No changes were made to '{}'.", path.display()))
        }
        _ => None,
    };
    let remedy = err.remedy();
    format_error(
        err.category(),
        &err.to_string(),
        details.as_deref(),
        remedy.as_deref(),
    )
}

/// A short horizontal rule with a title, used around streamed model output.
pub fn section(title: &str) -> String {
    format!("--- {} ---", title)
}
