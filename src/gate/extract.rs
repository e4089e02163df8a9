//! Pulling suggested commands out of a model reply.
//!
//! The system prompt asks the model to put each runnable command on its own
//! line as `EXECUTE_COMMAND: <command>`. Nothing else is treated as a
//! suggestion.

/// Marker that introduces a suggested command
pub const COMMAND_MARKER: &str = "EXECUTE_COMMAND:";

/// Every marked command in `response`, in order, without duplicates.
pub fn extract_commands(response: &str) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    for line in response.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '>', ' ']);
        let line = line.trim_start_matches('`');
        let Some(rest) = line.strip_prefix(COMMAND_MARKER) else {
            continue;
        };
        let command = rest.trim().trim_matches('`').trim();
        if !command.is_empty() && !commands.iter().any(|c| c == command) {
            commands.push(command.to_string());
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_marked_lines() {
        let reply = "Update the package index first.\n\
                     EXECUTE_COMMAND: sudo apt update\n\
                     Then check disk usage:\n\
                     EXECUTE_COMMAND: df -h\n";
        assert_eq!(extract_commands(reply), vec!["sudo apt update", "df -h"]);
    }

    #[test]
    fn test_ignores_unmarked_commands() {
        assert!(extract_commands("Run `ls -la` to see files.\n$ ls").is_empty());
    }

    #[test]
    fn test_strips_backticks_and_bullets() {
        let reply = "- EXECUTE_COMMAND: `uname -a`\n`EXECUTE_COMMAND: free -m`";
        assert_eq!(extract_commands(reply), vec!["uname -a", "free -m"]);
    }

    #[test]
    fn test_deduplicates_and_skips_empty() {
        let reply = "EXECUTE_COMMAND: df -h\nEXECUTE_COMMAND:\nEXECUTE_COMMAND: df -h";
        assert_eq!(extract_commands(reply), vec!["df -h"]);
    }
}
