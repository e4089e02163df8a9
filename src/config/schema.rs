//! Settings schema, built-in defaults and the `config.toml` dotfile format.
//!
//! Every setting has one canonical upper-case key (the name used in the
//! environment and in `.env` files). The dotfile uses the same names in
//! lower case:
//!
//! ```toml
//! safe_mode = true
//! create_backups = true
//! max_preview_size = 2000
//! command_timeout = 30
//! default_model = "llama3.2"
//! sudo_prefixes = ["sudo", "su", "doas"]
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const SAFE_MODE: &str = "SAFE_MODE";
pub const CREATE_BACKUPS: &str = "CREATE_BACKUPS";
pub const MAX_PREVIEW_SIZE: &str = "MAX_PREVIEW_SIZE";
pub const COMMAND_TIMEOUT: &str = "COMMAND_TIMEOUT";
pub const DEFAULT_MODEL: &str = "DEFAULT_MODEL";
pub const MAX_EDIT_SIZE: &str = "MAX_EDIT_SIZE";
pub const BACKUP_DIR: &str = "BACKUP_DIR";
pub const EXIT_COMMANDS: &str = "EXIT_COMMANDS";
pub const SUDO_PREFIXES: &str = "SUDO_PREFIXES";
pub const OLLAMA_HOST: &str = "OLLAMA_HOST";

/// All recognized keys, in display order.
pub const KNOWN_KEYS: &[&str] = &[
    SAFE_MODE,
    CREATE_BACKUPS,
    MAX_PREVIEW_SIZE,
    COMMAND_TIMEOUT,
    DEFAULT_MODEL,
    MAX_EDIT_SIZE,
    BACKUP_DIR,
    EXIT_COMMANDS,
    SUDO_PREFIXES,
    OLLAMA_HOST,
];

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Fully resolved settings, handed to each component at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Require a backup before any file is overwritten
    pub safe_mode: bool,
    /// Take backups even when safe mode is off
    pub create_backups: bool,
    /// Cap on the number of bytes shown in a file preview
    pub max_preview_size: usize,
    /// Wall-clock limit for a suggested shell command
    pub command_timeout: Duration,
    /// Model used when `--model` is not given
    pub default_model: Option<String>,
    /// Largest file (in bytes) the edit applier accepts
    pub max_edit_size: u64,
    /// Directory for backups; `None` keeps them next to the original
    pub backup_dir: Option<PathBuf>,
    /// Words that end the chat loop
    pub exit_commands: Vec<String>,
    /// First words that mark a command as privilege-elevating
    pub sudo_prefixes: Vec<String>,
    /// Base URL of the model runtime
    pub ollama_host: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            safe_mode: true,
            create_backups: true,
            max_preview_size: 2000,
            command_timeout: Duration::from_secs(30),
            default_model: None,
            max_edit_size: 1024 * 1024,
            backup_dir: None,
            exit_commands: parse_list("exit,quit,bye,goodbye"),
            sudo_prefixes: parse_list("sudo,su"),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
        }
    }
}

impl Settings {
    /// Validate the settings values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_preview_size == 0 {
            return Err(format!("{} must be greater than 0", MAX_PREVIEW_SIZE));
        }
        if self.command_timeout.is_zero() {
            return Err(format!("{} must be greater than 0", COMMAND_TIMEOUT));
        }
        if self.max_edit_size == 0 {
            return Err(format!("{} must be greater than 0", MAX_EDIT_SIZE));
        }
        if self.ollama_host.trim().is_empty() {
            return Err(format!("{} must not be empty", OLLAMA_HOST));
        }
        Ok(())
    }

    /// Whether `word` is one of the configured exit words (case-insensitive).
    pub fn is_exit_command(&self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        self.exit_commands.iter().any(|c| c.to_lowercase() == word)
    }

    /// Render a single key's value the way it would be written in a `.env` file.
    pub fn display_value(&self, key: &str) -> String {
        match key {
            SAFE_MODE => self.safe_mode.to_string(),
            CREATE_BACKUPS => self.create_backups.to_string(),
            MAX_PREVIEW_SIZE => self.max_preview_size.to_string(),
            COMMAND_TIMEOUT => self.command_timeout.as_secs().to_string(),
            DEFAULT_MODEL => self.default_model.clone().unwrap_or_default(),
            MAX_EDIT_SIZE => self.max_edit_size.to_string(),
            BACKUP_DIR => self
                .backup_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            EXIT_COMMANDS => self.exit_commands.join(","),
            SUDO_PREFIXES => self.sudo_prefixes.join(","),
            OLLAMA_HOST => self.ollama_host.clone(),
            _ => String::new(),
        }
    }
}

/// Parse a boolean the way shell users write them.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated list, dropping empty items.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Give a bare `host:port` an http scheme and drop any trailing slash.
pub fn normalize_host(s: &str) -> String {
    let s = s.trim().trim_end_matches('/');
    if s.contains("://") {
        s.to_string()
    } else {
        format!("http://{}", s)
    }
}

/// Contents of `~/.config/kuzco/config.toml`.
///
/// Every field is optional; unset fields fall through to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    pub safe_mode: Option<bool>,
    pub create_backups: Option<bool>,
    pub max_preview_size: Option<u64>,
    pub command_timeout: Option<u64>,
    pub default_model: Option<String>,
    pub max_edit_size: Option<u64>,
    pub backup_dir: Option<PathBuf>,
    pub exit_commands: Option<Vec<String>>,
    pub sudo_prefixes: Option<Vec<String>>,
    pub ollama_host: Option<String>,
}

impl FileConfig {
    /// Parse a dotfile.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Flatten into `(KEY, value)` pairs using the same textual form as the
    /// environment, so every layer resolves through one code path.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.safe_mode {
            pairs.push((SAFE_MODE, v.to_string()));
        }
        if let Some(v) = self.create_backups {
            pairs.push((CREATE_BACKUPS, v.to_string()));
        }
        if let Some(v) = self.max_preview_size {
            pairs.push((MAX_PREVIEW_SIZE, v.to_string()));
        }
        if let Some(v) = self.command_timeout {
            pairs.push((COMMAND_TIMEOUT, v.to_string()));
        }
        if let Some(ref v) = self.default_model {
            pairs.push((DEFAULT_MODEL, v.clone()));
        }
        if let Some(v) = self.max_edit_size {
            pairs.push((MAX_EDIT_SIZE, v.to_string()));
        }
        if let Some(ref v) = self.backup_dir {
            pairs.push((BACKUP_DIR, v.display().to_string()));
        }
        if let Some(ref v) = self.exit_commands {
            pairs.push((EXIT_COMMANDS, v.join(",")));
        }
        if let Some(ref v) = self.sudo_prefixes {
            pairs.push((SUDO_PREFIXES, v.join(",")));
        }
        if let Some(ref v) = self.ollama_host {
            pairs.push((OLLAMA_HOST, v.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let s = Settings::default();
        assert!(s.safe_mode);
        assert!(s.create_backups);
        assert_eq!(s.max_preview_size, 2000);
        assert_eq!(s.command_timeout, Duration::from_secs(30));
        assert_eq!(s.default_model, None);
        assert_eq!(s.sudo_prefixes, vec!["sudo", "su"]);
        assert_eq!(s.exit_commands, vec!["exit", "quit", "bye", "goodbye"]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let s = Settings {
            command_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(s.validate().unwrap_err().contains(COMMAND_TIMEOUT));
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_list_trims_and_drops_empty() {
        assert_eq!(parse_list("sudo, su,,doas "), vec!["sudo", "su", "doas"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(
            normalize_host("https://gpu-box:11434/"),
            "https://gpu-box:11434"
        );
    }

    #[test]
    fn test_is_exit_command_case_insensitive() {
        let s = Settings::default();
        assert!(s.is_exit_command("Quit"));
        assert!(s.is_exit_command(" bye "));
        assert!(!s.is_exit_command("exiting"));
    }

    #[test]
    fn test_file_config_parse_and_flatten() {
        let cfg = FileConfig::parse(
            r#"
safe_mode = false
command_timeout = 5
sudo_prefixes = ["sudo", "doas"]
default_model = "llama3.2"
"#,
        )
        .unwrap();
        assert_eq!(cfg.safe_mode, Some(false));
        let pairs = cfg.to_pairs();
        assert!(pairs.contains(&(SAFE_MODE, "false".to_string())));
        assert!(pairs.contains(&(COMMAND_TIMEOUT, "5".to_string())));
        assert!(pairs.contains(&(SUDO_PREFIXES, "sudo,doas".to_string())));
        assert!(pairs.contains(&(DEFAULT_MODEL, "llama3.2".to_string())));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_file_config_rejects_wrong_types() {
        assert!(FileConfig::parse("command_timeout = \"soon\"").is_err());
    }

    #[test]
    fn test_display_value_roundtrips_lists() {
        let s = Settings::default();
        assert_eq!(s.display_value(SUDO_PREFIXES), "sudo,su");
        assert_eq!(s.display_value(COMMAND_TIMEOUT), "30");
        assert_eq!(s.display_value(DEFAULT_MODEL), "");
    }
}
