//! Layered resolution of settings with source tracking.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (`--model`, `--host`)
//! 2. Process environment variables
//! 3. `.env` file in the working directory
//! 4. User dotfile (`~/.config/kuzco/config.toml`, or `KUZCO_CONFIG`)
//! 5. Built-in defaults
//!
//! Every layer is reduced to raw `KEY -> text` pairs first, so a value parses
//! the same way no matter where it came from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::schema::{
    self, BACKUP_DIR, COMMAND_TIMEOUT, CREATE_BACKUPS, DEFAULT_MODEL, EXIT_COMMANDS, FileConfig,
    KNOWN_KEYS, MAX_EDIT_SIZE, MAX_PREVIEW_SIZE, OLLAMA_HOST, SAFE_MODE, SUDO_PREFIXES, Settings,
};
use crate::{Error, Result};

/// Environment variable that points at an alternative dotfile.
pub const CONFIG_PATH_ENV: &str = "KUZCO_CONFIG";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from a process environment variable
    EnvVar(String),
    /// Value from a `.env` file
    DotEnv(PathBuf),
    /// Value from the TOML dotfile
    ConfigFile(PathBuf),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::DotEnv(path) => write!(f, "dotenv:{}", path.display()),
            ValueSource::ConfigFile(path) => write!(f, "file:{}", path.display()),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// One configuration layer: raw text values keyed by canonical name.
#[derive(Debug, Clone)]
pub struct Layer {
    origin: Origin,
    values: HashMap<String, String>,
}

/// Where a layer was read from; turned into a per-key `ValueSource`.
#[derive(Debug, Clone)]
enum Origin {
    Cli,
    Env,
    DotEnv(PathBuf),
    File(PathBuf),
}

impl Layer {
    fn new(origin: Origin) -> Self {
        Self {
            origin,
            values: HashMap::new(),
        }
    }

    /// An empty layer of process-environment values.
    pub fn env() -> Self {
        Self::new(Origin::Env)
    }

    /// An empty layer of `.env` values read from `path`.
    pub fn dotenv(path: impl Into<PathBuf>) -> Self {
        Self::new(Origin::DotEnv(path.into()))
    }

    /// An empty layer of dotfile values read from `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Origin::File(path.into()))
    }

    /// Set a value (builder style).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Look up a key. Empty strings count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn source_for(&self, key: &str) -> ValueSource {
        match &self.origin {
            Origin::Cli => ValueSource::CliFlag,
            Origin::Env => ValueSource::EnvVar(key.to_string()),
            Origin::DotEnv(path) => ValueSource::DotEnv(path.clone()),
            Origin::File(path) => ValueSource::ConfigFile(path.clone()),
        }
    }
}

/// Raw configuration layers gathered at start-up.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Dotfile layer (lowest file-based precedence)
    pub file: Option<Layer>,
    /// `.env` layer
    pub dotenv: Option<Layer>,
    /// Process environment layer
    pub env: Option<Layer>,
}

impl ConfigSources {
    /// No layers at all: everything resolves to defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Gather every layer for a process started in `cwd`.
    ///
    /// The process environment is read but never modified; `.env` values are
    /// kept in their own layer instead of being exported.
    pub fn load(cwd: &Path) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) if path.is_file() => Some(load_config_file(&path)?),
            _ => None,
        };

        let dotenv_path = cwd.join(".env");
        let dotenv = if dotenv_path.is_file() {
            Some(load_dotenv(&dotenv_path)?)
        } else {
            None
        };

        let env = env_layer(|key| std::env::var(key).ok());

        Ok(Self {
            file,
            dotenv,
            env: Some(env),
        })
    }
}

/// Location of the TOML dotfile: `KUZCO_CONFIG` if set, otherwise
/// `<config dir>/kuzco/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("kuzco").join("config.toml"))
}

/// Read the TOML dotfile into a layer.
pub fn load_config_file(path: &Path) -> Result<Layer> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    let config = FileConfig::parse(&text)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let mut layer = Layer::file(path);
    for (key, value) in config.to_pairs() {
        layer.insert(key, value);
    }
    Ok(layer)
}

/// Read a `.env` file into a layer, keeping only recognized keys.
pub fn load_dotenv(path: &Path) -> Result<Layer> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let mut layer = Layer::dotenv(path);
    for item in iter {
        let (key, value) =
            item.map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
        if KNOWN_KEYS.contains(&key.as_str()) {
            layer.insert(&key, value);
        }
    }
    Ok(layer)
}

/// Build the environment layer from a lookup function.
pub fn env_layer(lookup: impl Fn(&str) -> Option<String>) -> Layer {
    let mut layer = Layer::env();
    for &key in KNOWN_KEYS {
        if let Some(value) = lookup(key) {
            layer.insert(key, value);
        }
    }
    layer
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Model override from `--model`
    pub model: Option<String>,
    /// Runtime URL override from `--host`
    pub host: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set runtime URL override.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    fn to_layer(&self) -> Layer {
        let mut layer = Layer::new(Origin::Cli);
        if let Some(ref model) = self.model {
            layer.insert(DEFAULT_MODEL, model.clone());
        }
        if let Some(ref host) = self.host {
            layer.insert(OLLAMA_HOST, host.clone());
        }
        layer
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    /// The settings handed to components
    pub settings: Settings,
    sources: HashMap<&'static str, ValueSource>,
}

impl ResolvedSettings {
    /// Where `key` was resolved from.
    pub fn source(&self, key: &str) -> &ValueSource {
        self.sources.get(key).unwrap_or(&ValueSource::Default)
    }

    /// Get one setting together with its source.
    pub fn get(&self, key: &str) -> Resolved<String> {
        Resolved::new(self.settings.display_value(key), self.source(key).clone())
    }

    /// Every recognized key with its display value and source, in display order.
    pub fn entries(&self) -> Vec<(&'static str, Resolved<String>)> {
        KNOWN_KEYS.iter().map(|key| (*key, self.get(key))).collect()
    }
}

/// Resolve settings with the full precedence chain.
pub fn resolve(sources: &ConfigSources, overrides: &ConfigOverrides) -> Result<ResolvedSettings> {
    let cli = overrides.to_layer();
    let layers: Vec<&Layer> = [
        Some(&cli),
        sources.env.as_ref(),
        sources.dotenv.as_ref(),
        sources.file.as_ref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut settings = Settings::default();
    let mut resolved_sources = HashMap::new();

    for &key in KNOWN_KEYS {
        let found = layers
            .iter()
            .find_map(|layer| layer.get(key).map(|raw| (raw, layer.source_for(key))));

        match found {
            Some((raw, source)) => {
                apply(&mut settings, key, raw).map_err(|msg| {
                    Error::InvalidInput(format!("{} = {:?} (from {}): {}", key, raw, source, msg))
                })?;
                resolved_sources.insert(key, source);
            }
            None => {
                resolved_sources.insert(key, ValueSource::Default);
            }
        }
    }

    settings.validate().map_err(Error::InvalidInput)?;

    Ok(ResolvedSettings {
        settings,
        sources: resolved_sources,
    })
}

fn apply(settings: &mut Settings, key: &str, raw: &str) -> std::result::Result<(), String> {
    let raw = raw.trim();
    match key {
        SAFE_MODE => settings.safe_mode = parse_bool(raw)?,
        CREATE_BACKUPS => settings.create_backups = parse_bool(raw)?,
        MAX_PREVIEW_SIZE => settings.max_preview_size = parse_number(raw)? as usize,
        COMMAND_TIMEOUT => {
            settings.command_timeout = std::time::Duration::from_secs(parse_number(raw)?)
        }
        DEFAULT_MODEL => settings.default_model = Some(raw.to_string()),
        MAX_EDIT_SIZE => settings.max_edit_size = parse_number(raw)?,
        BACKUP_DIR => settings.backup_dir = Some(expand_home(Path::new(raw))),
        EXIT_COMMANDS => settings.exit_commands = schema::parse_list(raw),
        SUDO_PREFIXES => settings.sudo_prefixes = schema::parse_list(raw),
        OLLAMA_HOST => settings.ollama_host = schema::normalize_host(raw),
        _ => {}
    }
    Ok(())
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    schema::parse_bool(raw).ok_or_else(|| "expected true or false".to_string())
}

fn parse_number(raw: &str) -> std::result::Result<u64, String> {
    raw.parse::<u64>()
        .map_err(|_| "expected a non-negative whole number".to_string())
}

/// Expand ~ in path to home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
