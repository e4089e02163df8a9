//! Configuration for Kuzco.
//!
//! Settings come from five layers, highest precedence first:
//! CLI flag > process environment > `.env` in the working directory >
//! `~/.config/kuzco/config.toml` > built-in defaults.
//!
//! The dotfile location can be overridden with `KUZCO_CONFIG`.
//!
//! Use the [`resolver`] module to build a [`Settings`] value, then hand that
//! value to each component. Nothing below the CLI reads the environment.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_PATH_ENV, ConfigOverrides, ConfigSources, Layer, Resolved, ResolvedSettings,
    ValueSource, config_file_path, resolve,
};
pub use schema::{FileConfig, KNOWN_KEYS, Settings};
