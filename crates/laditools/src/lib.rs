//! Per-user configuration store for the LADI audio desktop tools.
//!
//! Every laditools front-end (tray icon, log viewer, session menu) keeps its
//! settings in one shared YAML document, one section per application. This
//! crate owns that document: it loads it once, hands out sections, and writes
//! the whole thing back when asked.
//!
//! # Usage
//!
//! ```rust,no_run
//! use laditools::{ConfigSection, ConfigStore, ConfigValue};
//!
//! let mut store = ConfigStore::open_default().expect("config dir");
//!
//! let mut section = store.get_section("ladi-system-tray").cloned().unwrap_or_default();
//! section.insert("autostart".into(), ConfigValue::Bool(true));
//! store.set_section("ladi-system-tray", section);
//!
//! store.save().expect("failed to save config");
//! ```
//!
//! # File Location
//!
//! `~/.config/laditools/laditools.conf`, resolved from `HOME`. Tests and
//! sandboxed callers pass their own [`ConfigPaths`] instead.
//!
//! # Example File
//!
//! ```yaml
//! ladi-system-tray:
//!   autostart: true
//!   jack_config_on_start: false
//! ladi-control-center:
//!   geometry:
//!   - 640
//!   - 480
//! ```
//!
//! # Load Recovery
//!
//! A missing, unreadable or malformed file never fails [`ConfigStore::open`];
//! the store starts from an empty document instead. What happened is kept in
//! [`LoadOutcome`] and logged through `tracing`, so a corrupt file does not
//! vanish silently. Save failures, on the other hand, are returned to the
//! caller.

pub mod paths;
pub mod store;

pub use paths::ConfigPaths;
pub use store::{ConfigDocument, ConfigSection, ConfigStore, ConfigValue, LoadOutcome};

use std::path::PathBuf;
use thiserror::Error;

/// Configuration store errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user's home directory")]
    NoHomeDir,

    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Config section {app} has an unexpected shape: {source}")]
    Section {
        app: String,
        source: serde_yaml::Error,
    },
}
