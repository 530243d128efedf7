//! ConfigStore: the shared YAML document, split into per-application sections.
//!
//! The whole document is read once in [`ConfigStore::open`] and only goes back
//! to disk through [`ConfigStore::save`]. Anything set in between is lost if
//! the process exits without saving.
//!
//! # Interop with YAML 1.1 readers
//!
//! Older laditools front-ends read the same file with a YAML 1.1 parser.
//! Strings such as `yes`, `no`, `on` and `y` are written unquoted, and such
//! readers load them back as booleans. Values round trip exactly through this
//! crate only.
//!
//! Loading is lossy for hand-written files in two ways, and both persist on the
//! next save: non-string application or parameter keys become strings
//! (`1: one` is saved as `'1': one`), and `!!` tags such as `!!python/tuple`
//! are resolved by the parser and not written back. A `debug` event is logged
//! when a loaded file had its keys converted.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::paths::ConfigPaths;
use crate::ConfigError;

/// Permissions for the saved config file, before umask.
#[cfg(unix)]
const CONFIG_FILE_MODE: u32 = 0o644;

/// Any value a section can hold: scalars, sequences, nested mappings.
pub type ConfigValue = serde_yaml::Value;

/// One application's parameters. The store never looks inside.
pub type ConfigSection = BTreeMap<String, ConfigValue>;

/// The persisted root: application name to section.
///
/// Ordered so saved files list applications and parameters alphabetically.
pub type ConfigDocument = BTreeMap<String, ConfigSection>;

/// How the document was obtained when the store was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file was parsed.
    Loaded { sections: usize },
    /// No file yet, or an empty one. The first save creates it.
    Missing,
    /// The file exists but could not be read. Started empty.
    Unreadable { reason: String },
    /// The file was read but is not a valid config document. Started empty.
    Malformed { reason: String },
}

impl LoadOutcome {
    /// True when an existing file was discarded in favour of an empty document.
    ///
    /// Saving such a store overwrites whatever was on disk.
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Unreadable { .. } | Self::Malformed { .. })
    }
}

/// File-backed config document.
#[derive(Debug)]
pub struct ConfigStore {
    paths: ConfigPaths,
    document: ConfigDocument,
    outcome: LoadOutcome,
}

impl ConfigStore {
    /// Open the store at `paths`, creating the config directory if needed.
    ///
    /// Only directory creation can fail. A missing, unreadable or malformed
    /// file yields an empty document; see [`ConfigStore::load_outcome`].
    pub fn open(paths: ConfigPaths) -> Result<Self, ConfigError> {
        paths.ensure_dir()?;
        let (document, outcome) = load_document(paths.config_file());

        Ok(Self {
            paths,
            document,
            outcome,
        })
    }

    /// Open the current user's store (`~/.config/laditools/laditools.conf`).
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(ConfigPaths::discover()?)
    }

    /// An empty store bound to `paths` that has not touched the disk.
    ///
    /// [`ConfigStore::save`] still writes to `paths`, replacing any file there.
    pub fn in_memory(paths: ConfigPaths) -> Self {
        Self {
            paths,
            document: ConfigDocument::new(),
            outcome: LoadOutcome::Missing,
        }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.outcome
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// The section for `app_name` exactly as stored, if there is one.
    pub fn get_section(&self, app_name: &str) -> Option<&ConfigSection> {
        self.document.get(app_name)
    }

    /// Insert or replace the whole section for `app_name`. Memory only.
    pub fn set_section(&mut self, app_name: impl Into<String>, section: ConfigSection) {
        self.document.insert(app_name.into(), section);
    }

    pub fn remove_section(&mut self, app_name: &str) -> Option<ConfigSection> {
        self.document.remove(app_name)
    }

    /// Application names with a section, in sorted order.
    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    /// Decode the section for `app_name` into a typed settings struct.
    pub fn get_section_as<T: DeserializeOwned>(
        &self,
        app_name: &str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(section) = self.get_section(app_name) else {
            return Ok(None);
        };

        let section_error = |source: serde_yaml::Error| ConfigError::Section {
            app: app_name.to_string(),
            source,
        };
        let value = serde_yaml::to_value(section).map_err(section_error)?;
        serde_yaml::from_value(value).map(Some).map_err(section_error)
    }

    /// Store a typed settings struct as the section for `app_name`.
    ///
    /// `params` must serialize to a mapping with string keys.
    pub fn set_section_from<T: Serialize>(
        &mut self,
        app_name: impl Into<String>,
        params: &T,
    ) -> Result<(), ConfigError> {
        let app_name = app_name.into();
        let section = serde_yaml::to_value(params)
            .and_then(serde_yaml::from_value::<ConfigSection>)
            .map_err(|source| ConfigError::Section {
                app: app_name.clone(),
                source,
            })?;

        self.set_section(app_name, section);
        Ok(())
    }

    /// Write the whole document to disk, replacing the previous file.
    ///
    /// The YAML goes to a uniquely named staging file next to the config file
    /// and is renamed over it, so a crash mid-write leaves the old file intact
    /// and concurrent savers do not trip over each other (last one wins). A
    /// removed config directory is not recreated.
    pub fn save(&self) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(&self.document)?;
        let target = self.paths.config_file();

        replace_file(self.paths.config_dir(), target, yaml.as_bytes()).map_err(|source| {
            ConfigError::Write {
                path: target.to_path_buf(),
                source,
            }
        })?;

        debug!(
            path = %target.display(),
            sections = self.document.len(),
            "saved config"
        );
        Ok(())
    }
}

fn load_document(path: &Path) -> (ConfigDocument, LoadOutcome) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file doesn't exist, a new one will be created on save");
            return (ConfigDocument::new(), LoadOutcome::Missing);
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(path = %path.display(), error = %e, "config file is not valid UTF-8, starting empty");
            return (
                ConfigDocument::new(),
                LoadOutcome::Malformed {
                    reason: e.to_string(),
                },
            );
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "config file is unreadable, starting empty");
            return (
                ConfigDocument::new(),
                LoadOutcome::Unreadable {
                    reason: e.to_string(),
                },
            );
        }
    };

    if contents.trim().is_empty() {
        debug!(path = %path.display(), "config file is empty");
        return (ConfigDocument::new(), LoadOutcome::Missing);
    }

    match serde_yaml::from_str::<ConfigDocument>(&contents) {
        Ok(document) => {
            if serde_yaml::from_str::<ConfigValue>(&contents).is_ok_and(|raw| coerced_on_load(&raw)) {
                debug!(
                    path = %path.display(),
                    "config file has non-string keys, they will be saved as strings"
                );
            }
            debug!(path = %path.display(), sections = document.len(), "loaded config");
            let sections = document.len();
            (document, LoadOutcome::Loaded { sections })
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config file is malformed, starting empty");
            (
                ConfigDocument::new(),
                LoadOutcome::Malformed {
                    reason: e.to_string(),
                },
            )
        }
    }
}

/// True when loading `raw` as a [`ConfigDocument`] turns non-string keys into strings.
fn coerced_on_load(raw: &ConfigValue) -> bool {
    let ConfigValue::Mapping(apps) = raw else {
        return false;
    };
    apps.iter().any(|(app, section)| {
        !app.is_string()
            || matches!(section, ConfigValue::Mapping(params) if params.keys().any(|key| !key.is_string()))
    })
}

/// Write `contents` to a fresh staging file in `dir`, flush it, then rename it
/// over `target`. The staging file is deleted if anything fails.
fn replace_file(dir: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".laditools.conf.").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(CONFIG_FILE_MODE));
    }

    let mut staging = builder.tempfile_in(dir)?;
    staging.write_all(contents)?;
    staging.as_file().sync_all()?;
    staging.persist(target).map_err(|e| e.error)?;
    Ok(())
}
