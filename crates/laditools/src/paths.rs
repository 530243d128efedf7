//! Config directory and file resolution.

use crate::ConfigError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory under the user's home that holds the laditools config.
const CONFIG_SUBDIR: &str = ".config/laditools";

/// Name of the shared config file inside the config directory.
pub const CONFIG_FILENAME: &str = "laditools.conf";

/// Permissions for a freshly created config directory.
#[cfg(unix)]
const CONFIG_DIR_MODE: u32 = 0o755;

/// Where the config document lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigPaths {
    /// Paths for the user whose home directory is `home`.
    ///
    /// Yields `<home>/.config/laditools/laditools.conf`.
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        Self::in_dir(home.into().join(CONFIG_SUBDIR))
    }

    /// Paths rooted at an arbitrary config directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        let config_file = config_dir.join(CONFIG_FILENAME);
        Self {
            config_dir,
            config_file,
        }
    }

    /// Paths for the current user, resolved from `HOME`.
    pub fn discover() -> Result<Self, ConfigError> {
        directories::BaseDirs::new()
            .map(|dirs| Self::from_home(dirs.home_dir()))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Create the config directory and any missing parents.
    ///
    /// An already existing directory counts as success, including one that
    /// another process created between our check and our create.
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        if self.config_dir.is_dir() {
            return Ok(());
        }

        create_config_dir(&self.config_dir).map_err(|source| ConfigError::CreateDir {
            path: self.config_dir.clone(),
            source,
        })?;

        tracing::debug!(path = %self.config_dir.display(), "created config directory");
        Ok(())
    }
}

#[cfg(unix)]
fn create_config_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(CONFIG_DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_config_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
