//! Runtime configuration.
//!
//! Configuration is a JSON document; every section and field is optional:
//!
//! ```json
//! {
//!   "executor": { "task_event_buffer": 1, "event_buffer": 1 },
//!   "scaler": { "poll_interval_secs": 10 },
//!   "store": { "root": "/var/lib/drydock" }
//! }
//! ```

use crate::machine::adapters::file::FileStore;
use crate::machine::ports::StoreError;
use crate::machine::services::ExecutorConfig;
use crate::scaler::ScalerConfig;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The path has no file name component.
    #[error("configuration path {0} does not name a file")]
    NotAFile(Utf8PathBuf),
    /// The file could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        /// File that was read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid configuration JSON.
    #[error("failed to parse configuration: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the file-backed record store. Records are kept in
    /// memory when unset.
    pub root: Option<Utf8PathBuf>,
}

impl StoreConfig {
    /// Opens the file store when a root directory is configured.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the directory cannot be
    /// created or opened.
    pub fn open_file_store(&self) -> Result<Option<FileStore>, StoreError> {
        self.root.as_deref().map(FileStore::open).transpose()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrydockConfig {
    /// Pipeline executor channel sizing.
    pub executor: ExecutorConfig,
    /// Group scaler settings.
    pub scaler: ScalerConfig,
    /// Record store settings.
    pub store: StoreConfig,
}

impl DrydockConfig {
    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAFile`] when `path` has no file name,
    /// [`ConfigError::Read`] when the file cannot be read, or
    /// [`ConfigError::Parse`] for malformed documents.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ConfigError::NotAFile(path.to_path_buf()))?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let read_error = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let text = dir.read_to_string(file_name).map_err(read_error)?;
        Self::from_json_str(&text)
    }
}
