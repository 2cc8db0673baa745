//! Configuration types for Portfolio.
//!
//! [`Config`] holds the storage backend choice, autosave preferences, cloud
//! credentials and appearance. It is persisted as TOML, typically at
//! `~/.config/portfolio/config.toml` on Unix systems.
//!
//! # Example
//!
//! ```ignore
//! use portfolio_core::config::Config;
//!
//! let config = Config::load()?;
//! let settings = config.autosave_settings();
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};
use crate::exchange::EXPORT_FILE_NAME;
use crate::fs::FileSystem;
use crate::save::{AutosaveSettings, DEFAULT_AUTOSAVE_INTERVAL};

/// Where the document is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Nothing survives the process
    Memory,
    /// A JSON file the user picked
    File,
    /// Embedded SQLite key-value store
    #[default]
    Store,
    /// Google Drive application folder
    Drive,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "file" => Ok(Backend::File),
            "store" => Ok(Backend::Store),
            "drive" => Ok(Backend::Drive),
            other => Err(format!(
                "unknown backend '{other}' (expected memory, file, store or drive)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL.as_millis() as u64
}

fn default_accent() -> String {
    "#3b82f6".to_string()
}

/// User-configurable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,

    /// Data file for the `file` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Database for the `store` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub autosave: bool,

    /// Debounce window in milliseconds, clamped to 500..=60000 on use
    #[serde(default = "default_interval_ms")]
    pub autosave_interval_ms: u64,

    // ========================================================================
    // Cloud sync
    // ========================================================================
    #[serde(default)]
    pub cloud_sync_enabled: bool,

    /// OAuth client id for Google sign-in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,

    // ========================================================================
    // Appearance
    // ========================================================================
    #[serde(default)]
    pub theme: Theme,

    #[serde(default = "default_accent")]
    pub accent_color: String,

    /// Last active entry, restored on open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_entry_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            file_path: None,
            store_path: None,
            autosave: true,
            autosave_interval_ms: default_interval_ms(),
            cloud_sync_enabled: false,
            google_client_id: None,
            google_client_secret: None,
            theme: Theme::default(),
            accent_color: default_accent(),
            active_entry_id: None,
        }
    }
}

impl Config {
    pub fn autosave_settings(&self) -> AutosaveSettings {
        AutosaveSettings::new(self.autosave, Duration::from_millis(self.autosave_interval_ms))
    }

    /// Data file for the `file` backend, defaulting to the data directory
    pub fn resolved_file_path(&self) -> Result<PathBuf> {
        match &self.file_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(EXPORT_FILE_NAME)),
        }
    }

    /// Database for the `store` backend, defaulting to the data directory
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("portfolio.sqlite3")),
        }
    }

    /// Load config from `path`, or return the default if it doesn't exist
    pub fn load_from<FS: FileSystem + ?Sized>(fs: &FS, path: &Path) -> Result<Self> {
        if !fs.exists(path) {
            return Ok(Config::default());
        }
        let contents = fs
            .read_to_string(path)
            .map_err(|source| PortfolioError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to<FS: FileSystem + ?Sized>(&self, fs: &FS, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs.write_file(path, &contents)
            .map_err(|source| PortfolioError::FileWrite {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Get the config file path (~/.config/portfolio/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portfolio").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok_or(PortfolioError::NoConfigDir)?;
        Self::load_from(&crate::fs::RealFileSystem, &path)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(PortfolioError::NoConfigDir)?;
        self.save_to(&crate::fs::RealFileSystem, &path)
    }
}

fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("portfolio"))
        .ok_or(PortfolioError::NoConfigDir)
}
