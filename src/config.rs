//! Persisted settings: download token, database file names, and the release
//! date of the database currently on disk.
//!
//! The file is TOML with a single `[database]` table:
//!
//! ```toml
//! [database]
//! token = "your-ip2location-token"
//! database-code = "DB1LITECSV"
//! file = "IP2LOCATION-LITE-DB1.CSV"
//! database-version-file = "IP2LOCATION-LITE-DB1.CSV.ZIP"
//! database-version-date = "Oct 01, 2026"
//! ```
//!
//! A [`Config`] is loaded once at start and only written back through a
//! [`ConfigStore`] after a successful database refresh.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GeoblockError, Result};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "geoblock.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Everything needed to find, download, and date the geolocation database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DatabaseConfig {
    /// IP2Location download token.
    pub token: String,
    /// Product code passed to the download endpoint.
    pub database_code: String,
    /// CSV file inside the archive, and where it is stored locally.
    pub file: PathBuf,
    /// File name the version page links to; anchors the release date.
    pub database_version_file: String,
    /// Release date of the database on disk; empty if never downloaded.
    pub database_version_date: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            token: String::new(),
            database_code: "DB1LITECSV".to_string(),
            file: PathBuf::from("IP2LOCATION-LITE-DB1.CSV"),
            database_version_file: "IP2LOCATION-LITE-DB1.CSV.ZIP".to_string(),
            database_version_date: String::new(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GeoblockError::Config(e.to_string()))
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeoblockError::Config(e.to_string()))
    }

    /// Load the configuration from `path`, falling back to defaults if it does not exist.
	///
	/// # Errors
	/// Returns an error if the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Config::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration to `path`, replacing any existing file.
	///
	/// The content goes to a temporary file next to the destination first and is
	/// then renamed into place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(content.as_bytes())?;
            f.sync_all()?;
        }
        if path.exists() {
            let _ = fs::remove_file(path);
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Where a changed [`Config`] is persisted.
pub trait ConfigStore {
    fn save(&mut self, config: &Config) -> Result<()>;
}

/// Persists the configuration to a file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn save(&mut self, config: &Config) -> Result<()> {
        config.save(&self.path)?;
        log::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}
