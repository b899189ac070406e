//! Configuration for Ferry
//!
//! A single optional TOML file. Every key has a default, so a missing file
//! or a partial one is fine, but values are checked on load and before save:
//! a bad `fetch.workers` is reported against the file, not mid-fetch.

pub mod schema;

pub use schema::Config;

use crate::error::{FerryError, FerryResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Directory name under each platform base directory
const APP_DIR: &str = "ferry";

/// Platform directory for ferry, or the working directory when the platform
/// has none
fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Locates, reads and writes the config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default config file
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Manager for an explicit config file (`--config` / `FERRY_CONFIG`)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/ferry/config.toml`
    pub fn default_config_path() -> PathBuf {
        app_dir(dirs::config_dir()).join("config.toml")
    }

    /// `<state dir>/ferry`, falling back to the local data dir on platforms
    /// without a state dir
    pub fn state_dir() -> PathBuf {
        app_dir(dirs::state_dir().or_else(dirs::data_local_dir))
    }

    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// `<cache dir>/ferry/store`, used when `store.root` is unset
    pub fn default_store_root() -> PathBuf {
        app_dir(dirs::cache_dir()).join("store")
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate the config file; defaults if there is none
    pub async fn load(&self) -> FerryResult<Config> {
        match fs::read_to_string(&self.config_path).await {
            Ok(content) => self.parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "No config at {}, using defaults",
                    self.config_path.display()
                );
                Ok(Config::default())
            }
            Err(e) => Err(FerryError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )),
        }
    }

    /// Parse and validate config text as if it came from this file
    pub fn parse(&self, content: &str) -> FerryResult<Config> {
        let config: Config = toml::from_str(content).map_err(|e| self.invalid(e.to_string()))?;
        config.validate().map_err(|reason| self.invalid(reason))?;
        Ok(config)
    }

    /// Validate and write the config
    ///
    /// The file is replaced by rename, so a concurrent `load` sees either the
    /// old or the new contents.
    pub async fn save(&self, config: &Config) -> FerryResult<()> {
        config.validate().map_err(|reason| self.invalid(reason))?;
        let content = toml::to_string_pretty(config)?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FerryError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let write_error = |e: std::io::Error| {
            FerryError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        };
        let tmp = self.config_path.with_extension("toml.tmp");
        fs::write(&tmp, content).await.map_err(write_error)?;
        fs::rename(&tmp, &self.config_path)
            .await
            .map_err(write_error)?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    fn invalid(&self, reason: String) -> FerryError {
        FerryError::ConfigInvalid {
            path: self.config_path.clone(),
            reason,
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
