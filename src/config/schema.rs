//! Configuration schema for Ferry
//!
//! Configuration is stored at `~/.config/ferry/config.toml`

use crate::fetch::{FetchOptions, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Content store settings
    pub store: StoreConfig,

    /// Fetch scheduling settings
    pub fetch: FetchConfig,

    /// Retrieval backend settings
    pub retriever: RetrieverConfig,
}

impl Config {
    /// Check values serde accepts but ferry cannot run with
    pub fn validate(&self) -> Result<(), String> {
        match self.general.log_format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(format!(
                    "general.log_format must be \"text\" or \"json\", got \"{}\"",
                    other
                ))
            }
        }

        if let Some(workers) = self.fetch.workers {
            if !(1..=MAX_WORKERS).contains(&workers) {
                return Err(format!(
                    "fetch.workers must be between 1 and {}, got {}",
                    MAX_WORKERS, workers
                ));
            }
        }

        if self.fetch.retrieval_timeout_secs == 0 {
            return Err("fetch.retrieval_timeout_secs must be at least 1".to_string());
        }

        if self.retriever.skopeo.as_os_str().is_empty() {
            return Err("retriever.skopeo must not be empty".to_string());
        }

        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Content store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store root (default: `~/.cache/ferry/store`)
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured root or the platform default
    pub fn root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(super::ConfigManager::default_store_root)
    }
}

/// Fetch scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Parallel retrievals (default: derived from CPU count)
    pub workers: Option<usize>,

    /// Per-retrieval timeout in seconds
    pub retrieval_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            retrieval_timeout_secs: 600,
        }
    }
}

impl FetchConfig {
    /// Coordinator options for this configuration
    pub fn options(&self) -> FetchOptions {
        let mut options = FetchOptions::default()
            .with_retrieval_timeout(Duration::from_secs(self.retrieval_timeout_secs));
        if let Some(workers) = self.workers {
            options = options.with_workers(workers);
        }
        options
    }
}

/// Retrieval backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// skopeo binary (name on PATH or absolute path)
    pub skopeo: PathBuf,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            skopeo: PathBuf::from("skopeo"),
        }
    }
}
