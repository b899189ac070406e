//! Integrity audit trail
//!
//! Every commit into the store and every digest mismatch is appended as one
//! JSON line to `<state_dir>/ferry/audit.log`. On by default, opt out with
//! `general.audit_log = false`.

use crate::config::{schema::Config, ConfigManager};
use crate::descriptor::{Descriptor, OriginKind};
use crate::digest::Digest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Something worth keeping a durable record of
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum StoreEvent {
    #[serde(rename = "artifact.committed")]
    Committed {
        digest: Digest,
        name: String,
        origin: OriginKind,
    },
    /// The source served bytes that hash to something else
    #[serde(rename = "artifact.digest_mismatch")]
    DigestMismatch {
        expected: Digest,
        actual: Digest,
        name: String,
        origin: OriginKind,
        tls_verify: bool,
    },
}

impl StoreEvent {
    pub fn committed(descriptor: &Descriptor) -> Self {
        Self::Committed {
            digest: descriptor.digest().clone(),
            name: descriptor.name().to_string(),
            origin: descriptor.origin(),
        }
    }

    pub fn digest_mismatch(descriptor: &Descriptor, actual: &Digest) -> Self {
        Self::DigestMismatch {
            expected: descriptor.digest().clone(),
            actual: actual.clone(),
            name: descriptor.name().to_string(),
            origin: descriptor.origin(),
            tls_verify: descriptor.tls_verify(),
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a StoreEvent,
}

/// Append-only JSON-lines audit file
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Audit log at the configured location, or disabled
    pub fn new(config: &Config) -> Self {
        if config.general.audit_log {
            Self::at(ConfigManager::audit_log_path())
        } else {
            Self::disabled()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// File being written, if enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event
    ///
    /// Write failures are logged and otherwise ignored.
    pub async fn record(&self, event: &StoreEvent) {
        let Some(path) = &self.path else {
            return;
        };

        let record = Record {
            timestamp: Utc::now(),
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(json) => json + "\n",
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        if let Err(e) = append(path, &line).await {
            warn!("Failed to write audit log {}: {}", path.display(), e);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::disabled()
    }
}

async fn append(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
