//! Content-addressed artifact store
//!
//! Maps digests to verified artifact bundles on disk.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   sha256:<hex>/      committed entry (one per digest, never mutated)
//!   .staging/
//!     stage-XXXXXX/    task-private staging area, removed on drop
//! ```
//!
//! Entries only ever appear through a single `rename` from `.staging/`, which
//! lives on the same filesystem, so a reader never observes a partial entry.
//! Bundle contents are fsync'd before the rename and the root after it, so
//! a power loss cannot leave a visible entry with missing data.
//!
//! # Entry States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Absent | nothing | Not fetched yet, or a previous fetch failed |
//! | Staged | `.staging/stage-*` | In flight, private to one task |
//! | Committed | `<root>/<digest>` | Verified, immutable |

mod durable;
mod staging;

pub use staging::StagingArea;

use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

/// Directory under the store root holding in-flight staging areas
const STAGING_DIR: &str = ".staging";

/// Name prefix of staging areas
const STAGING_PREFIX: &str = "stage-";

/// Result of committing a staged artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call published the entry
    Committed,
    /// Another writer published the same digest first
    AlreadyPresent,
}

/// On-disk mapping from digest to artifact bundle
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    staging_dir: PathBuf,
}

impl ContentStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> FerryResult<Self> {
        let root = root.into();
        let staging_dir = root.join(STAGING_DIR);

        fs::create_dir_all(&staging_dir).await.map_err(|e| {
            FerryError::store(format!("creating store at {}", root.display()), e)
        })?;

        debug!("Opened content store at {}", root.display());
        Ok(Self { root, staging_dir })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding in-flight staging areas
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Location of the entry for `digest` (whether or not it exists)
    pub fn entry_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.to_string())
    }

    /// Whether a committed entry exists for `digest`
    pub async fn exists(&self, digest: &Digest) -> FerryResult<bool> {
        let path = self.entry_path(digest);
        fs::try_exists(&path)
            .await
            .map_err(|e| FerryError::store(format!("checking {}", path.display()), e))
    }

    /// Create a private staging area on the store's filesystem
    pub fn stage(&self) -> FerryResult<StagingArea> {
        StagingArea::new_in(&self.staging_dir)
    }

    /// Publish the bundle at `staged` under `digest`
    ///
    /// The publish is one rename. If it fails because the digest was
    /// committed concurrently, the commit counts as done: content under a
    /// digest is identical by definition.
    pub async fn commit(&self, digest: &Digest, staged: &Path) -> FerryResult<CommitOutcome> {
        let dest = self.entry_path(digest);

        durable::sync_tree(staged)
            .await
            .map_err(|e| FerryError::store(format!("flushing {}", staged.display()), e))?;

        match fs::rename(staged, &dest).await {
            Ok(()) => {
                if let Err(e) = durable::sync_dir(&self.root).await {
                    warn!("Failed to flush store root {}: {}", self.root.display(), e);
                }
                debug!("Committed {} to {}", digest.short(), dest.display());
                Ok(CommitOutcome::Committed)
            }
            Err(e) => {
                if fs::try_exists(&dest).await.unwrap_or(false) {
                    debug!("{} already committed by another writer", digest.short());
                    Ok(CommitOutcome::AlreadyPresent)
                } else {
                    Err(FerryError::store(
                        format!("publishing {} to {}", staged.display(), dest.display()),
                        e,
                    ))
                }
            }
        }
    }

    /// Remove staging areas untouched for longer than `older_than`
    ///
    /// Live staging areas are dropped by their task; anything this old was
    /// left behind by a killed process. Returns how many were removed.
    pub async fn sweep_staging(&self, older_than: Duration) -> FerryResult<usize> {
        let listing_error = |e: std::io::Error| {
            FerryError::store(format!("listing {}", self.staging_dir.display()), e)
        };
        let mut entries = fs::read_dir(&self.staging_dir).await.map_err(listing_error)?;

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                // Already removed by its owner
                Err(_) => continue,
            };
            if now.duration_since(modified).unwrap_or_default() <= older_than {
                continue;
            }

            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FerryError::store(
                        format!("removing stale {}", entry.path().display()),
                        e,
                    ))
                }
            }
        }

        if removed > 0 {
            debug!("Swept {} stale staging area(s)", removed);
        }
        Ok(removed)
    }

    /// All committed digests, sorted
    pub async fn list(&self) -> FerryResult<Vec<Digest>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| FerryError::store(format!("listing {}", self.root.display()), e))?;

        let mut digests = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FerryError::store(format!("listing {}", self.root.display()), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            match name.parse::<Digest>() {
                Ok(digest) => digests.push(digest),
                Err(_) => debug!("Ignoring foreign entry in store: {}", name),
            }
        }

        digests.sort();
        Ok(digests)
    }

    /// Recompute the digest of a committed entry and compare it to its key
    pub async fn verify_entry(&self, digest: &Digest) -> FerryResult<()> {
        crate::verify::check_digest(&self.entry_path(digest), digest).await
    }
}
