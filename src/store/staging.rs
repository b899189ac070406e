//! Task-private staging areas

use crate::error::{FerryError, FerryResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the bundle directory a retriever writes inside a staging area
const ARTIFACT_DIR: &str = "artifact";

/// Scratch directory receiving unverified retrieved bytes
///
/// Removed when dropped, on success and failure alike. After a commit the
/// artifact has been renamed out, so only the empty shell is removed.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub(crate) fn new_in(parent: &Path) -> FerryResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(super::STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                FerryError::store(format!("creating staging area in {}", parent.display()), e)
            })?;
        Ok(Self { dir })
    }

    /// Staging area directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the retriever places the artifact bundle (not created up front)
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.path().join(ARTIFACT_DIR)
    }
}
