//! skopeo-backed retriever
//!
//! Copies the top-level manifest of an image into a `dir:` layout with
//! `skopeo copy --multi-arch=index-only`. All wire-protocol detail (registry
//! auth, TLS, transport negotiation) stays inside skopeo.

use crate::descriptor::{Descriptor, OriginKind};
use crate::error::{FerryError, FerryResult};
use crate::retrieve::Retriever;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Retriever that shells out to skopeo for both origin kinds
#[derive(Debug, Clone)]
pub struct SkopeoRetriever {
    program: PathBuf,
}

impl SkopeoRetriever {
    /// Create a retriever using the given skopeo binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Source image reference for the descriptor's transport
    fn source_ref(descriptor: &Descriptor) -> String {
        match descriptor.origin() {
            OriginKind::RemoteRegistry => {
                format!("docker://{}@{}", descriptor.name(), descriptor.digest())
            }
            OriginKind::LocalStore => match descriptor.location() {
                Some(location) => {
                    format!("containers-storage:[{}]{}", location, descriptor.name())
                }
                None => format!("containers-storage:{}", descriptor.name()),
            },
        }
    }

    /// Arguments for `skopeo copy`
    fn copy_args(descriptor: &Descriptor, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "copy".to_string(),
            "--quiet".to_string(),
            "--multi-arch=index-only".to_string(),
        ];

        // TLS only applies to the registry transport
        if descriptor.origin() == OriginKind::RemoteRegistry && !descriptor.tls_verify() {
            args.push("--src-tls-verify=false".to_string());
        }

        args.push(Self::source_ref(descriptor));
        args.push(format!("dir:{}", dest.display()));
        args
    }
}

impl Default for SkopeoRetriever {
    fn default() -> Self {
        Self::new("skopeo")
    }
}

#[async_trait]
impl Retriever for SkopeoRetriever {
    async fn retrieve(&self, descriptor: &Descriptor, dest: &Path) -> FerryResult<()> {
        let args = Self::copy_args(descriptor, dest);
        info!(
            "Retrieving {} from {} ({})",
            descriptor.digest().short(),
            descriptor.name(),
            descriptor.origin()
        );
        debug!("Executing: {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                FerryError::retrieval(
                    descriptor.digest(),
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(FerryError::retrieval(
                descriptor.digest(),
                format!("skopeo copy exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "skopeo"
    }
}
