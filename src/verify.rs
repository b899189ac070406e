//! Verification of retrieved artifacts
//!
//! Remote origins are untrusted. A staged bundle is only promoted into the
//! store after both checks pass, shape first:
//!
//! - `check_shape`: the top-level manifest is the kind the caller asked for
//! - `check_digest`: the manifest bytes hash to the requested digest

use crate::descriptor::ArtifactKind;
use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Top-level manifest inside a bundle (as written by the `dir:` transport)
pub const MANIFEST_FILE: &str = "manifest.json";

/// Media types identifying multi-platform indexes
const INDEX_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
];

/// Media types identifying single-platform manifests
const MANIFEST_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.docker.distribution.manifest.v2+json",
];

/// The fields of a manifest that determine its kind
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHead {
    media_type: Option<String>,
    manifests: Option<serde_json::Value>,
    layers: Option<serde_json::Value>,
    config: Option<serde_json::Value>,
}

impl ManifestHead {
    /// Classify by media type, falling back to structure for OCI documents
    /// that omit `mediaType`
    fn kind(&self) -> Result<ArtifactKind, String> {
        if let Some(media_type) = &self.media_type {
            if INDEX_MEDIA_TYPES.contains(&media_type.as_str()) {
                return Ok(ArtifactKind::Index);
            }
            if MANIFEST_MEDIA_TYPES.contains(&media_type.as_str()) {
                return Ok(ArtifactKind::Manifest);
            }
            return Err(format!("unsupported media type {}", media_type));
        }

        if self.manifests.as_ref().is_some_and(|m| m.is_array()) {
            Ok(ArtifactKind::Index)
        } else if self.layers.is_some() || self.config.is_some() {
            Ok(ArtifactKind::Manifest)
        } else {
            Err("unrecognized manifest structure".to_string())
        }
    }
}

/// Check that the bundle's manifest is of the expected kind
pub async fn check_shape(bundle: &Path, digest: &Digest, expected: ArtifactKind) -> FerryResult<()> {
    let shape_error = |found: String| FerryError::Shape {
        digest: digest.clone(),
        expected: expected.to_string(),
        found,
    };

    let path = bundle.join(MANIFEST_FILE);
    let content = tokio::fs::read(&path)
        .await
        .map_err(|e| shape_error(format!("no readable {} ({})", MANIFEST_FILE, e)))?;

    let head: ManifestHead = serde_json::from_slice(&content)
        .map_err(|e| shape_error(format!("malformed {} ({})", MANIFEST_FILE, e)))?;

    let found = head.kind().map_err(shape_error)?;
    if found != expected {
        return Err(shape_error(found.to_string()));
    }

    debug!("{} has expected shape ({})", digest.short(), expected);
    Ok(())
}

/// Check that the bundle's manifest hashes to `expected`
///
/// Uses the same algorithm as `expected`.
pub async fn check_digest(bundle: &Path, expected: &Digest) -> FerryResult<()> {
    let path = bundle.join(MANIFEST_FILE);
    let actual = Digest::of_file(expected.algorithm(), &path)
        .await
        .map_err(|e| FerryError::io(format!("hashing {}", path.display()), e))?;

    if &actual != expected {
        return Err(FerryError::DigestMismatch {
            expected: expected.clone(),
            actual,
        });
    }

    debug!("{} digest verified", expected.short());
    Ok(())
}
