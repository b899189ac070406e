//! Request descriptors
//!
//! A request set maps each expected digest to the origin it should be
//! fetched from. On disk it is a JSON object keyed by digest string.

use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Where an artifact is retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginKind {
    /// A remote container registry
    RemoteRegistry,
    /// The local containers storage
    LocalStore,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteRegistry => "remote-registry",
            Self::LocalStore => "local-store",
        }
    }
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural kind the caller expects the artifact to have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Multi-platform image index / manifest list
    #[default]
    Index,
    /// Single-platform image manifest
    Manifest,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "image index"),
            Self::Manifest => write!(f, "image manifest"),
        }
    }
}

fn default_tls_verify() -> bool {
    true
}

/// One request entry as written in a request file (the digest is the key)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestEntry {
    /// Origin kind
    pub origin: OriginKind,

    /// Reference resolvable by the origin (e.g. `quay.io/org/image`)
    pub name: String,

    /// Verify transport security (registry TLS)
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional location qualifier, e.g. an alternate containers-storage root
    #[serde(default)]
    pub location: Option<String>,

    /// Expected artifact kind
    #[serde(default)]
    pub kind: ArtifactKind,
}

/// Caller-supplied metadata for one requested artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    digest: Digest,
    origin: OriginKind,
    name: String,
    location: Option<String>,
    tls_verify: bool,
    kind: ArtifactKind,
}

impl Descriptor {
    /// Create a descriptor with default flags (TLS verified, index expected)
    pub fn new(digest: Digest, origin: OriginKind, name: impl Into<String>) -> Self {
        Self {
            digest,
            origin,
            name: name.into(),
            location: None,
            tls_verify: true,
            kind: ArtifactKind::default(),
        }
    }

    /// Build from a request file entry keyed by `digest`
    pub fn from_entry(digest: Digest, entry: RequestEntry) -> Self {
        Self {
            digest,
            origin: entry.origin,
            name: entry.name,
            location: entry.location,
            tls_verify: entry.tls_verify,
            kind: entry.kind,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_tls_verify(mut self, tls_verify: bool) -> Self {
        self.tls_verify = tls_verify;
        self
    }

    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn origin(&self) -> OriginKind {
        self.origin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

/// Requested artifacts keyed by expected digest
pub type RequestSet = BTreeMap<Digest, Descriptor>;

/// Collect descriptors into a request set keyed by their digests
pub fn request_set(descriptors: impl IntoIterator<Item = Descriptor>) -> RequestSet {
    descriptors
        .into_iter()
        .map(|d| (d.digest().clone(), d))
        .collect()
}

/// Parse a JSON request set
pub fn parse_requests(content: &str, origin: &Path) -> FerryResult<RequestSet> {
    let invalid = |reason: String| FerryError::RequestsInvalid {
        path: origin.to_path_buf(),
        reason,
    };

    let raw: BTreeMap<String, RequestEntry> =
        serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;

    let mut requests = RequestSet::new();
    for (key, entry) in raw {
        let digest: Digest = key
            .parse()
            .map_err(|_| invalid(format!("'{}' is not a valid digest", key)))?;
        if entry.name.trim().is_empty() {
            return Err(invalid(format!("empty name for {}", key)));
        }
        requests.insert(digest.clone(), Descriptor::from_entry(digest, entry));
    }

    Ok(requests)
}

/// Load a JSON request set from disk
pub async fn load_requests(path: &Path) -> FerryResult<RequestSet> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FerryError::io(format!("reading requests from {}", path.display()), e))?;
    parse_requests(&content, path)
}
