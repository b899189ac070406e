//! Error types for Ferry
//!
//! All modules use `FerryResult<T>` as their return type.

use crate::digest::Digest;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Ferry operations
pub type FerryResult<T> = Result<T, FerryError>;

/// All errors that can occur in Ferry
#[derive(Error, Debug)]
pub enum FerryError {
    // Fetch errors
    #[error("No retriever registered for origin '{origin}' (requested by {digest})")]
    UnsupportedOrigin { digest: Digest, origin: String },

    #[error("Retrieval of {digest} failed: {reason}")]
    Retrieval { digest: Digest, reason: String },

    #[error("Unexpected artifact shape for {digest}: expected {expected}, found {found}")]
    Shape {
        digest: Digest,
        expected: String,
        found: String,
    },

    #[error("Digest mismatch: expected {expected}, retrieved content hashes to {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },

    #[error("Fetch of {digest} failed while {state}: {source}")]
    FetchFailed {
        digest: Digest,
        state: String,
        #[source]
        source: Box<FerryError>,
    },

    // Store errors
    #[error("Content store error: {context}")]
    Store {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request set {path}: {reason}")]
    RequestsInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl FerryError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a content store error with context
    pub fn store(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// Create a retrieval error for a digest
    pub fn retrieval(digest: &Digest, reason: impl Into<String>) -> Self {
        Self::Retrieval {
            digest: digest.clone(),
            reason: reason.into(),
        }
    }

    /// The innermost error, looking through `FetchFailed` wrappers
    pub fn root_cause(&self) -> &FerryError {
        match self {
            Self::FetchFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if error is retryable
    ///
    /// Retrying a whole fetch is always safe since committed digests are
    /// skipped; this only says whether a retry can be expected to help.
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Self::Retrieval { .. } | Self::Store { .. } | Self::Io { .. } => true,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::UnsupportedOrigin { .. } => {
                Some("Use origin \"remote-registry\" or \"local-store\" in the request")
            }
            Self::Retrieval { .. } => {
                Some("Check network access and that skopeo is installed, then rerun")
            }
            Self::DigestMismatch { .. } => {
                Some("The source served different content than requested; do not retry blindly")
            }
            Self::Shape { .. } => Some("Check the requested kind (index or manifest) for this image"),
            _ => None,
        }
    }
}
