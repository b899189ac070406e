//! Artifact retrieval
//!
//! Retrievers copy the bytes a descriptor points at into a staging area
//! without trusting them. Which retriever handles a request is decided only
//! by the descriptor's origin kind, through a table built at startup.

mod skopeo;

pub use skopeo::SkopeoRetriever;

use crate::descriptor::{Descriptor, OriginKind};
use crate::error::{FerryError, FerryResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Abstract retrieval interface
///
/// Implementations write only inside `dest` (the bundle directory, which
/// does not exist yet) and never touch the content store.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Copy the artifact named by `descriptor` into `dest`
    async fn retrieve(&self, descriptor: &Descriptor, dest: &Path) -> FerryResult<()>;

    /// Human-readable retriever name for logs
    fn name(&self) -> &'static str;
}

/// Lookup table from origin kind to retriever
#[derive(Clone, Default)]
pub struct RetrieverRegistry {
    retrievers: HashMap<OriginKind, Arc<dyn Retriever>>,
}

impl RetrieverRegistry {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table serving both origin kinds through `skopeo`
    pub fn with_skopeo(retriever: SkopeoRetriever) -> Self {
        let skopeo: Arc<dyn Retriever> = Arc::new(retriever);
        Self::new()
            .with(OriginKind::RemoteRegistry, skopeo.clone())
            .with(OriginKind::LocalStore, skopeo)
    }

    /// Register `retriever` for `kind`, replacing any previous one
    pub fn with(mut self, kind: OriginKind, retriever: Arc<dyn Retriever>) -> Self {
        self.retrievers.insert(kind, retriever);
        self
    }

    /// Retriever for `kind`, if registered
    pub fn get(&self, kind: OriginKind) -> Option<&Arc<dyn Retriever>> {
        self.retrievers.get(&kind)
    }

    /// Dispatch a retrieval to the retriever for the descriptor's origin
    pub async fn retrieve(&self, descriptor: &Descriptor, dest: &Path) -> FerryResult<()> {
        let retriever =
            self.get(descriptor.origin())
                .ok_or_else(|| FerryError::UnsupportedOrigin {
                    digest: descriptor.digest().clone(),
                    origin: descriptor.origin().to_string(),
                })?;
        debug!(
            "{} -> {} retriever",
            descriptor.digest().short(),
            retriever.name()
        );
        retriever.retrieve(descriptor, dest).await
    }
}

impl std::fmt::Debug for RetrieverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.retrievers.keys().map(OriginKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("RetrieverRegistry")
            .field("origins", &kinds)
            .finish()
    }
}
