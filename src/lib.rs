//! Ferry - content-addressed fetch-and-cache service
//!
//! Retrieves registry manifests by digest, verifies them against the digest
//! they were requested under, and publishes them atomically into a shared
//! on-disk store. Repeated runs only fetch what is still missing.

pub mod audit;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod retrieve;
pub mod store;
pub mod verify;

pub use descriptor::{ArtifactKind, Descriptor, OriginKind, RequestSet};
pub use digest::{Algorithm, Digest};
pub use error::{FerryError, FerryResult};
pub use fetch::{FetchCoordinator, FetchOptions, FetchReport, Outcome};
pub use retrieve::{Retriever, RetrieverRegistry, SkopeoRetriever};
pub use store::ContentStore;
