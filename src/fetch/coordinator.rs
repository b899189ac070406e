//! Fetch coordinator - partitions requests and runs the worker pool

use crate::audit::AuditLog;
use crate::descriptor::RequestSet;
use crate::error::{FerryError, FerryResult};
use crate::fetch::report::{FetchReport, Outcome};
use crate::fetch::task::{FetchTask, TaskContext, TaskState};
use crate::retrieve::RetrieverRegistry;
use crate::store::ContentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Upper bound for the derived worker count
const MAX_DEFAULT_WORKERS: usize = 32;

/// Upper bound for any configured worker count
pub const MAX_WORKERS: usize = 1024;

/// Default per-retrieval timeout
const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(600);

/// Default worker count: CPU count plus headroom for IO-bound retrievals
pub fn default_workers() -> usize {
    (num_cpus::get() + 4).min(MAX_DEFAULT_WORKERS)
}

/// Scheduling options for a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    workers: usize,
    retrieval_timeout: Duration,
}

impl FetchOptions {
    /// Maximum number of tasks past `Pending` at once, clamped to
    /// `1..=MAX_WORKERS`
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn retrieval_timeout(&self) -> Duration {
        self.retrieval_timeout
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
        }
    }
}

/// Top-level entry point: fetch whatever the store is missing
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    store: ContentStore,
    retrievers: RetrieverRegistry,
    audit: AuditLog,
    options: FetchOptions,
}

impl FetchCoordinator {
    /// Create a coordinator with default options and no audit log
    pub fn new(store: ContentStore, retrievers: RetrieverRegistry) -> Self {
        Self {
            store,
            retrievers,
            audit: AuditLog::disabled(),
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch every missing digest and report per-digest outcomes
    ///
    /// Returns once every dispatched task is terminal. Failures are recorded
    /// in the report and never abort other tasks.
    pub async fn fetch(&self, requests: RequestSet) -> FetchReport {
        let mut report = FetchReport::default();
        let mut tasks = Vec::new();

        for (digest, descriptor) in requests {
            if descriptor.digest() != &digest {
                let error = FerryError::User(format!(
                    "request key {} does not match descriptor digest {}",
                    digest,
                    descriptor.digest()
                ));
                report.record(digest, Outcome::Failed(error));
                continue;
            }

            match self.store.exists(&digest).await {
                Ok(true) => {
                    debug!("{} already cached, skipping", digest.short());
                    report.record(digest, Outcome::Cached);
                }
                Ok(false) => tasks.push(FetchTask::new(descriptor)),
                Err(e) => {
                    let error = FerryError::FetchFailed {
                        digest: digest.clone(),
                        state: TaskState::Pending.to_string(),
                        source: Box::new(e),
                    };
                    report.record(digest, Outcome::Failed(error));
                }
            }
        }

        if tasks.is_empty() {
            debug!("Nothing to fetch ({} cached)", report.cached().len());
            return report;
        }

        // Leftovers of killed runs; a live task never outlasts its timeout by 2x
        let stale_after = self.options.retrieval_timeout.saturating_mul(2);
        if let Err(e) = self.store.sweep_staging(stale_after).await {
            warn!("Could not sweep stale staging areas: {}", e);
        }

        info!(
            "Fetching {} artifact(s) with {} worker(s), {} already cached",
            tasks.len(),
            self.options.workers,
            report.cached().len()
        );

        let ctx = Arc::new(TaskContext {
            store: self.store.clone(),
            retrievers: self.retrievers.clone(),
            audit: self.audit.clone(),
            retrieval_timeout: self.options.retrieval_timeout,
            workers: Arc::new(Semaphore::new(self.options.workers)),
        });

        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let digest = task.digest().clone();
                let ctx = Arc::clone(&ctx);
                (digest, tokio::spawn(async move { task.run(&ctx).await }))
            })
            .collect();

        // Join barrier: every task reaches a terminal state before returning
        for (digest, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(commit)) => Outcome::Fetched(commit),
                Ok(Err(e)) => Outcome::Failed(e),
                Err(e) => {
                    warn!("Fetch task for {} aborted: {}", digest, e);
                    Outcome::Failed(FerryError::FetchFailed {
                        digest: digest.clone(),
                        state: TaskState::Failed.to_string(),
                        source: Box::new(FerryError::Internal(e.to_string())),
                    })
                }
            };
            report.record(digest, outcome);
        }

        let failed = report.failures().count();
        if failed > 0 {
            warn!(
                "{} of {} requested artifact(s) could not be fetched",
                failed,
                report.len()
            );
        } else {
            info!("All {} requested artifact(s) present", report.len());
        }

        report
    }

    /// Fetch every missing digest, failing with the first failure if any
    ///
    /// Callers that need partial-success detail should use [`fetch`](Self::fetch).
    pub async fn fetch_all(&self, requests: RequestSet) -> FerryResult<FetchReport> {
        self.fetch(requests).await.into_result()
    }
}
