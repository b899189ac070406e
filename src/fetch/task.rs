//! Per-digest fetch task

use crate::audit::{AuditLog, StoreEvent};
use crate::descriptor::Descriptor;
use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use crate::retrieve::RetrieverRegistry;
use crate::store::{CommitOutcome, ContentStore};
use crate::verify;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Lifecycle state of a fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting for a worker
    Pending,
    /// Retriever running
    Fetching,
    /// Shape and digest checks running
    Verifying,
    /// Publishing into the store
    Committing,
    /// Committed (or already present)
    Done,
    /// Terminated with an error
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Everything a task needs, shared by all tasks of one fetch
pub(crate) struct TaskContext {
    pub store: ContentStore,
    pub retrievers: RetrieverRegistry,
    pub audit: AuditLog,
    pub retrieval_timeout: Duration,
    pub workers: Arc<Semaphore>,
}

/// One (digest, descriptor) pair moving through the fetch state machine
pub(crate) struct FetchTask {
    descriptor: Descriptor,
    state: TaskState,
}

impl FetchTask {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            state: TaskState::Pending,
        }
    }

    pub fn digest(&self) -> &Digest {
        self.descriptor.digest()
    }

    fn transition(&mut self, next: TaskState) {
        debug!("{}: {} -> {}", self.digest().short(), self.state, next);
        self.state = next;
    }

    /// Run to a terminal state
    ///
    /// Errors are wrapped in `FetchFailed` carrying the state the task was
    /// in when it failed.
    pub async fn run(mut self, ctx: &TaskContext) -> FerryResult<CommitOutcome> {
        match self.steps(ctx).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let failed_in = self.state;
                self.transition(TaskState::Failed);
                self.audit_failure(ctx, &e).await;
                warn!("Fetch of {} failed while {}: {}", self.digest(), failed_in, e);
                Err(FerryError::FetchFailed {
                    digest: self.digest().clone(),
                    state: failed_in.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn steps(&mut self, ctx: &TaskContext) -> FerryResult<CommitOutcome> {
        let _permit = ctx
            .workers
            .acquire()
            .await
            .map_err(|e| FerryError::Internal(format!("worker pool closed: {}", e)))?;

        self.transition(TaskState::Fetching);
        // Dropped on every exit path, removing whatever the retriever left
        let staging = ctx.store.stage()?;
        let bundle = staging.artifact_path();

        let retrieval = ctx.retrievers.retrieve(&self.descriptor, &bundle);
        match tokio::time::timeout(ctx.retrieval_timeout, retrieval).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FerryError::retrieval(
                    self.digest(),
                    format!(
                        "timed out after {}s",
                        ctx.retrieval_timeout.as_secs_f64()
                    ),
                ))
            }
        }

        self.transition(TaskState::Verifying);
        verify::check_shape(&bundle, self.digest(), self.descriptor.kind()).await?;
        verify::check_digest(&bundle, self.digest()).await?;

        self.transition(TaskState::Committing);
        let outcome = ctx.store.commit(self.digest(), &bundle).await?;

        self.transition(TaskState::Done);
        if outcome == CommitOutcome::Committed {
            info!("Cached {} ({})", self.digest(), self.descriptor.name());
            ctx.audit
                .record(&StoreEvent::committed(&self.descriptor))
                .await;
        }

        Ok(outcome)
    }

    async fn audit_failure(&self, ctx: &TaskContext, error: &FerryError) {
        if let FerryError::DigestMismatch { actual, .. } = error {
            ctx.audit
                .record(&StoreEvent::digest_mismatch(&self.descriptor, actual))
                .await;
        }
    }
}
