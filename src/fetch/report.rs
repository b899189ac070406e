//! Aggregated fetch results

use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use crate::store::CommitOutcome;
use std::collections::BTreeMap;

/// Terminal result for one requested digest
#[derive(Debug)]
pub enum Outcome {
    /// Present before the fetch; nothing was retrieved
    Cached,
    /// Retrieved, verified and committed (or committed concurrently by another writer)
    Fetched(CommitOutcome),
    /// The task failed; the digest is absent from the store
    Failed(FerryError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label for tables and JSON output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::Fetched(CommitOutcome::Committed) => "fetched",
            Self::Fetched(CommitOutcome::AlreadyPresent) => "fetched (raced)",
            Self::Failed(_) => "failed",
        }
    }
}

/// Per-digest results of one fetch, in digest order
#[derive(Debug, Default)]
pub struct FetchReport {
    outcomes: BTreeMap<Digest, Outcome>,
}

impl FetchReport {
    pub(crate) fn record(&mut self, digest: Digest, outcome: Outcome) {
        self.outcomes.insert(digest, outcome);
    }

    pub fn outcome(&self, digest: &Digest) -> Option<&Outcome> {
        self.outcomes.get(digest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Digests skipped because they were already cached
    pub fn cached(&self) -> Vec<&Digest> {
        self.filter(|o| matches!(o, Outcome::Cached))
    }

    /// Digests retrieved during this fetch
    pub fn fetched(&self) -> Vec<&Digest> {
        self.filter(|o| matches!(o, Outcome::Fetched(_)))
    }

    /// Failed digests with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&Digest, &FerryError)> {
        self.outcomes.iter().filter_map(|(d, o)| match o {
            Outcome::Failed(e) => Some((d, e)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        !self.outcomes.values().any(Outcome::is_failure)
    }

    /// Fail with the first failure (in digest order) if any task failed
    pub fn into_result(mut self) -> FerryResult<Self> {
        let first_failed = self
            .outcomes
            .iter()
            .find(|(_, o)| o.is_failure())
            .map(|(d, _)| d.clone());

        match first_failed.and_then(|d| self.outcomes.remove(&d)) {
            Some(Outcome::Failed(e)) => Err(e),
            _ => Ok(self),
        }
    }

    fn filter(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<&Digest> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(d, _)| d)
            .collect()
    }
}
