//! Fetch coordination
//!
//! Turns a request set into committed store entries. Cached digests are
//! skipped; every missing digest becomes a `FetchTask` run on a bounded
//! worker pool:
//!
//! ```text
//! Pending -> Fetching -> Verifying -> Committing -> Done
//!    \           \            \            \
//!     +-----------+------------+------------+--> Failed
//! ```
//!
//! A failed task never cancels its siblings, so one bad digest does not keep
//! the others out of the cache. Retrying a whole request set is always safe.

mod coordinator;
mod report;
mod task;

pub use coordinator::{default_workers, FetchCoordinator, FetchOptions, MAX_WORKERS};
pub use report::{FetchReport, Outcome};
pub use task::TaskState;
