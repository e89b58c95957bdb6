//! Background jobs: batch production and data exports run asynchronously,
//! fire-and-forget from the operator's perspective, polled via status.

pub mod store;
pub mod types;
pub mod worker;

pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{Job, JobId, JobKind, JobStatus};
pub use worker::{JobHandler, JobOutcome, JobWorker, JobWorkerConfig, JobWorkerHandle};
