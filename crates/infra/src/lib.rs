//! `backstock-infra` — storage backends, the transactional operation layer,
//! background jobs, and data exports.
//!
//! Layering:
//!
//! ```text
//! HTTP handler / job worker
//!   ↓
//! BackofficeOps (one transaction per business operation)
//!   ↓
//! StorageBackend / StorageTx (row locks, atomic commit)
//!   ↓
//! InMemoryBackend (tests/dev) | PgBackend (production)
//! ```
//!
//! Domain planning (reconciliation, allocation, history diffing) stays in the
//! domain crates; this crate only loads state under lock, runs the planners,
//! and applies their plans atomically.

pub mod exports;
pub mod jobs;
pub mod ops;
pub mod storage;

#[cfg(test)]
mod integration_tests;

pub use exports::{DataExport, ExportKind, ExportStatus};
pub use jobs::{
    InMemoryJobStore, Job, JobHandler, JobId, JobKind, JobOutcome, JobStats, JobStatus, JobStore,
    JobStoreError, JobWorker, JobWorkerConfig, JobWorkerHandle,
};
pub use ops::{BackofficeOps, BatchOutcome, NewComposition, NewCompositionItem, NewInventory, NewOrder, OpError};
pub use storage::{InMemoryBackend, PgBackend, StorageBackend, StorageTx, StoreError};
