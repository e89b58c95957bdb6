//! Job routing: the operation layer doubles as the job handler, so the worker
//! executes business operations with the same transactional guarantees as the
//! HTTP path.

use async_trait::async_trait;

use backstock_notify::NotificationSink;

use crate::jobs::{Job, JobHandler, JobKind, JobOutcome};
use crate::storage::StorageBackend;

use super::BackofficeOps;

#[async_trait]
impl<S, N> JobHandler for BackofficeOps<S, N>
where
    S: StorageBackend,
    N: NotificationSink,
{
    async fn run(&self, job: &Job) -> JobOutcome {
        match &job.kind {
            JobKind::BatchProduction {
                composition_id,
                requested_batches,
            } => {
                // Allocator decisions (including "0 feasible") are reported
                // through notifications; only infrastructure errors fail the
                // job itself.
                match self
                    .run_batch(*composition_id, *requested_batches, job.submitted_by)
                    .await
                {
                    Ok(_) => JobOutcome::Success,
                    Err(err) => JobOutcome::Failure(err.to_string()),
                }
            }
            JobKind::DataExport { export_id } => match self.run_export(*export_id).await {
                Ok(_) => JobOutcome::Success,
                Err(err) => JobOutcome::Failure(err.to_string()),
            },
        }
    }
}
