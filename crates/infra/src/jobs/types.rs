//! Core job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use backstock_core::{CompositionId, ExportId, UserId};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job kind, carrying the payload needed to route and execute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobKind {
    /// Run the batch production allocator for a composition.
    BatchProduction {
        composition_id: CompositionId,
        requested_batches: i64,
    },
    /// Gather rows for a requested data export.
    DataExport { export_id: ExportId },
}

impl JobKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            JobKind::BatchProduction { .. } => "production.batch",
            JobKind::DataExport { .. } => "exports.data",
        }
    }
}

/// Job execution status: `pending → processing → success | failed`.
/// Failures are terminal; the error message is preserved for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failed { error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed { .. })
    }
}

/// A background job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Actor on whose behalf the job runs; threaded into the operation.
    pub submitted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, submitted_by: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Pending,
            submitted_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_success(&mut self) {
        self.status = JobStatus::Success;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed {
            error: error.into(),
        };
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let mut job = Job::new(
            JobKind::DataExport {
                export_id: ExportId::new(),
            },
            None,
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.status.is_terminal());

        job.mark_processing();
        assert_eq!(job.status, JobStatus::Processing);

        job.mark_success();
        assert!(job.status.is_terminal());
    }

    #[test]
    fn failure_keeps_the_error() {
        let mut job = Job::new(
            JobKind::BatchProduction {
                composition_id: CompositionId::new(),
                requested_batches: 3,
            },
            None,
        );
        job.mark_processing();
        job.mark_failed("record not found: composition");
        match &job.status {
            JobStatus::Failed { error } => assert!(error.contains("not found")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn kind_names_route_handlers() {
        let batch = JobKind::BatchProduction {
            composition_id: CompositionId::new(),
            requested_batches: 1,
        };
        assert_eq!(batch.type_name(), "production.batch");
    }
}
