//! Job storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::types::{Job, JobId, JobStatus};

/// Job store abstraction. FIFO by creation time.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Update a job.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the oldest pending job, marking it processing.
    /// Returns None if no jobs are available.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// List jobs, oldest first.
    fn list(&self, limit: usize) -> Result<Vec<Job>, JobStoreError>;

    /// Get job statistics.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        Ok(jobs.get(&job_id).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;

        // Oldest pending job first (FIFO).
        let next = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at)
            .map(|j| j.id);

        if let Some(id) = next {
            if let Some(job) = jobs.get_mut(&id) {
                job.mark_processing();
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    fn list(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        let mut result: Vec<_> = jobs.values().cloned().collect();
        result.sort_by_key(|j| j.created_at);
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

impl JobStore for Arc<InMemoryJobStore> {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn list(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        (**self).list(limit)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobKind;
    use backstock_core::ExportId;

    fn export_job() -> Job {
        Job::new(
            JobKind::DataExport {
                export_id: ExportId::new(),
            },
            None,
        )
    }

    #[test]
    fn enqueue_and_claim_fifo() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue(export_job()).unwrap();
        let second = store.enqueue(export_job()).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, JobStatus::Processing);

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, second);

        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let store = InMemoryJobStore::new();
        let job = export_job();
        store.enqueue(job.clone()).unwrap();
        assert!(matches!(
            store.enqueue(job),
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn stats_track_statuses() {
        let store = InMemoryJobStore::new();
        for _ in 0..3 {
            store.enqueue(export_job()).unwrap();
        }
        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_success();
        store.update(&claimed).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.success, 1);
    }
}
