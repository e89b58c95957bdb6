//! Background job worker: polls the job store, executes claimed jobs, and
//! records terminal status. Graceful shutdown through the handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::store::JobStore;
use super::types::Job;

/// Result of executing one job.
#[derive(Debug)]
pub enum JobOutcome {
    Success,
    Failure(String),
}

/// Executes claimed jobs. Implementations route on `job.kind`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> JobOutcome;
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// How often to poll for new jobs.
    pub poll_interval: Duration,
    /// Name for logging.
    pub name: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-worker".to_string(),
        }
    }
}

impl JobWorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Handle to control a running worker. Keep it alive: dropping the handle
/// shuts the worker down.
#[derive(Debug)]
pub struct JobWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl JobWorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(()).await;
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Background job worker.
pub struct JobWorker;

impl JobWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn<S, H>(store: S, handler: Arc<H>, config: JobWorkerConfig) -> JobWorkerHandle
    where
        S: JobStore + 'static,
        H: JobHandler + ?Sized + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let join = tokio::spawn(worker_loop(store, handler, config, shutdown_rx));
        JobWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

async fn worker_loop<S, H>(
    store: S,
    handler: Arc<H>,
    config: JobWorkerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) where
    S: JobStore,
    H: JobHandler + ?Sized,
{
    let mut tick = tokio::time::interval(config.poll_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tick.tick() => {
                drain(&store, handler.as_ref(), &config.name).await;
            }
        }
    }
    debug!(worker = %config.name, "job worker stopped");
}

/// Process every claimable job before sleeping again.
async fn drain<S: JobStore, H: JobHandler + ?Sized>(store: &S, handler: &H, name: &str) {
    loop {
        let mut job = match store.claim_next() {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(err) => {
                error!(worker = name, error = %err, "failed to claim job");
                break;
            }
        };

        debug!(worker = name, job_id = %job.id, kind = job.kind.type_name(), "job started");
        match handler.run(&job).await {
            JobOutcome::Success => job.mark_success(),
            JobOutcome::Failure(err) => {
                warn!(worker = name, job_id = %job.id, error = %err, "job failed");
                job.mark_failed(err);
            }
        }
        if let Err(err) = store.update(&job) {
            error!(worker = name, job_id = %job.id, error = %err, "failed to record job status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::{JobKind, JobStatus};
    use backstock_core::ExportId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn run(&self, _job: &Job) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                JobOutcome::Failure("boom".to_string())
            } else {
                JobOutcome::Success
            }
        }
    }

    fn export_job() -> Job {
        Job::new(
            JobKind::DataExport {
                export_id: ExportId::new(),
            },
            None,
        )
    }

    async fn wait_until_terminal(store: &Arc<InMemoryJobStore>, id: crate::jobs::JobId) -> Job {
        for _ in 0..200 {
            if let Some(job) = store.get(id).unwrap() {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never reached a terminal status");
    }

    #[tokio::test]
    async fn worker_processes_jobs_to_success() {
        let store = InMemoryJobStore::arc();
        let handler = Arc::new(CountingHandler {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let worker = JobWorker::spawn(
            Arc::clone(&store),
            Arc::clone(&handler),
            JobWorkerConfig::default().with_poll_interval(Duration::from_millis(5)),
        );

        let id = store.enqueue(export_job()).unwrap();
        let job = wait_until_terminal(&store, id).await;
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn handler_failure_is_terminal_with_message() {
        let store = InMemoryJobStore::arc();
        let handler = Arc::new(CountingHandler {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let worker = JobWorker::spawn(
            Arc::clone(&store),
            handler,
            JobWorkerConfig::default().with_poll_interval(Duration::from_millis(5)),
        );

        let id = store.enqueue(export_job()).unwrap();
        let job = wait_until_terminal(&store, id).await;
        match job.status {
            JobStatus::Failed { error } => assert_eq!(error, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }

        worker.shutdown().await;
    }
}
