//! Application wiring: context, router, and backend selection.

pub mod dto;
pub mod errors;
pub mod routes;

use std::sync::Arc;

use axum::{extract::Extension, Router};
use tower::ServiceBuilder;

use backstock_infra::{
    BackofficeOps, InMemoryBackend, InMemoryJobStore, JobWorker, JobWorkerConfig, JobWorkerHandle,
    PgBackend, StorageBackend,
};
use backstock_notify::InMemorySink;

/// The sink is shared between the operation layer (publishing) and the
/// notifications endpoint (listing).
pub type SharedSink = Arc<InMemorySink>;

pub type Ops<S> = BackofficeOps<S, SharedSink>;

/// Per-request application context.
pub struct AppContext<S: StorageBackend> {
    pub ops: Arc<Ops<S>>,
    pub jobs: Arc<InMemoryJobStore>,
    pub sink: SharedSink,
}

impl<S: StorageBackend> Clone for AppContext<S> {
    fn clone(&self) -> Self {
        Self {
            ops: Arc::clone(&self.ops),
            jobs: Arc::clone(&self.jobs),
            sink: Arc::clone(&self.sink),
        }
    }
}

/// Assemble the router over any storage backend.
pub fn build_router<S: StorageBackend>(ctx: AppContext<S>) -> Router {
    Router::new()
        .nest("/inventories", routes::inventory::router::<S>())
        .nest("/products", routes::products::router::<S>())
        .nest("/orders", routes::orders::router::<S>())
        .nest("/compositions", routes::production::router::<S>())
        .nest("/exports", routes::exports::router::<S>())
        .nest("/notifications", routes::notifications::router::<S>())
        .nest("/system", routes::system::router::<S>())
        .layer(ServiceBuilder::new().layer(Extension(ctx)))
}

fn build_with_backend<S: StorageBackend>(backend: S) -> (Router, JobWorkerHandle) {
    let sink: SharedSink = Arc::new(InMemorySink::new());
    let ops = Arc::new(BackofficeOps::new(backend, Arc::clone(&sink)));
    let jobs = InMemoryJobStore::arc();

    // The worker executes batch production and exports through the same
    // operation layer as the HTTP path.
    let worker = JobWorker::spawn(
        Arc::clone(&jobs),
        Arc::clone(&ops),
        JobWorkerConfig::default().with_name("backstock-jobs"),
    );

    let ctx = AppContext { ops, jobs, sink };
    (build_router(ctx), worker)
}

/// Dev/test wiring: in-memory storage. Keep the returned worker handle
/// alive; dropping it stops background job processing.
pub fn build_app() -> (Router, JobWorkerHandle) {
    build_with_backend(InMemoryBackend::new())
}

/// Production wiring: Postgres-backed storage.
pub fn build_pg_app(backend: PgBackend) -> (Router, JobWorkerHandle) {
    build_with_backend(backend)
}
