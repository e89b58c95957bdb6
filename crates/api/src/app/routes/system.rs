use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use backstock_infra::{JobStore, StorageBackend};

use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(jobs::<S>))
}

pub async fn health() -> axum::response::Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

pub async fn jobs<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    let stats = match ctx.jobs.stats() {
        Ok(stats) => stats,
        Err(e) => return errors::job_error_to_response(e),
    };
    let recent = match ctx.jobs.list(50) {
        Ok(jobs) => jobs,
        Err(e) => return errors::job_error_to_response(e),
    };
    Json(serde_json::json!({
        "stats": stats,
        "jobs": recent.iter().map(dto::job_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}
