use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use backstock_core::ExportId;
use backstock_infra::{Job, JobKind, JobStore, StorageBackend};

use crate::app::routes::common::actor_from;
use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new()
        .route("/", post(create_export::<S>).get(list_exports::<S>))
        .route("/:id", get(get_export::<S>))
}

/// Request an export: the record starts `pending` and a background job
/// gathers the rows. The operator polls the record's status.
pub async fn create_export<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    headers: HeaderMap,
    Json(body): Json<dto::CreateExportRequest>,
) -> axum::response::Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let export = match ctx.ops.request_export(body.kind, actor).await {
        Ok(export) => export,
        Err(e) => return errors::op_error_to_response(e),
    };
    let job = Job::new(JobKind::DataExport { export_id: export.id }, actor);
    match ctx.jobs.enqueue(job) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "export": dto::export_to_json(&export),
                "job_id": job_id,
            })),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn list_exports<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    match ctx.ops.store().list_exports().await {
        Ok(exports) => Json(exports.iter().map(dto::export_to_json).collect::<Vec<_>>())
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_export<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ExportId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid export id")
        }
    };
    match ctx.ops.store().get_export(id).await {
        Ok(Some(export)) => Json(dto::export_to_json(&export)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "export not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
