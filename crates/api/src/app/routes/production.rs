use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use backstock_core::CompositionId;
use backstock_infra::{
    Job, JobKind, JobStore, NewComposition, NewCompositionItem, StorageBackend,
};

use crate::app::routes::common::actor_from;
use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new()
        .route("/", post(create_composition::<S>).get(list_compositions::<S>))
        .route("/:id", get(get_composition::<S>))
        .route("/:id/deploy", post(deploy_batch::<S>))
        .route("/:id/batch-runs", get(list_batch_runs::<S>))
}

fn parse_id(raw: &str) -> Result<CompositionId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid composition id",
        )
    })
}

pub async fn create_composition<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Json(body): Json<dto::CreateCompositionRequest>,
) -> axum::response::Response {
    let new = NewComposition {
        name: body.name,
        finished_good: body.finished_good,
        labor_cost: body.labor_cost,
        yield_per_batch: body.yield_per_batch,
        items: body
            .items
            .into_iter()
            .map(|item| NewCompositionItem {
                ingredient: item.ingredient,
                category: item.category,
                stock_used: item.stock_used,
            })
            .collect(),
    };
    match ctx.ops.create_composition(new).await {
        Ok(composition) => (
            StatusCode::CREATED,
            Json(dto::composition_to_json(&composition)),
        )
            .into_response(),
        Err(e) => errors::op_error_to_response(e),
    }
}

pub async fn list_compositions<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    match ctx.ops.store().list_compositions().await {
        Ok(compositions) => Json(
            compositions
                .iter()
                .map(dto::composition_to_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_composition<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match ctx.ops.store().get_composition(id).await {
        Ok(Some(composition)) => Json(dto::composition_to_json(&composition)).into_response(),
        Ok(None) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "composition not found")
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Queue a production batch run. The allocator executes asynchronously;
/// its outcome arrives through notifications and the batch-run log.
pub async fn deploy_batch<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::DeployRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if body.requested_batch <= 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "requested_batch must be a positive integer",
        );
    }
    // Reject unknown compositions up front; the job itself re-validates.
    match ctx.ops.store().get_composition(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "composition not found")
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    let job = Job::new(
        JobKind::BatchProduction {
            composition_id: id,
            requested_batches: body.requested_batch,
        },
        actor,
    );
    match ctx.jobs.enqueue(job) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "job_id": job_id,
                "composition_id": id,
                "requested_batch": body.requested_batch,
            })),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn list_batch_runs<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match ctx.ops.store().batch_runs_for(id).await {
        Ok(runs) => Json(runs.iter().map(dto::batch_run_to_json).collect::<Vec<_>>())
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
