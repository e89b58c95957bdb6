use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use backstock_core::InventoryId;
use backstock_infra::{NewInventory, StorageBackend};
use backstock_inventory::{InventoryPatch, Sku};

use crate::app::routes::common::actor_from;
use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new()
        .route("/", post(create_inventory::<S>).get(list_inventories::<S>))
        .route("/:id", get(get_inventory::<S>).put(update_inventory::<S>))
        .route("/:id/adjust", post(adjust_stock::<S>))
        .route("/:id/history", get(get_history::<S>))
}

fn parse_id(raw: &str) -> Result<InventoryId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid inventory id")
    })
}

pub async fn create_inventory<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Json(body): Json<dto::CreateInventoryRequest>,
) -> axum::response::Response {
    let new = NewInventory {
        name: body.name,
        sku: body.sku,
        unit: body.unit,
        price: body.price,
        stock: body.stock,
    };
    match ctx.ops.create_inventory(new).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(dto::inventory_to_json(&record)),
        )
            .into_response(),
        Err(e) => errors::op_error_to_response(e),
    }
}

pub async fn list_inventories<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    match ctx.ops.store().list_inventories().await {
        Ok(records) => Json(
            records
                .iter()
                .map(dto::inventory_to_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_inventory<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match ctx.ops.store().get_inventory(id).await {
        Ok(Some(record)) => Json(dto::inventory_to_json(&record)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "inventory not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_inventory<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::UpdateInventoryRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let sku = match body.sku.map(Sku::new).transpose() {
        Ok(sku) => sku,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let patch = InventoryPatch {
        name: body.name,
        price: body.price,
        sku,
        stock: body.stock,
        description: body.description,
    };
    match ctx.ops.update_inventory(id, patch, actor).await {
        Ok(record) => Json(dto::inventory_to_json(&record)).into_response(),
        Err(e) => errors::op_error_to_response(e),
    }
}

pub async fn adjust_stock<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match ctx.ops.adjust_stock(id, body.delta, body.reason, actor).await {
        Ok(new_stock) => Json(serde_json::json!({
            "id": id,
            "new_stock": new_stock,
        }))
        .into_response(),
        Err(e) => errors::op_error_to_response(e),
    }
}

pub async fn get_history<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let limit = query.limit.unwrap_or(50);
    match ctx.ops.store().history_for(id, limit).await {
        Ok(entries) => Json(entries.iter().map(dto::history_to_json).collect::<Vec<_>>())
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
