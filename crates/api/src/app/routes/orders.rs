use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use backstock_core::OrderId;
use backstock_infra::{NewOrder, StorageBackend};

use crate::app::routes::common::actor_from;
use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new()
        .route("/", post(create_order::<S>).get(list_orders::<S>))
        .route("/:id", get(get_order::<S>).put(update_order::<S>))
        .route("/:id/status", post(update_status::<S>))
}

fn parse_id(raw: &str) -> Result<OrderId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

pub async fn create_order<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    headers: HeaderMap,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let new = NewOrder {
        customer: body.customer,
        channel: body.channel,
        lines: body
            .lines
            .into_iter()
            .map(|line| (line.product_id, line.quantity))
            .collect(),
    };
    let order = match ctx.ops.create_order(new, actor).await {
        Ok(order) => order,
        Err(e) => return errors::op_error_to_response(e),
    };
    let lines = match ctx.ops.store().order_lines(order.id).await {
        Ok(lines) => lines,
        Err(e) => return errors::store_error_to_response(e),
    };
    (StatusCode::CREATED, Json(dto::order_to_json(&order, &lines))).into_response()
}

pub async fn list_orders<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    match ctx.ops.store().list_orders().await {
        Ok(orders) => Json(
            orders
                .iter()
                .map(|order| dto::order_to_json(order, &[]))
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_order<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let order = match ctx.ops.store().get_order(id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
        }
        Err(e) => return errors::store_error_to_response(e),
    };
    match ctx.ops.store().order_lines(id).await {
        Ok(lines) => Json(dto::order_to_json(&order, &lines)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_order<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::UpdateOrderRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let submitted = body.lines.into_iter().map(Into::into).collect();
    let order = match ctx.ops.edit_order(id, submitted, actor).await {
        Ok(order) => order,
        Err(e) => return errors::op_error_to_response(e),
    };
    let lines = match ctx.ops.store().order_lines(order.id).await {
        Ok(lines) => lines,
        Err(e) => return errors::store_error_to_response(e),
    };
    Json(dto::order_to_json(&order, &lines)).into_response()
}

pub async fn update_status<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match ctx.ops.update_order_status(id, body.status, actor).await {
        Ok(order) => Json(dto::order_to_json(&order, &[])).into_response(),
        Err(e) => errors::op_error_to_response(e),
    }
}
