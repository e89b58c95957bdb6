use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use backstock_core::ProductId;
use backstock_infra::StorageBackend;
use backstock_products::Product;

use crate::app::{dto, errors, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new().route("/", post(create_product::<S>).get(list_products::<S>))
}

pub async fn create_product<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let product = match Product::new(
        ProductId::new(),
        body.name,
        body.price,
        body.inventory_id,
        Utc::now(),
    ) {
        Ok(product) => product,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match ctx.ops.store().insert_product(&product).await {
        Ok(()) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_products<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
) -> axum::response::Response {
    match ctx.ops.store().list_products().await {
        Ok(products) => Json(products.iter().map(dto::product_to_json).collect::<Vec<_>>())
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
