use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use backstock_infra::StorageBackend;

use crate::app::{dto, AppContext};

pub fn router<S: StorageBackend>() -> Router {
    Router::new().route("/", get(list_notifications::<S>))
}

/// Per-user notification feed: the user's own entries plus broadcasts.
pub async fn list_notifications<S: StorageBackend>(
    Extension(ctx): Extension<AppContext<S>>,
    Query(query): Query<dto::NotificationsQuery>,
) -> axum::response::Response {
    let notifications = ctx.sink.visible_to(query.user_id);
    Json(
        notifications
            .iter()
            .map(dto::notification_to_json)
            .collect::<Vec<_>>(),
    )
    .into_response()
}
