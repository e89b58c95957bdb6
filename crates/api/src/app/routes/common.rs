use axum::http::{HeaderMap, StatusCode};

use backstock_core::UserId;

use crate::app::errors;

/// Actor identity is threaded explicitly via the `x-actor-id` header; there
/// is no ambient session state.
pub fn actor_from(headers: &HeaderMap) -> Result<Option<UserId>, axum::response::Response> {
    let Some(value) = headers.get("x-actor-id") else {
        return Ok(None);
    };
    let raw = value.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_actor",
            "x-actor-id header is not valid text",
        )
    })?;
    raw.parse::<UserId>().map(Some).map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_actor",
            "x-actor-id header is not a valid user id",
        )
    })
}
