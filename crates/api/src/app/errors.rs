use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use backstock_core::DomainError;
use backstock_infra::{JobStoreError, OpError, StoreError};

pub fn op_error_to_response(err: OpError) -> axum::response::Response {
    match err {
        OpError::Domain(e) => domain_error_to_response(e),
        OpError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match &err {
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg.clone())
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg.clone()),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg.clone()),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg.clone())
        }
        DomainError::InsufficientStock { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            err.to_string(),
        ),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match &err {
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg.clone()),
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg.clone()),
        StoreError::Backend(_) => {
            // Detail goes to the logs, a generic failure to the caller.
            tracing::error!(error = %err, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "storage failure",
            )
        }
    }
}

pub fn job_error_to_response(err: JobStoreError) -> axum::response::Response {
    match &err {
        JobStoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("job {id}"))
        }
        _ => {
            tracing::error!(error = %err, "job store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "job_store_error",
                "job store failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
