use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockflow_core::DomainError;
use stockflow_infra::StoreError;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Storage { .. } => {
            tracing::error!(error = %err, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, code) = match &err {
        DomainError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
        DomainError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "invalid_quantity"),
        DomainError::InvalidMovementType(_) => (StatusCode::BAD_REQUEST, "invalid_movement_type"),
        DomainError::InvalidDate(_) => (StatusCode::BAD_REQUEST, "invalid_date"),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
        DomainError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
    };
    json_error(status, code, err.to_string())
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

/// Parse a path/body id, answering 400 `invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(domain_error_to_response)
}
