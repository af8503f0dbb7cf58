use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/movements", post(record_movement))
}

/// `record_movement`: 201 with the ledger entry and the resulting stock.
pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::RecordMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::body(payload).and_then(dto::RecordMovementRequest::into_input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movements.record_movement(request).await {
        Ok(recorded) => (StatusCode::CREATED, Json(recorded)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
