use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockflow_core::SaleOrderId;
use stockflow_sales::OrderAction;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_sale_order).get(list_sale_orders))
        .route("/orders/:id", get(get_sale_order))
        .route("/orders/:id/complete", post(complete_sale_order))
        .route("/orders/:id/cancel", post(cancel_sale_order))
}

pub async fn create_sale_order(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateSaleOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::body(payload).and_then(dto::CreateSaleOrderRequest::into_input) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.create(request).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// All sale orders, oldest first, each carrying its product's name.
pub async fn list_sale_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.sale_orders().await {
        Ok(listings) => Json(listings).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_sale_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleOrderId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.sale_order(id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn complete_sale_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(services, &id, OrderAction::Complete).await
}

pub async fn cancel_sale_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(services, &id, OrderAction::Cancel).await
}

async fn transition(
    services: Arc<AppServices>,
    raw_id: &str,
    action: OrderAction,
) -> axum::response::Response {
    let id: SaleOrderId = match errors::parse_id(raw_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = match action {
        OrderAction::Complete => services.orders.complete(id).await,
        OrderAction::Cancel => services.orders.cancel(id).await,
    };
    match result {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
