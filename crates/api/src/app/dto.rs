use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use stockflow_core::{ProductId, SupplierId};
use stockflow_infra::services::{CreateSaleOrder, RecordMovement};
use stockflow_products::CatalogEntry;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Ids arrive as strings so a malformed id is reported as `invalid_id`
/// rather than a generic body error.
#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: String,
    pub quantity: i64,
    pub movement_type: String,
    pub movement_date: String,
    #[serde(default)]
    pub note: String,
}

impl RecordMovementRequest {
    pub fn into_input(self) -> Result<RecordMovement, axum::response::Response> {
        Ok(RecordMovement {
            product_id: errors::parse_id::<ProductId>(&self.product_id)?,
            quantity: self.quantity,
            movement_type: self.movement_type,
            movement_date: self.movement_date,
            note: self.note,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleOrderRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl CreateSaleOrderRequest {
    pub fn into_input(self) -> Result<CreateSaleOrder, axum::response::Response> {
        Ok(CreateSaleOrder {
            product_id: errors::parse_id::<ProductId>(&self.product_id)?,
            quantity: self.quantity,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default, alias = "stock_quantity")]
    pub opening_stock: i64,
    pub supplier_id: String,
}

impl CreateProductRequest {
    pub fn into_input(self) -> Result<CatalogEntry, axum::response::Response> {
        Ok(CatalogEntry {
            name: self.name,
            description: self.description,
            category: self.category,
            price: self.price,
            opening_stock: self.opening_stock,
            supplier_id: errors::parse_id::<SupplierId>(&self.supplier_id)?,
        })
    }
}

/// Map axum's body rejection (bad JSON, missing field, wrong type) to our error shape.
pub fn body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|axum::Json(v)| v)
        .map_err(|rejection| errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text()))
}
