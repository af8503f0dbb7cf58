//! Domain error model.

use thiserror::Error;

use crate::id::{ProductId, SaleOrderId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A movement or order quantity was zero or negative.
    #[error("invalid quantity {0}: quantity must be a positive integer")]
    InvalidQuantity(i64),

    /// Movement direction was something other than `in`/`out`.
    #[error("invalid movement type '{0}': expected one of in, out")]
    InvalidMovementType(String),

    /// Movement date did not match `YYYY-MM-DD` or is not a calendar date.
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Any other malformed input (e.g. negative price, empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("sale order {0} not found")]
    OrderNotFound(SaleOrderId),

    /// Applying the requested change would leave `stock_quantity` negative.
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The order is not in a state that allows the requested action.
    #[error("cannot {action} sale order {order_id} in status {status}")]
    InvalidTransition {
        order_id: SaleOrderId,
        status: String,
        action: &'static str,
    },

    /// A conflict occurred (duplicate record, lost compare-and-set, serialization failure).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(product_id: ProductId, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            product_id,
            available,
            requested,
        }
    }

    pub fn invalid_transition(
        order_id: SaleOrderId,
        status: impl core::fmt::Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            order_id,
            status: status.to_string(),
            action,
        }
    }

    /// True for the not-found family (product or order).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProductNotFound(_) | Self::OrderNotFound(_))
    }

    /// True for malformed-input failures, rejected before any state is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity(_)
                | Self::InvalidMovementType(_)
                | Self::InvalidDate(_)
                | Self::Validation(_)
                | Self::InvalidId(_)
        )
    }
}
