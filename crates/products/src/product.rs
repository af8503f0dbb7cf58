use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, ProductId, SupplierId};

/// Decimal places a stored price keeps.
pub const PRICE_SCALE: u32 = 4;

/// Catalog fields supplied when a product is entered.
///
/// Everything here is immutable once the product exists; the stock engine only
/// ever reads it (price capture, supplier reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    /// Quantity on hand when the product enters the catalog.
    pub opening_stock: i64,
    pub supplier_id: SupplierId,
}

impl CatalogEntry {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "price cannot be negative (got {})",
                self.price
            )));
        }
        if self.price.normalize().scale() > PRICE_SCALE {
            return Err(DomainError::validation(format!(
                "price carries more than {PRICE_SCALE} decimal places (got {})",
                self.price
            )));
        }
        if self.opening_stock < 0 {
            return Err(DomainError::validation(format!(
                "opening stock cannot be negative (got {})",
                self.opening_stock
            )));
        }
        Ok(())
    }

    /// Two entries describe the same listing when name, category and supplier match.
    pub fn same_listing(&self, other: &CatalogEntry) -> bool {
        self.name == other.name
            && self.category == other.category
            && self.supplier_id == other.supplier_id
    }
}

/// A catalog product together with its current stock level.
///
/// `stock_quantity` is private: the only mutation is [`Product::apply_stock_delta`],
/// which refuses to take it below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    #[serde(flatten)]
    catalog: CatalogEntry,
    stock_quantity: i64,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Enter a new product into the catalog; stock starts at `opening_stock`.
    pub fn register(
        id: ProductId,
        catalog: CatalogEntry,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        catalog.validate()?;
        Ok(Self {
            id,
            stock_quantity: catalog.opening_stock,
            catalog,
            created_at,
        })
    }

    /// Rebuild a product from persisted state (no validation, storage is trusted).
    pub fn restore(
        id: ProductId,
        catalog: CatalogEntry,
        stock_quantity: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            catalog,
            stock_quantity,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn catalog(&self) -> &CatalogEntry {
        &self.catalog
    }

    pub fn name(&self) -> &str {
        &self.catalog.name
    }

    pub fn price(&self) -> Decimal {
        self.catalog.price
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.catalog.supplier_id
    }

    pub fn opening_stock(&self) -> i64 {
        self.catalog.opening_stock
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply a signed stock delta, returning the new quantity.
    ///
    /// Fails with `InsufficientStock` (and leaves the product untouched) when the
    /// result would be negative.
    pub fn apply_stock_delta(&mut self, delta: i64) -> DomainResult<i64> {
        let next = stock_after(self.id, self.stock_quantity, delta)?;
        self.stock_quantity = next;
        Ok(next)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Non-negativity guard shared by every stock backend.
pub fn stock_after(product_id: ProductId, current: i64, delta: i64) -> DomainResult<i64> {
    match current.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        Some(_) => Err(DomainError::insufficient_stock(
            product_id,
            current,
            delta.saturating_neg(),
        )),
        None => Err(DomainError::validation(format!(
            "stock adjustment of {delta} overflows the current quantity {current}"
        ))),
    }
}
