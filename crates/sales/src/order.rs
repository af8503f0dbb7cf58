use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, ProductId, SaleOrderId};
use stockflow_products::Product;

/// Sale order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleOrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl SaleOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown sale order status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl core::fmt::Display for SaleOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move an order out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Complete,
    Cancel,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// Status the order lands in when this action succeeds.
    pub fn target(&self) -> SaleOrderStatus {
        match self {
            Self::Complete => SaleOrderStatus::Completed,
            Self::Cancel => SaleOrderStatus::Cancelled,
        }
    }
}

/// The outcome of a permitted transition, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResolution {
    pub order_id: SaleOrderId,
    pub product_id: ProductId,
    pub action: OrderAction,
    pub status: SaleOrderStatus,
    pub sale_date: NaiveDate,
    /// Signed stock change the transition implies (0 for completion, `+quantity`
    /// for cancellation, which returns the units taken at creation).
    pub stock_effect: i64,
}

/// A single-product sale order.
///
/// Prices are captured at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: SaleOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: SaleOrderStatus,
    /// `None` while pending; the resolution date once completed or cancelled.
    pub sale_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl SaleOrder {
    /// Place a new pending order against `product`.
    ///
    /// Checks the quantity and that current stock covers it; the stock decrement
    /// itself is the caller's job and must happen in the same transaction as the
    /// insert.
    pub fn place(
        id: SaleOrderId,
        product: &Product,
        quantity: i64,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        if quantity > product.stock_quantity() {
            return Err(DomainError::insufficient_stock(
                product.id_typed(),
                product.stock_quantity(),
                quantity,
            ));
        }

        let unit_price = product.price();
        Ok(Self {
            id,
            product_id: product.id_typed(),
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
            status: SaleOrderStatus::Pending,
            sale_date: None,
            created_at,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Decide whether `action` is allowed and what it implies. Does not mutate.
    pub fn resolve(&self, action: OrderAction, today: NaiveDate) -> DomainResult<OrderResolution> {
        if self.status != SaleOrderStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.id,
                self.status,
                action.as_str(),
            ));
        }

        let stock_effect = match action {
            OrderAction::Complete => 0,
            OrderAction::Cancel => self.quantity,
        };

        Ok(OrderResolution {
            order_id: self.id,
            product_id: self.product_id,
            action,
            status: action.target(),
            sale_date: today,
            stock_effect,
        })
    }

    /// Evolve state from a resolution produced by [`SaleOrder::resolve`].
    pub fn apply(&mut self, resolution: &OrderResolution) {
        self.status = resolution.status;
        self.sale_date = Some(resolution.sale_date);
    }
}

impl Entity for SaleOrder {
    type Id = SaleOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
