use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockflow_core::{DomainError, ProductId, SaleOrderId};
use stockflow_inventory::{MovementDate, MovementType, NewStockMovement};
use stockflow_sales::{OrderAction, OrderResolution, SaleOrder};

use super::movements::apply_movement;
use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::store::{StockStore, StockTransaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSaleOrder {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// `Pending -> Completed | Cancelled`.
///
/// Stock leaves at creation and comes back on cancellation. Both effects are
/// ledgered through the same adjust-then-append path as manual movements, so
/// a product's ledger always replays to its current stock. Completion is pure
/// bookkeeping and writes no ledger entry.
#[derive(Debug, Clone)]
pub struct SaleOrderLifecycle<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: StockStore> SaleOrderLifecycle<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: StockStore, C: Clock> SaleOrderLifecycle<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Place a pending order and take its quantity out of stock.
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, quantity = request.quantity),
        err
    )]
    pub async fn create(&self, request: CreateSaleOrder) -> StoreResult<SaleOrder> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .product(request.product_id)
            .await?
            .ok_or(DomainError::ProductNotFound(request.product_id))?;
        let order = SaleOrder::place(SaleOrderId::new(), &product, request.quantity, Utc::now())?;

        let movement = NewStockMovement::new(
            order.product_id,
            order.quantity,
            MovementType::Out,
            MovementDate::from_naive(self.clock.today()),
            format!("sale order {} created", order.id),
        )?;
        // The conditional decrement is the real guard; `place` only read a snapshot.
        let recorded = apply_movement(tx.as_mut(), movement).await?;
        tx.insert_sale_order(&order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            total_price = %order.total_price,
            stock_quantity = recorded.stock_quantity,
            "sale order created"
        );
        Ok(order)
    }

    /// `Pending -> Completed`. No stock effect.
    pub async fn complete(&self, order_id: SaleOrderId) -> StoreResult<SaleOrder> {
        self.transition(order_id, OrderAction::Complete).await
    }

    /// `Pending -> Cancelled`, restoring the order's quantity.
    pub async fn cancel(&self, order_id: SaleOrderId) -> StoreResult<SaleOrder> {
        self.transition(order_id, OrderAction::Cancel).await
    }

    #[instrument(skip(self), fields(action = action.as_str()), err)]
    async fn transition(&self, order_id: SaleOrderId, action: OrderAction) -> StoreResult<SaleOrder> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .sale_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        let resolution = order.resolve(action, self.clock.today())?;

        // Keyed on `status = pending`; a concurrent winner turns this into InvalidTransition.
        let updated = tx.resolve_sale_order(&resolution).await?;
        apply_stock_effect(tx.as_mut(), &resolution).await?;
        tx.commit().await?;

        info!(
            order_id = %updated.id,
            status = %updated.status,
            "sale order resolved"
        );
        Ok(updated)
    }
}

async fn apply_stock_effect(
    tx: &mut dyn StockTransaction,
    resolution: &OrderResolution,
) -> StoreResult<()> {
    let effect = resolution.stock_effect;
    if effect == 0 {
        return Ok(());
    }

    let movement_type = if effect > 0 {
        MovementType::In
    } else {
        MovementType::Out
    };
    let movement = NewStockMovement::new(
        resolution.product_id,
        effect.abs(),
        movement_type,
        MovementDate::from_naive(resolution.sale_date),
        format!("sale order {} {}", resolution.order_id, resolution.status),
    )?;
    apply_movement(tx, movement).await?;
    Ok(())
}
