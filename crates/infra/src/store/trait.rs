use std::sync::Arc;

use async_trait::async_trait;

use stockflow_core::{ProductId, SaleOrderId};
use stockflow_inventory::{NewStockMovement, StockMovement};
use stockflow_products::Product;
use stockflow_sales::{OrderResolution, SaleOrder};

use crate::error::StoreResult;

/// Durable home of the three collections the stock engine protects:
/// products (mutable `stock_quantity` only), the append-only movement ledger and
/// sale orders (mutable `status`/`sale_date` only).
///
/// ## Design Principles
///
/// - **Single choke point**: `stock_quantity` is only ever written through
///   [`StockTransaction::adjust_stock`], a conditional update that refuses to go
///   below zero.
/// - **Transactions, not sequences**: every multi-step operation (adjust + append,
///   decrement + order insert, status change + restore + append) happens inside one
///   [`StockTransaction`]; dropping it without [`StockTransaction::commit`] discards
///   every write made through it.
/// - **Append-only ledger**: there is no update or delete for movements.
///
/// Reads on the store itself see committed state only. Do not call them while
/// holding an open transaction from the same store in the same task; use the
/// transaction's own reads instead.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Open a transaction. Every write goes through one.
    async fn begin(&self) -> StoreResult<Box<dyn StockTransaction>>;

    /// Catalog lookup.
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn sale_order(&self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>>;

    /// Every sale order, oldest first (by `created_at`, then id).
    async fn sale_orders(&self) -> StoreResult<Vec<SaleOrder>>;

    /// Ledger entries for one product, in insertion order.
    async fn movements(&self, product_id: ProductId) -> StoreResult<Vec<StockMovement>>;
}

/// One atomic unit of work against a [`StockStore`].
#[async_trait]
pub trait StockTransaction: Send {
    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Catalog entry. Fails with `Conflict` if a product with the same
    /// name, category and supplier already exists.
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;

    /// Atomically apply `delta` to a product's stock and return the new quantity.
    ///
    /// Fails with `ProductNotFound` or `InsufficientStock`; on failure the stored
    /// quantity is unchanged.
    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<i64>;

    /// Append one immutable ledger entry and return it with its id and sequence.
    async fn append_movement(&mut self, movement: NewStockMovement) -> StoreResult<StockMovement>;

    async fn insert_sale_order(&mut self, order: &SaleOrder) -> StoreResult<()>;

    async fn sale_order(&mut self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>>;

    /// Move a `Pending` order to `resolution.status`, keyed on the expected
    /// current status.
    ///
    /// Fails with `OrderNotFound`, or `InvalidTransition` when the order is no
    /// longer pending (including when a concurrent transition won).
    async fn resolve_sale_order(&mut self, resolution: &OrderResolution) -> StoreResult<SaleOrder>;

    /// Make every write in this transaction durable.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn StockTransaction>> {
        (**self).begin().await
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        (**self).product(id).await
    }

    async fn sale_order(&self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>> {
        (**self).sale_order(id).await
    }

    async fn sale_orders(&self) -> StoreResult<Vec<SaleOrder>> {
        (**self).sale_orders().await
    }

    async fn movements(&self, product_id: ProductId) -> StoreResult<Vec<StockMovement>> {
        (**self).movements(product_id).await
    }
}
