use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockflow_core::{DomainError, Entity, ProductId, SaleOrderId, StockMovementId};
use stockflow_inventory::{NewStockMovement, StockMovement};
use stockflow_products::Product;
use stockflow_sales::{OrderResolution, SaleOrder, SaleOrderStatus};

use super::r#trait::{StockStore, StockTransaction};
use crate::error::StoreResult;

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    movements: Vec<StockMovement>,
    orders: HashMap<SaleOrderId, SaleOrder>,
}

fn upsert<E: Entity>(map: &mut HashMap<E::Id, E>, entity: E) -> Option<E> {
    map.insert(*entity.id(), entity)
}

/// In-memory stock store.
///
/// Intended for tests/dev. Not optimized for performance: a transaction holds
/// the store-wide lock from `begin` until it is committed or dropped, so all
/// transactions are serialized.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> StoreResult<Box<dyn StockTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state: guard,
            undo: Vec::new(),
            committed: false,
        }))
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn sale_order(&self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn sale_orders(&self) -> StoreResult<Vec<SaleOrder>> {
        let state = self.state.lock().await;
        let mut orders: Vec<SaleOrder> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn movements(&self, product_id: ProductId) -> StoreResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}

/// Reverse operation recorded for every write, replayed if the transaction is
/// dropped uncommitted.
#[derive(Debug)]
enum Undo {
    Product(ProductId, Option<Product>),
    Order(SaleOrderId, Option<SaleOrder>),
    Movement,
}

pub struct InMemoryTransaction {
    state: OwnedMutexGuard<State>,
    undo: Vec<Undo>,
    committed: bool,
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(op) = self.undo.pop() {
            match op {
                Undo::Product(id, Some(previous)) => {
                    self.state.products.insert(id, previous);
                }
                Undo::Product(id, None) => {
                    self.state.products.remove(&id);
                }
                Undo::Order(id, Some(previous)) => {
                    self.state.orders.insert(id, previous);
                }
                Undo::Order(id, None) => {
                    self.state.orders.remove(&id);
                }
                Undo::Movement => {
                    self.state.movements.pop();
                }
            }
        }
    }
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.state.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        let id = product.id_typed();
        if self.state.products.contains_key(&id) {
            return Err(DomainError::conflict(format!("product {id} already exists")).into());
        }
        if let Some(existing) = self
            .state
            .products
            .values()
            .find(|p| p.catalog().same_listing(product.catalog()))
        {
            return Err(DomainError::conflict(format!(
                "a similar product already exists with id {}",
                existing.id_typed()
            ))
            .into());
        }

        upsert(&mut self.state.products, product.clone());
        self.undo.push(Undo::Product(id, None));
        Ok(())
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<i64> {
        let product = self
            .state
            .products
            .get_mut(&id)
            .ok_or(DomainError::ProductNotFound(id))?;

        let previous = product.clone();
        let quantity = product.apply_stock_delta(delta)?;
        self.undo.push(Undo::Product(id, Some(previous)));
        Ok(quantity)
    }

    async fn append_movement(&mut self, movement: NewStockMovement) -> StoreResult<StockMovement> {
        if !self.state.products.contains_key(&movement.product_id) {
            return Err(DomainError::ProductNotFound(movement.product_id).into());
        }
        let sequence = self.state.movements.len() as u64 + 1;
        let stored = StockMovement::from_new(StockMovementId::new(), sequence, movement, Utc::now());
        self.state.movements.push(stored.clone());
        self.undo.push(Undo::Movement);
        Ok(stored)
    }

    async fn insert_sale_order(&mut self, order: &SaleOrder) -> StoreResult<()> {
        if self.state.orders.contains_key(&order.id) {
            return Err(DomainError::conflict(format!("sale order {} already exists", order.id)).into());
        }
        upsert(&mut self.state.orders, order.clone());
        self.undo.push(Undo::Order(order.id, None));
        Ok(())
    }

    async fn sale_order(&mut self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>> {
        Ok(self.state.orders.get(&id).cloned())
    }

    async fn resolve_sale_order(&mut self, resolution: &OrderResolution) -> StoreResult<SaleOrder> {
        let id = resolution.order_id;
        let order = self
            .state
            .orders
            .get_mut(&id)
            .ok_or(DomainError::OrderNotFound(id))?;

        // Compare-and-set on the expected current status.
        if order.status != SaleOrderStatus::Pending {
            return Err(DomainError::invalid_transition(
                id,
                order.status,
                resolution.action.as_str(),
            )
            .into());
        }

        let previous = order.clone();
        order.apply(resolution);
        let updated = order.clone();
        self.undo.push(Undo::Order(id, Some(previous)));
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self;
        tx.committed = true;
        tx.undo.clear();
        Ok(())
    }
}
