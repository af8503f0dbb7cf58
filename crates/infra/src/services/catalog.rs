use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockflow_core::{DomainError, ProductId, SaleOrderId};
use stockflow_inventory::{Reconciliation, StockMovement};
use stockflow_products::{CatalogEntry, Product};
use stockflow_sales::SaleOrder;

use crate::error::StoreResult;
use crate::store::StockStore;

/// A sale order as listed, with the name of the product it was placed for.
///
/// `product_name` is `None` only if the product row has since disappeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleOrderListing {
    #[serde(flatten)]
    pub order: SaleOrder,
    pub product_name: Option<String>,
}

/// Catalog entry plus the read side: point lookups, ledger listing and
/// reconciliation.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: StockStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Enter a product into the catalog with its opening stock.
    ///
    /// Opening stock is the replay base, not a movement, so nothing is ledgered.
    #[instrument(skip(self, entry), fields(name = %entry.name, category = %entry.category), err)]
    pub async fn register_product(&self, entry: CatalogEntry) -> StoreResult<Product> {
        let product = Product::register(ProductId::new(), entry, Utc::now())?;

        let mut tx = self.store.begin().await?;
        tx.insert_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id_typed(), "product registered");
        Ok(product)
    }

    pub async fn product(&self, id: ProductId) -> StoreResult<Product> {
        self.store
            .product(id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(id).into())
    }

    pub async fn sale_order(&self, id: SaleOrderId) -> StoreResult<SaleOrder> {
        self.store
            .sale_order(id)
            .await?
            .ok_or_else(|| DomainError::OrderNotFound(id).into())
    }

    /// Every sale order, oldest first, joined with its product's name.
    pub async fn sale_orders(&self) -> StoreResult<Vec<SaleOrderListing>> {
        let orders = self.store.sale_orders().await?;

        let mut names: HashMap<ProductId, Option<String>> = HashMap::new();
        let mut listings = Vec::with_capacity(orders.len());
        for order in orders {
            let product_name = match names.get(&order.product_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .store
                        .product(order.product_id)
                        .await?
                        .map(|p| p.name().to_string());
                    names.insert(order.product_id, name.clone());
                    name
                }
            };
            listings.push(SaleOrderListing { order, product_name });
        }
        Ok(listings)
    }

    /// Ledger of one product in insertion order.
    pub async fn movements(&self, product_id: ProductId) -> StoreResult<Vec<StockMovement>> {
        // Distinguish "no entries yet" from "no such product".
        self.product(product_id).await?;
        self.store.movements(product_id).await
    }

    /// Replay the ledger from opening stock and compare with stock on hand.
    #[instrument(skip(self), err)]
    pub async fn reconcile_product(&self, product_id: ProductId) -> StoreResult<Reconciliation> {
        let product = self.product(product_id).await?;
        let movements = self.store.movements(product_id).await?;

        let report = Reconciliation::replay(
            product_id,
            product.opening_stock(),
            product.stock_quantity(),
            &movements,
        );
        if !report.consistent {
            warn!(
                expected = report.expected_stock,
                actual = report.actual_stock,
                "ledger does not explain stock on hand"
            );
        }
        Ok(report)
    }
}
