//! Postgres-backed stock store implementation.
//!
//! Every write the engine performs runs inside a Postgres transaction, and the
//! two contended writes are single conditional statements:
//!
//! - stock adjustment: `UPDATE products SET stock_quantity = stock_quantity + $2
//!   WHERE id = $1 AND stock_quantity + $2 >= 0`. The row lock taken by the update
//!   serializes concurrent adjustments of the same product until commit, and the
//!   predicate is evaluated against the latest committed quantity. When no row
//!   matches, the row is re-read `FOR UPDATE` and the decision is made again on
//!   that locked value, so `InsufficientStock.available` is always a quantity
//!   that really could not cover the request.
//! - order transitions: `UPDATE sale_orders ... WHERE id = $1 AND status = 'pending'`.
//!   Of two concurrent transitions exactly one matches a row.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` | Duplicate listing or id |
//! | Database (foreign key violation) | `23503` | `Domain(ProductNotFound)` (ledger/order inserts) | Product vanished mid-flight |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Domain(Conflict)` | Lost a concurrent race |
//! | Database (numeric value out of range) | `22003` | `Domain(Validation)` | Stock adjustment overflows BIGINT |
//! | Database (other) | Any other | `Storage` | Check violations, trigger errors, ... |
//! | PoolClosed / Io / other | N/A | `Storage` | Connection failures |
//!
//! ## Thread Safety
//!
//! `PostgresStockStore` is `Send + Sync` and can be shared across threads.
//! All operations use the SQLx connection pool which handles thread-safe connection management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockflow_core::{DomainError, ProductId, SaleOrderId, StockMovementId, SupplierId};
use stockflow_inventory::{MovementDate, MovementType, NewStockMovement, StockMovement};
use stockflow_products::{CatalogEntry, Product, stock_after};
use stockflow_sales::{OrderResolution, SaleOrder, SaleOrderStatus};

use super::r#trait::{StockStore, StockTransaction};
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_stockflow.sql");

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, description, category, price, opening_stock, stock_quantity,
           supplier_id, created_at
    FROM products
    WHERE id = $1
"#;

const SELECT_MOVEMENTS: &str = r#"
    SELECT sequence, id, product_id, quantity, movement_type, movement_date, note, recorded_at
    FROM stock_movements
    WHERE product_id = $1
    ORDER BY sequence ASC
"#;

const SELECT_SALE_ORDER: &str = r#"
    SELECT id, product_id, quantity, unit_price, total_price, status, sale_date, created_at
    FROM sale_orders
    WHERE id = $1
"#;

const SELECT_SALE_ORDERS: &str = r#"
    SELECT id, product_id, quantity, unit_price, total_price, status, sale_date, created_at
    FROM sale_orders
    ORDER BY created_at ASC, id ASC
"#;

/// Key for the advisory lock that serializes concurrent `migrate` calls.
const MIGRATION_LOCK_KEY: i64 = 0x5354_4f43_4b46_4c57;

/// Postgres-backed stock store.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool of at most `max_connections` connections to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema. Idempotent, and safe to call from several
    /// processes at once (the DDL runs under a transaction-scoped advisory lock).
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("migrate", e))
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn begin(&self) -> StoreResult<Box<dyn StockTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(SELECT_PRODUCT)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;
        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn sale_order(&self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>> {
        let row = sqlx::query(SELECT_SALE_ORDER)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_sale_order", e))?;
        row.map(|r| sale_order_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn sale_orders(&self) -> StoreResult<Vec<SaleOrder>> {
        let rows = sqlx::query(SELECT_SALE_ORDERS)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_sale_orders", e))?;
        rows.iter().map(sale_order_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn movements(&self, product_id: ProductId) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query(SELECT_MOVEMENTS)
            .bind(product_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_movements", e))?;
        rows.iter().map(movement_from_row).collect()
    }
}

/// A Postgres transaction. Dropping it without `commit` rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTransaction for PostgresTransaction {
    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(SELECT_PRODUCT)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;
        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        let catalog = product.catalog();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, price,
                opening_stock, stock_quantity, supplier_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(&catalog.name)
        .bind(&catalog.description)
        .bind(&catalog.category)
        .bind(catalog.price)
        .bind(catalog.opening_stock)
        .bind(product.stock_quantity())
        .bind(catalog.supplier_id.as_uuid())
        .bind(product.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Domain(DomainError::conflict(format!(
                    "a similar product already exists (name '{}', category '{}', supplier {})",
                    catalog.name, catalog.category, catalog.supplier_id
                )))
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<i64> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_stock", e))?;

        if let Some(quantity) = updated {
            return Ok(quantity);
        }

        // No row matched: either the product is missing or the guard refused.
        // Lock the row so the decision and the reported figure use one value.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("adjust_stock", e))?;

        let Some(available) = current else {
            return Err(DomainError::ProductNotFound(id).into());
        };

        // A restock committed between the update and the lock can make the delta fit now.
        let next = stock_after(id, available, delta)?;
        sqlx::query_scalar("UPDATE products SET stock_quantity = $2 WHERE id = $1 RETURNING stock_quantity")
            .bind(id.as_uuid())
            .bind(next)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("adjust_stock", e))
    }

    #[instrument(skip(self, movement), fields(product_id = %movement.product_id), err)]
    async fn append_movement(&mut self, movement: NewStockMovement) -> StoreResult<StockMovement> {
        let id = StockMovementId::new();
        let recorded_at = Utc::now();
        let product_id = movement.product_id;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stock_movements (
                id, product_id, quantity, movement_type, movement_date, note, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sequence
            "#,
        )
        .bind(id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(movement.quantity)
        .bind(movement.movement_type.as_str())
        .bind(movement.movement_date.as_naive())
        .bind(&movement.note)
        .bind(recorded_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::Domain(DomainError::ProductNotFound(product_id))
            } else {
                map_sqlx_error("append_movement", e)
            }
        })?;

        Ok(StockMovement::from_new(id, sequence as u64, movement, recorded_at))
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn insert_sale_order(&mut self, order: &SaleOrder) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_orders (
                id, product_id, quantity, unit_price, total_price, status, sale_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.product_id.as_uuid())
        .bind(order.quantity)
        .bind(order.unit_price)
        .bind(order.total_price)
        .bind(order.status.as_str())
        .bind(order.sale_date)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::Domain(DomainError::ProductNotFound(order.product_id))
            } else {
                map_sqlx_error("insert_sale_order", e)
            }
        })?;
        Ok(())
    }

    async fn sale_order(&mut self, id: SaleOrderId) -> StoreResult<Option<SaleOrder>> {
        let row = sqlx::query(SELECT_SALE_ORDER)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_sale_order", e))?;
        row.map(|r| sale_order_from_row(&r)).transpose()
    }

    #[instrument(
        skip(self, resolution),
        fields(order_id = %resolution.order_id, action = resolution.action.as_str()),
        err
    )]
    async fn resolve_sale_order(&mut self, resolution: &OrderResolution) -> StoreResult<SaleOrder> {
        let row = sqlx::query(
            r#"
            UPDATE sale_orders
            SET status = $2, sale_date = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING id, product_id, quantity, unit_price, total_price, status, sale_date, created_at
            "#,
        )
        .bind(resolution.order_id.as_uuid())
        .bind(resolution.status.as_str())
        .bind(resolution.sale_date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("resolve_sale_order", e))?;

        if let Some(row) = row {
            return sale_order_from_row(&row);
        }

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM sale_orders WHERE id = $1")
                .bind(resolution.order_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("resolve_sale_order", e))?;

        match status {
            None => Err(DomainError::OrderNotFound(resolution.order_id).into()),
            Some(status) => Err(DomainError::invalid_transition(
                resolution.order_id,
                status,
                resolution.action.as_str(),
            )
            .into()),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Domain(DomainError::conflict(msg)),
                // Serialization failure / deadlock detected
                Some("40001") | Some("40P01") => StoreError::Domain(DomainError::conflict(msg)),
                // Numeric value out of range (e.g. BIGINT overflow on a stock adjustment)
                Some("22003") => StoreError::Domain(DomainError::validation(msg)),
                _ => StoreError::storage(operation, msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::storage(operation, "connection pool closed"),
        sqlx::Error::RowNotFound => StoreError::storage(operation, "unexpected row not found"),
        other => StoreError::storage(operation, other.to_string()),
    }
}

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(actual) = db_err.code() {
            return actual.as_ref() == code;
        }
    }
    false
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23503")
}

fn corrupt(operation: &'static str, e: impl core::fmt::Display) -> StoreError {
    StoreError::storage(operation, format!("failed to decode row: {e}"))
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    opening_stock: i64,
    stock_quantity: i64,
    supplier_id: uuid::Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            price: row.try_get("price")?,
            opening_stock: row.try_get("opening_stock")?,
            stock_quantity: row.try_get("stock_quantity")?,
            supplier_id: row.try_get("supplier_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product::restore(
            ProductId::from_uuid(row.id),
            CatalogEntry {
                name: row.name,
                description: row.description,
                category: row.category,
                price: row.price,
                opening_stock: row.opening_stock,
                supplier_id: SupplierId::from_uuid(row.supplier_id),
            },
            row.stock_quantity,
            row.created_at,
        )
    }
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    ProductRow::from_row(row)
        .map(Product::from)
        .map_err(|e| corrupt("decode_product", e))
}

#[derive(Debug)]
struct MovementRow {
    sequence: i64,
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i64,
    movement_type: String,
    movement_date: NaiveDate,
    note: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            sequence: row.try_get("sequence")?,
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            movement_type: row.try_get("movement_type")?,
            movement_date: row.try_get("movement_date")?,
            note: row.try_get("note")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

fn movement_from_row(row: &PgRow) -> StoreResult<StockMovement> {
    let row = MovementRow::from_row(row).map_err(|e| corrupt("decode_movement", e))?;
    let movement_type =
        MovementType::parse(&row.movement_type).map_err(|e| corrupt("decode_movement", e))?;

    Ok(StockMovement {
        id: StockMovementId::from_uuid(row.id),
        sequence: row.sequence as u64,
        product_id: ProductId::from_uuid(row.product_id),
        quantity: row.quantity,
        movement_type,
        movement_date: MovementDate::from_naive(row.movement_date),
        note: row.note,
        recorded_at: row.recorded_at,
    })
}

#[derive(Debug)]
struct SaleOrderRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i64,
    unit_price: Decimal,
    total_price: Decimal,
    status: String,
    sale_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SaleOrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleOrderRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            total_price: row.try_get("total_price")?,
            status: row.try_get("status")?,
            sale_date: row.try_get("sale_date")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn sale_order_from_row(row: &PgRow) -> StoreResult<SaleOrder> {
    let row = SaleOrderRow::from_row(row).map_err(|e| corrupt("decode_sale_order", e))?;
    let status = SaleOrderStatus::parse(&row.status).map_err(|e| corrupt("decode_sale_order", e))?;

    Ok(SaleOrder {
        id: SaleOrderId::from_uuid(row.id),
        product_id: ProductId::from_uuid(row.product_id),
        quantity: row.quantity,
        unit_price: row.unit_price,
        total_price: row.total_price,
        status,
        sale_date: row.sale_date,
        created_at: row.created_at,
    })
}

/// These run against a live database and are skipped when `DATABASE_URL` is
/// unset. Every test registers its own products under a fresh supplier, so
/// they can share one database and run in parallel.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::services::{
        CatalogService, CreateSaleOrder, RecordMovement, SaleOrderLifecycle, StockMovementService,
    };

    async fn test_store() -> Option<PostgresStockStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping postgres test");
            return None;
        };
        let store = PostgresStockStore::connect(&url, 10).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn entry(name: &str, opening_stock: i64) -> CatalogEntry {
        CatalogEntry {
            name: format!("{name} {}", ProductId::new()),
            description: String::new(),
            category: "pg".to_string(),
            price: Decimal::new(1999, 2),
            opening_stock,
            supplier_id: SupplierId::new(),
        }
    }

    async fn product_with_stock(store: &PostgresStockStore, stock: i64) -> ProductId {
        CatalogService::new(store.clone())
            .register_product(entry("Item", stock))
            .await
            .unwrap()
            .id_typed()
    }

    async fn stock(store: &PostgresStockStore, id: ProductId) -> i64 {
        store.product(id).await.unwrap().unwrap().stock_quantity()
    }

    fn movement(product_id: ProductId, quantity: i64, ty: &str) -> RecordMovement {
        RecordMovement {
            product_id,
            quantity,
            movement_type: ty.to_string(),
            movement_date: "2024-03-01".to_string(),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn adjust_refuses_to_go_negative_and_reports_what_was_there() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 2).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.adjust_stock(id, -3).await.unwrap_err();
        assert!(
            matches!(
                err,
                StoreError::Domain(DomainError::InsufficientStock { available: 2, requested: 3, .. })
            ),
            "{err}"
        );
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.adjust_stock(ProductId::new(), -1).await,
            Err(StoreError::Domain(DomainError::ProductNotFound(_)))
        ));
        drop(tx);

        assert_eq!(stock(&store, id).await, 2);
    }

    #[tokio::test]
    async fn bigint_overflow_is_a_validation_error() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.adjust_stock(id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))), "{err}");
        drop(tx);

        let service = StockMovementService::new(store.clone());
        let err = service
            .record_movement(movement(id, i64::MAX, "in"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))), "{err}");

        assert_eq!(stock(&store, id).await, 1);
        assert!(store.movements(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.adjust_stock(id, -2).await.unwrap(), 3);
        drop(tx);

        assert_eq!(stock(&store, id).await, 5);
    }

    #[tokio::test]
    async fn duplicate_listing_is_a_conflict() {
        let Some(store) = test_store().await else { return };
        let catalog = CatalogService::new(store.clone());
        let listing = entry("Gasket", 1);

        catalog.register_product(listing.clone()).await.unwrap();
        let err = catalog.register_product(listing).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))), "{err}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decrements_succeed_exactly_stock_times() {
        const STOCK: i64 = 5;
        const ATTEMPTS: usize = 20;

        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, STOCK).await;

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut tx = store.begin().await?;
                    let quantity = tx.adjust_stock(id, -1).await?;
                    tx.commit().await?;
                    Ok::<i64, StoreError>(quantity)
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(quantity) => {
                    assert!(quantity >= 0);
                    succeeded += 1;
                }
                Err(StoreError::Domain(DomainError::InsufficientStock { available, requested, .. })) => {
                    assert_eq!((available, requested), (0, 1));
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, STOCK as usize);
        assert_eq!(stock(&store, id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completes_have_a_single_winner() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 1).await;
        let orders = Arc::new(SaleOrderLifecycle::with_clock(
            store.clone(),
            FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        ));
        let order = orders
            .create(CreateSaleOrder { product_id: id, quantity: 1 })
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orders = orders.clone();
                tokio::spawn(async move { orders.complete(order.id).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(completed) => {
                    assert_eq!(completed.status, SaleOrderStatus::Completed);
                    winners += 1;
                }
                Err(err) => assert!(
                    matches!(err, StoreError::Domain(DomainError::InvalidTransition { .. })),
                    "{err}"
                ),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(stock(&store, id).await, 0);
        // Creation wrote the only entry; completion writes none.
        assert_eq!(store.movements(id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn mixed_movements_report_coherent_refusals_and_reconcile() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 2).await;
        let service = Arc::new(StockMovementService::new(store.clone()));

        let handles: Vec<_> = (0..24)
            .map(|i| {
                let service = service.clone();
                let (ty, quantity) = if i % 3 == 0 { ("in", 2) } else { ("out", 1) };
                tokio::spawn(async move {
                    service.record_movement(movement(id, quantity, ty)).await
                })
            })
            .collect();

        for handle in handles {
            match handle.await.unwrap() {
                Ok(recorded) => assert!(recorded.stock_quantity >= 0),
                Err(StoreError::Domain(DomainError::InsufficientStock { available, requested, .. })) => {
                    assert!(available < requested, "refused {requested} with {available} on hand");
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let report = CatalogService::new(store.clone())
            .reconcile_product(id)
            .await
            .unwrap();
        assert!(report.consistent, "ledger drifted: {report:?}");
        assert!(report.actual_stock >= 0);
    }

    #[tokio::test]
    async fn sale_orders_come_back_oldest_first() {
        let Some(store) = test_store().await else { return };
        let id = product_with_stock(&store, 10).await;
        let orders = SaleOrderLifecycle::new(store.clone());

        let mut placed = Vec::new();
        for quantity in [3, 1, 2] {
            let order = orders
                .create(CreateSaleOrder { product_id: id, quantity })
                .await
                .unwrap();
            placed.push(order.id);
        }

        // The database is shared; only look at this product's orders.
        let listed: Vec<_> = store
            .sale_orders()
            .await
            .unwrap()
            .into_iter()
            .filter(|o| o.product_id == id)
            .map(|o| o.id)
            .collect();
        assert_eq!(listed, placed);
    }
}
