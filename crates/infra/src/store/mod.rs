//! Stock store abstraction and its backends.

pub mod r#trait;
pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryStockStore, InMemoryTransaction};
pub use postgres::{PostgresStockStore, PostgresTransaction};
pub use r#trait::{StockStore, StockTransaction};
