//! Application services: the operations the request boundary calls.
//!
//! Each operation opens one [`StockTransaction`](crate::store::StockTransaction),
//! performs every write through it and commits at the end. Any early return drops
//! the transaction, so a failed operation never leaves partial state behind.

pub mod catalog;
pub mod movements;
pub mod orders;

pub use catalog::{CatalogService, SaleOrderListing};
pub use movements::{RecordMovement, RecordedMovement, StockMovementService};
pub use orders::{CreateSaleOrder, SaleOrderLifecycle};
