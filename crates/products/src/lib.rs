//! Products domain module.
//!
//! Catalog records and the stock arithmetic that guards `stock_quantity`,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{CatalogEntry, Product, stock_after};
