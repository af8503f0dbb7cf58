//! Infrastructure layer: stores, application services, clock and config.

pub mod clock;
pub mod config;
pub mod error;
pub mod services;
pub mod store;


pub use error::{StoreError, StoreResult};
