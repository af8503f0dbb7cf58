use axum::Router;

pub mod products;
pub mod sales;
pub mod stock;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/stock", stock::router())
        .nest("/sales", sales::router())
}
