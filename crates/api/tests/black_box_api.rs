use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use stockflow_api::app::{build_app, services::AppServices};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, bound to an ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn post_empty(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn create_product(&self, name: &str, stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({
                    "name": name,
                    "description": "test product",
                    "category": "hardware",
                    "price": "19.99",
                    "opening_stock": stock,
                    "supplier_id": "0190f5a4-7c1e-7000-8000-000000000001",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn stock_of(&self, product_id: &str) -> i64 {
        let (status, body) = self.get(&format!("/products/{product_id}")).await;
        assert_eq!(status, StatusCode::OK);
        body["stock_quantity"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_reports_backend() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "in_memory");
}

#[tokio::test]
async fn out_movement_updates_stock_and_ledger() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Hinge", 10).await;

    let (status, body) = srv
        .post(
            "/stock/movements",
            json!({
                "product_id": id,
                "quantity": 3,
                "movement_type": "out",
                "movement_date": "2024-01-01",
                "note": "sold",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["stock_quantity"], 7);
    assert_eq!(body["movement"]["movement_type"], "out");
    assert_eq!(body["movement"]["movement_date"], "2024-01-01");

    assert_eq!(srv.stock_of(&id).await, 7);
    let (_, ledger) = srv.get(&format!("/products/{id}/movements")).await;
    assert_eq!(ledger.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_movements_map_to_bad_request_and_change_nothing() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Latch", 4).await;

    for (payload, code) in [
        (json!({"product_id": id, "quantity": 1, "movement_type": "sideways", "movement_date": "2024-01-01"}), "invalid_movement_type"),
        (json!({"product_id": id, "quantity": 1, "movement_type": " in", "movement_date": "2024-01-01"}), "invalid_movement_type"),
        (json!({"product_id": id, "quantity": 1, "movement_type": "out ", "movement_date": "2024-01-01"}), "invalid_movement_type"),
        (json!({"product_id": id, "quantity": 0, "movement_type": "in", "movement_date": "2024-01-01"}), "invalid_quantity"),
        (json!({"product_id": id, "quantity": 1, "movement_type": "in", "movement_date": "2024-02-30"}), "invalid_date"),
        (json!({"product_id": id, "quantity": 1, "movement_type": "in", "movement_date": "1/2/2024"}), "invalid_date"),
        (json!({"product_id": "not-a-uuid", "quantity": 1, "movement_type": "in", "movement_date": "2024-01-01"}), "invalid_id"),
        (json!({"product_id": id, "movement_type": "in"}), "invalid_body"),
    ] {
        let (status, body) = srv.post("/stock/movements", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["error"], code);
    }

    assert_eq!(srv.stock_of(&id).await, 4);
    let (_, ledger) = srv.get(&format!("/products/{id}/movements")).await;
    assert!(ledger.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_stock_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Spring", 5).await;

    let (status, _) = srv
        .post("/sales/orders", json!({"product_id": id, "quantity": 5}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srv.stock_of(&id).await, 0);

    let (status, body) = srv
        .post("/sales/orders", json!({"product_id": id, "quantity": 1}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
}

#[tokio::test]
async fn sale_order_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Valve", 10).await;

    let (status, order) = srv
        .post("/sales/orders", json!({"product_id": id, "quantity": 2}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert!(order["sale_date"].is_null());
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(srv.stock_of(&id).await, 8);

    let (status, cancelled) = srv
        .post_empty(&format!("/sales/orders/{order_id}/cancel"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["sale_date"].is_string());
    assert_eq!(srv.stock_of(&id).await, 10);

    // Terminal: both transitions now fail and nothing moves.
    for action in ["complete", "cancel"] {
        let (status, body) = srv
            .post_empty(&format!("/sales/orders/{order_id}/{action}"))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transition");
    }
    assert_eq!(srv.stock_of(&id).await, 10);

    let (status, fetched) = srv.get(&format!("/sales/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, cancelled);

    let (_, report) = srv.get(&format!("/products/{id}/reconciliation")).await;
    assert_eq!(report["consistent"], true);
    assert_eq!(report["entries"], 2);
}

#[tokio::test]
async fn sale_orders_are_listed_oldest_first_with_product_names() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/sales/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let bolt = srv.create_product("Bolt", 10).await;
    let nut = srv.create_product("Nut", 10).await;

    let mut placed = Vec::new();
    for (product_id, quantity) in [(&bolt, 1), (&nut, 2), (&bolt, 3)] {
        let (status, order) = srv
            .post("/sales/orders", json!({"product_id": product_id, "quantity": quantity}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        placed.push(order["id"].as_str().unwrap().to_string());
    }
    srv.post_empty(&format!("/sales/orders/{}/complete", placed[1])).await;

    let (status, body) = srv.get("/sales/orders").await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    let ids: Vec<_> = listed.iter().map(|o| o["id"].as_str().unwrap()).collect();
    assert_eq!(ids, placed.iter().map(String::as_str).collect::<Vec<_>>());

    let names: Vec<_> = listed.iter().map(|o| o["product_name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Bolt", "Nut", "Bolt"]);
    assert_eq!(listed[0]["product_id"], bolt.as_str());
    assert_eq!(listed[1]["status"], "completed");
    assert_eq!(listed[2]["quantity"], 3);
}

#[tokio::test]
async fn price_finer_than_four_decimals_is_rejected() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post(
            "/products",
            json!({
                "name": "Shim",
                "category": "hardware",
                "price": "0.12345",
                "supplier_id": "0190f5a4-7c1e-7000-8000-000000000002",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let srv = TestServer::spawn().await;
    let missing = "0190f5a4-7c1e-7000-8000-00000000ffff";

    let (status, body) = srv.get(&format!("/products/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "product_not_found");

    let (status, body) = srv
        .post_empty(&format!("/sales/orders/{missing}/complete"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "order_not_found");

    let (status, body) = srv
        .post("/sales/orders", json!({"product_id": missing, "quantity": 1}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "product_not_found");
}

#[tokio::test]
async fn duplicate_product_listing_is_rejected() {
    let srv = TestServer::spawn().await;
    srv.create_product("Gasket", 1).await;

    let (status, body) = srv
        .post(
            "/products",
            json!({
                "name": "Gasket",
                "category": "hardware",
                "price": "2.50",
                "supplier_id": "0190f5a4-7c1e-7000-8000-000000000001",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = srv
        .post(
            "/products",
            json!({
                "name": "Washer",
                "category": "hardware",
                "price": "-1",
                "supplier_id": "0190f5a4-7c1e-7000-8000-000000000001",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
