use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use backstock_infra::JobWorkerHandle;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _worker: JobWorkerHandle,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory backend), bound to an ephemeral port.
        let (app, worker) = backstock_api::app::build_app();
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
            handle,
            _worker: worker,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal, got {other:?}"),
    }
}

async fn create_inventory(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    sku: &str,
    price: i64,
    stock: i64,
) -> Value {
    let response = client
        .post(format!("{base_url}/inventories"))
        .json(&json!({
            "name": name,
            "sku": sku,
            "unit": "pcs",
            "price": price,
            "stock": stock,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn create_product(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    price: i64,
    inventory_id: &str,
) -> Value {
    let response = client
        .post(format!("{base_url}/products"))
        .json(&json!({
            "name": name,
            "price": price,
            "inventory_id": inventory_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

/// Poll `url` until `ready` returns true for the response body.
async fn poll_until(
    client: &reqwest::Client,
    url: &str,
    ready: impl Fn(&Value) -> bool,
) -> Value {
    for _ in 0..400 {
        let response = client.get(url).send().await.unwrap();
        if response.status() == StatusCode::OK {
            let body: Value = response.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true for {url}");
}

#[tokio::test]
async fn inventory_ledger_flow() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let inventory = create_inventory(&client, base, "Arabica beans", "BEAN-001", 12, 10).await;
    let id = inventory["id"].as_str().unwrap().to_string();

    // Deduct 3 with a reason.
    let response = client
        .post(format!("{base}/inventories/{id}/adjust"))
        .json(&json!({ "delta": -3, "reason": "Spoilage write-off" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(dec(&body["new_stock"]), Decimal::from(7));

    // Over-deducting aborts with the item identified and no mutation.
    let response = client
        .post(format!("{base}/inventories/{id}/adjust"))
        .json(&json!({ "delta": -100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert!(body["message"].as_str().unwrap().contains("Arabica beans"));

    let response = client
        .get(format!("{base}/inventories/{id}"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(dec(&body["stock"]), Decimal::from(7));

    // One audit entry for the one successful adjustment.
    let response = client
        .get(format!("{base}/inventories/{id}/history"))
        .send()
        .await
        .unwrap();
    let history: Value = response.json().await.unwrap();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "stock_adjustment");
    assert_eq!(entries[0]["description"], "Spoilage write-off");

    // Tracked-field update records entries only for real changes.
    let response = client
        .put(format!("{base}/inventories/{id}"))
        .json(&json!({ "name": "Arabica beans", "price": 15 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .get(format!("{base}/inventories/{id}/history"))
        .send()
        .await
        .unwrap();
    let history: Value = response.json().await.unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2); // adjust + price change only
}

#[tokio::test]
async fn checkout_and_edit_reconciliation_flow() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let inventory = create_inventory(&client, base, "Americano", "AM-001", 5, 10).await;
    let inventory_id = inventory["id"].as_str().unwrap().to_string();
    let product = create_product(&client, base, "Americano", 5, &inventory_id).await;
    let product_id = product["id"].as_str().unwrap().to_string();

    // Over-ordering fails the whole checkout.
    let response = client
        .post(format!("{base}/orders"))
        .json(&json!({
            "customer": "Walk-in",
            "channel": "point_of_sale",
            "lines": [{ "product_id": product_id, "quantity": 20 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Valid checkout deducts and totals from the authoritative price.
    let response = client
        .post(format!("{base}/orders"))
        .json(&json!({
            "customer": "Walk-in",
            "channel": "point_of_sale",
            "lines": [{ "product_id": product_id, "quantity": 3 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    assert_eq!(dec(&order["total"]), Decimal::from(15));
    let order_id = order["id"].as_str().unwrap().to_string();
    let line_id = order["lines"][0]["id"].as_str().unwrap().to_string();

    let response = client
        .get(format!("{base}/inventories/{inventory_id}"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(dec(&body["stock"]), Decimal::from(7));

    // Increase the line: only the difference is deducted.
    let response = client
        .put(format!("{base}/orders/{order_id}"))
        .json(&json!({
            "lines": [{ "id": line_id, "product_id": product_id, "quantity": 5 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited: Value = response.json().await.unwrap();
    assert_eq!(dec(&edited["total"]), Decimal::from(25));

    let response = client
        .get(format!("{base}/inventories/{inventory_id}"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(dec(&body["stock"]), Decimal::from(5));

    // Unchanged resubmission moves nothing.
    let response = client
        .put(format!("{base}/orders/{order_id}"))
        .json(&json!({
            "lines": [{ "id": line_id, "product_id": product_id, "quantity": 5 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .get(format!("{base}/inventories/{inventory_id}"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(dec(&body["stock"]), Decimal::from(5));

    // Status transitions respect the guard.
    let response = client
        .post(format!("{base}/orders/{order_id}/status"))
        .json(&json!({ "status": "paid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .post(format!("{base}/orders/{order_id}/status"))
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn batch_production_flow_processes_partial_and_notifies() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let a = create_inventory(&client, base, "Ground coffee", "GC-001", 2, 10).await;
    let b = create_inventory(&client, base, "Bottles", "BT-001", 1, 20).await;
    let finished = create_inventory(&client, base, "Bottled cold brew", "CB-001", 9, 0).await;
    let a_id = a["id"].as_str().unwrap().to_string();
    let b_id = b["id"].as_str().unwrap().to_string();
    let finished_id = finished["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{base}/compositions"))
        .json(&json!({
            "name": "Cold brew run",
            "finished_good": finished_id,
            "labor_cost": 5,
            "yield_per_batch": 1,
            "items": [
                { "ingredient": a_id, "category": "base", "stock_used": 3 },
                { "ingredient": b_id, "category": "packaging", "stock_used": 4 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let composition: Value = response.json().await.unwrap();
    let composition_id = composition["id"].as_str().unwrap().to_string();

    // Non-positive request is rejected before any job is queued.
    let response = client
        .post(format!("{base}/compositions/{composition_id}/deploy"))
        .json(&json!({ "requested_batch": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Deploy 5 batches; only 3 are feasible.
    let response = client
        .post(format!("{base}/compositions/{composition_id}/deploy"))
        .json(&json!({ "requested_batch": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The background run appends exactly one batch record with the feasible
    // count, never the requested one.
    let runs = poll_until(
        &client,
        &format!("{base}/compositions/{composition_id}/batch-runs"),
        |body| body.as_array().is_some_and(|runs| !runs.is_empty()),
    )
    .await;
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["requested_batches"], 5);
    assert_eq!(runs[0]["processed_batches"], 3);

    // Stock after: A = 10 - 9, B = 20 - 12, finished good +3.
    for (id, expected) in [(&a_id, 1), (&b_id, 8), (&finished_id, 3)] {
        let response = client
            .get(format!("{base}/inventories/{id}"))
            .send()
            .await
            .unwrap();
        let body: Value = response.json().await.unwrap();
        assert_eq!(dec(&body["stock"]), Decimal::from(expected));
    }

    // Partial completion is reported through the notification feed.
    let notifications = poll_until(&client, &format!("{base}/notifications"), |body| {
        body.as_array().is_some_and(|list| {
            list.iter()
                .any(|n| n["title"] == "Production partially completed")
        })
    })
    .await;
    let summary = notifications
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["title"] == "Production partially completed")
        .unwrap()
        .clone();
    assert!(summary["description"]
        .as_str()
        .unwrap()
        .contains("3 of 5"));

    // The job reached success (the business shortfall is not a job failure).
    let jobs = poll_until(&client, &format!("{base}/system/jobs"), |body| {
        body["stats"]["success"].as_u64() == Some(1)
    })
    .await;
    assert_eq!(jobs["stats"]["failed"], 0);
}

#[tokio::test]
async fn export_flow_reaches_terminal_status() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    create_inventory(&client, base, "Beans", "BN-001", 2, 5).await;
    create_inventory(&client, base, "Cups", "CP-001", 1, 50).await;

    let response = client
        .post(format!("{base}/exports"))
        .json(&json!({ "kind": "inventories" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    let export_id = body["export"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["export"]["status"], "pending");

    let export = poll_until(&client, &format!("{base}/exports/{export_id}"), |body| {
        body["status"] == "success" || body["status"] == "failed"
    })
    .await;
    assert_eq!(export["status"], "success");
    assert_eq!(export["row_count"], 2);
    assert!(export["completed_at"].is_string());
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let missing = uuid::Uuid::now_v7();
    for url in [
        format!("{base}/inventories/{missing}"),
        format!("{base}/orders/{missing}"),
        format!("{base}/compositions/{missing}"),
        format!("{base}/exports/{missing}"),
    ] {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{url}");
    }

    let response = client
        .get(format!("{base}/inventories/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.get(format!("{base}/system/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
