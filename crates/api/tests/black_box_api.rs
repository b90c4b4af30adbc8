use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use workshop_api::app::{build_app, services::AppServices};
use workshop_auth::{JwtClaims, Role};
use workshop_core::{TenantId, UserId};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = AppServices::start().expect("failed to start services");
        let app = build_app(SECRET, services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// POST that must succeed; returns the new record id.
    async fn create(&self, token: &str, path: &str, body: Value) -> String {
        let res = self.post(token, path, body).await;
        let status = res.status();
        let body: Value = res.json().await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "POST {path}: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Read models are updated by a background worker; poll until `ready`.
    async fn get_eventually(&self, token: &str, path: &str, ready: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..100 {
            let res = self.get(token, path).await;
            if res.status() == StatusCode::OK {
                let body: Value = res.json().await.unwrap();
                if ready(&body) {
                    return body;
                }
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        panic!("GET {path} did not reach the expected state in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, role: &'static str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles: vec![Role::new(role)],
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Category, location and an item with `quantity` units on hand.
async fn seed_item(srv: &TestServer, token: &str, code: &str, quantity: i64) -> String {
    let category = srv
        .create(token, "/inventory/categories", json!({ "name": format!("Cat {code}") }))
        .await;
    let location = srv
        .create(token, "/inventory/locations", json!({ "name": format!("Shelf {code}") }))
        .await;
    srv.create(
        token,
        "/inventory/items",
        json!({
            "code": code,
            "name": "Bearing 6204",
            "category_id": category,
            "location_id": location,
            "quantity": quantity,
            "purchase_price": "8.00",
            "sale_price": "12.50",
        }),
    )
    .await
}

async fn seed_order(srv: &TestServer, token: &str, number: &str) -> String {
    let client = srv.create(token, "/clients", json!({ "name": "Talleres Rivera" })).await;
    let machine_type = srv.create(token, "/machine-types", json!({ "name": "Chainsaw" })).await;
    srv.create(
        token,
        "/work-orders",
        json!({
            "order_number": number,
            "client_id": client,
            "machine_type_id": machine_type,
            "intake_reason": "Does not start",
        }),
    )
    .await
}

#[tokio::test]
async fn protected_endpoints_require_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(format!("{}/whoami", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, "administrator");

    let res = srv.get(&token, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "administrator"));
}

#[tokio::test]
async fn new_user_gets_a_worker_profile() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "administrator");

    let user_id = srv
        .create(&token, "/users", json!({ "username": "mlopez", "first_name": "Marta", "last_name": "Lopez" }))
        .await;

    let user = srv
        .get_eventually(&token, &format!("/users/{user_id}"), |u| u["role"].is_string())
        .await;
    assert_eq!(user["role"], "worker");
    assert_eq!(user["username"], "mlopez");
    assert_eq!(user["active"], true);

    let res = srv.post(&token, "/users", json!({ "username": "MLOPEZ" })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn explicit_role_and_profile_changes_apply_to_a_registered_user() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "administrator");

    let user_id = srv
        .create(&token, "/users", json!({ "username": "jperez", "role": "technician", "phone": "+56 9 8765 4321" }))
        .await;
    let user = srv
        .get_eventually(&token, &format!("/users/{user_id}"), |u| {
            u["role"] == "technician" && u["phone"].is_string()
        })
        .await;
    assert_eq!(user["phone"], "+56 9 8765 4321");

    let res = srv
        .post(&token, &format!("/users/{user_id}/role"), json!({ "role": "administrator" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.post(&token, &format!("/users/{user_id}/deactivate"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    let user = srv
        .get_eventually(&token, &format!("/users/{user_id}"), |u| {
            u["role"] == "administrator" && u["active"] == false
        })
        .await;
    assert_eq!(user["username"], "jperez");
}

#[tokio::test]
async fn stock_movements_chain_on_the_item() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "worker");
    let item = seed_item(&srv, &token, "ROD-001", 10).await;

    let res = srv
        .post(
            &token,
            &format!("/inventory/items/{item}/movements"),
            json!({ "kind": "outbound", "quantity": 3, "reason": "Bench use" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = srv
        .get_eventually(&token, &format!("/inventory/items/{item}"), |i| i["quantity"] == 7)
        .await;
    assert_eq!(body["code"], "ROD-001");

    let movements = srv
        .get_eventually(&token, &format!("/inventory/items/{item}/movements"), |p| p["total"] == 2)
        .await;
    let items = movements["items"].as_array().unwrap();
    // Newest first: the outbound movement chains on the opening stock.
    assert_eq!(items[0]["kind"], "outbound");
    assert_eq!(items[0]["previous_stock"], 10);
    assert_eq!(items[0]["new_stock"], 7);
    assert_eq!(items[1]["reason"], "Initial stock");
}

#[tokio::test]
async fn outbound_beyond_stock_is_rejected() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "worker");
    let item = seed_item(&srv, &token, "ROD-002", 2).await;

    let res = srv
        .post(
            &token,
            &format!("/inventory/items/{item}/movements"),
            json!({ "kind": "outbound", "quantity": 5, "reason": "Too many" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv
        .post(
            &token,
            &format!("/inventory/items/{item}/movements"),
            json!({ "kind": "teleport", "quantity": 1, "reason": "?" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = srv
        .post(
            &token,
            &format!("/inventory/items/{item}/movements"),
            json!({ "kind": "inbound", "quantity": i64::MAX, "reason": "Pallet" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let movements = srv
        .get_eventually(&token, &format!("/inventory/items/{item}/movements"), |p| p["total"] == 1)
        .await;
    assert_eq!(movements["items"][0]["new_stock"], 2);
}

#[tokio::test]
async fn duplicate_item_code_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "worker");
    let first = seed_item(&srv, &token, "DUP-1", 0).await;
    let body = srv.get_eventually(&token, &format!("/inventory/items/{first}"), |_| true).await;

    let res = srv
        .post(
            &token,
            "/inventory/items",
            json!({
                "code": "dup-1",
                "name": "Other",
                "category_id": body["category_id"],
                "location_id": body["location_id"],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_work_order_status_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "worker");
    let order = seed_order(&srv, &token, "1001").await;

    let res = srv
        .post(&token, &format!("/work-orders/{order}/status"), json!({ "status": "lost" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Skipping a step is an invariant violation, the next step is fine.
    let res = srv
        .post(&token, &format!("/work-orders/{order}/status"), json!({ "status": "in_progress" }))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv
        .post(&token, &format!("/work-orders/{order}/status"), json!({ "status": "quote" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    srv.get_eventually(&token, &format!("/work-orders/{order}"), |o| o["status"] == "quote")
        .await;
}

#[tokio::test]
async fn technicians_cannot_write_clients() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "technician");

    let res = srv.post(&token, "/clients", json!({ "name": "Nope" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.get(&token, "/clients").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn records_are_invisible_to_other_tenants() {
    let srv = TestServer::spawn().await;
    let token_a = mint_jwt(TenantId::new(), "worker");
    let token_b = mint_jwt(TenantId::new(), "worker");
    let item = seed_item(&srv, &token_a, "ISO-1", 1).await;

    srv.get_eventually(&token_a, &format!("/inventory/items/{item}"), |_| true).await;

    let res = srv.get(&token_b, &format!("/inventory/items/{item}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // The same code is free in another tenant.
    seed_item(&srv, &token_b, "ISO-1", 1).await;
}

#[tokio::test]
async fn consuming_a_part_moves_stock_and_prices_the_line() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "worker");
    let item = seed_item(&srv, &token, "PART-9", 5).await;
    let order = seed_order(&srv, &token, "2001").await;

    let res = srv
        .post(&token, &format!("/work-orders/{order}/parts"), json!({ "item_id": item, "quantity": 2 }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["line_no"], 1);
    assert_eq!(body["remaining_stock"], 3);
    assert_eq!(body["subtotal"].as_str().unwrap().parse::<f64>().unwrap(), 25.0);

    srv.get_eventually(&token, &format!("/inventory/items/{item}"), |i| i["quantity"] == 3)
        .await;
    let order = srv
        .get_eventually(&token, &format!("/work-orders/{order}"), |o| {
            o["used_parts"].as_array().is_some_and(|p| p.len() == 1)
        })
        .await;
    assert_eq!(order["used_parts"][0]["quantity"], 2);
}

#[tokio::test]
async fn visit_spawns_exactly_one_work_order() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "administrator");

    let technician = srv
        .create(&token, "/users", json!({ "username": "tech1", "role": "technician" }))
        .await;
    let client = srv.create(&token, "/clients", json!({ "name": "Finca Norte" })).await;
    let machine_type = srv.create(&token, "/machine-types", json!({ "name": "Brush cutter" })).await;

    let visit = srv
        .create(
            &token,
            "/visits",
            json!({
                "client_id": client,
                "machine_type_id": machine_type,
                "visit_at": (Utc::now() + ChronoDuration::days(1)).to_rfc3339(),
                "address": "Camino Viejo 12",
                "problem_description": "Loses power under load",
                "technician": technician,
            }),
        )
        .await;

    let order = srv
        .create(&token, &format!("/visits/{visit}/spawn-order"), json!({ "order_number": "3001" }))
        .await;

    let body = srv
        .get_eventually(&token, &format!("/visits/{visit}"), |v| {
            v["generated_order"].is_string() && v["status"] == "moved_to_workshop"
        })
        .await;
    assert_eq!(body["generated_order"].as_str().unwrap(), order);

    let res = srv
        .post(&token, &format!("/visits/{visit}/spawn-order"), json!({ "order_number": "3002" }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
