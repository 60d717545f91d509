//! End-to-end tests across the admin and REST surfaces.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use litebase_catalog::{ensure_metadata_tables, CatalogCache};
use litebase_rest::AppState;
use litebase_security::TokenVerifier;
use litebase_server::build_router;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

const SECRET: &[u8] = b"an-admin-test-secret-of-32-bytes!";

fn token(sub: &str, role: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    let claims = json!({ "sub": sub, "role": role, "exp": exp });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

async fn app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ensure_metadata_tables(&pool).await.unwrap();
    let state = AppState::new(
        pool.clone(),
        Arc::new(CatalogCache::new(pool)),
        Arc::new(TokenVerifier::new(SECRET)),
        1000,
    );
    build_router(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

fn todos_table() -> Value {
    json!({
        "name": "todos",
        "columns": [
            { "name": "id", "type": "uuid", "primary": true, "nullable": false,
              "default": "gen_random_uuid()" },
            { "name": "created_at", "type": "timestamptz", "nullable": false,
              "default": "now()" },
            { "name": "body", "type": "text" }
        ]
    })
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = app().await;
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn admin_surface_requires_the_service_role() {
    let app = app().await;
    let user = token("u-1", "authenticated");

    let (status, body) = send(
        &app,
        request("POST", "/admin/v1/tables", None, Some(todos_table())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "insufficient_privilege");

    let (status, _) = send(
        &app,
        request("POST", "/admin/v1/tables", Some(&user), Some(todos_table())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn created_tables_serve_rest_traffic_with_engine_defaults() {
    let app = app().await;
    let service = token("", "service_role");

    let (status, _) = send(
        &app,
        request("POST", "/admin/v1/tables", Some(&service), Some(todos_table())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Missing columns fill from the translated engine defaults.
    let (status, _) = send(
        &app,
        request("POST", "/rest/v1/todos", None, Some(json!({ "body": "hello" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, request("GET", "/rest/v1/todos", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let row = &body.as_array().unwrap()[0];
    assert_eq!(row["body"], "hello");
    let id = row["id"].as_str().unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(id.matches('-').count(), 4);
    assert!(row["created_at"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn duplicate_table_creation_conflicts() {
    let app = app().await;
    let service = token("", "service_role");
    send(
        &app,
        request("POST", "/admin/v1/tables", Some(&service), Some(todos_table())),
    )
    .await;
    let (status, body) = send(
        &app,
        request("POST", "/admin/v1/tables", Some(&service), Some(todos_table())),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn rls_and_policies_flow_through_the_admin_surface() {
    let app = app().await;
    let service = token("", "service_role");
    let user_a = "33333333-3333-4333-8333-333333333333";
    let user_b = "44444444-4444-4444-8444-444444444444";

    send(
        &app,
        request(
            "POST",
            "/admin/v1/tables",
            Some(&service),
            Some(json!({
                "name": "notes",
                "columns": [
                    { "name": "id", "type": "integer", "primary": true },
                    { "name": "user_id", "type": "uuid" },
                    { "name": "body", "type": "text" }
                ]
            })),
        ),
    )
    .await;
    send(
        &app,
        request(
            "POST",
            "/admin/v1/rls",
            Some(&service),
            Some(json!({ "table": "notes", "enabled": true })),
        ),
    )
    .await;
    for (name, command, using, check) in [
        ("select_own", "SELECT", Some("user_id = auth.uid()"), None),
        ("insert_own", "INSERT", None, Some("user_id = auth.uid()")),
    ] {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/admin/v1/policies",
                Some(&service),
                Some(json!({
                    "table": "notes", "name": name, "command": command,
                    "using": using, "check": check
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let a = token(user_a, "authenticated");
    let b = token(user_b, "authenticated");
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            Some(json!({ "id": 1, "user_id": user_a, "body": "mine" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, request("GET", "/rest/v1/notes", Some(&b), None)).await;
    assert_eq!(body, json!([]));
    let (_, body) = send(&app, request("GET", "/rest/v1/notes", Some(&a), None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    // B cannot forge a row for A.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/rest/v1/notes",
            Some(&b),
            Some(json!({ "id": 2, "user_id": user_a, "body": "forged" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "check_violation");
}

#[tokio::test]
async fn functions_register_and_dispatch() {
    let app = app().await;
    let service = token("", "service_role");
    send(
        &app,
        request(
            "POST",
            "/admin/v1/tables",
            Some(&service),
            Some(json!({
                "name": "items",
                "columns": [
                    { "name": "id", "type": "integer", "primary": true },
                    { "name": "qty", "type": "integer" }
                ]
            })),
        ),
    )
    .await;
    send(
        &app,
        request("POST", "/rest/v1/items", None, Some(json!([
            { "id": 1, "qty": 2 }, { "id": 2, "qty": 9 }
        ]))),
    )
    .await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/admin/v1/functions",
            Some(&service),
            Some(json!({
                "name": "items_over",
                "params": [ { "name": "threshold", "type": "integer", "required": true } ],
                "body": "SELECT id, qty FROM items WHERE qty > threshold ORDER BY id"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/rest/v1/rpc/items_over",
            None,
            Some(json!({ "threshold": 5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": 2, "qty": 9 }]));
}

#[tokio::test]
async fn dropped_tables_disappear_from_the_rest_surface() {
    let app = app().await;
    let service = token("", "service_role");
    send(
        &app,
        request("POST", "/admin/v1/tables", Some(&service), Some(todos_table())),
    )
    .await;

    let (status, _) = send(
        &app,
        request("DELETE", "/admin/v1/tables/todos", Some(&service), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, request("GET", "/rest/v1/todos", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}
