//! End-to-end tests over the REST router with an in-memory store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use litebase_catalog::{
    ensure_metadata_tables, CatalogCache, ColumnDescriptor, ColumnType, FunctionCatalog,
    FunctionParam, Policy, PolicyCatalog, PolicyCommand, RpcFunction, SchemaCatalog,
};
use litebase_rest::{router, AppState};
use litebase_security::TokenVerifier;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
const USER_A: &str = "11111111-1111-4111-8111-111111111111";
const USER_B: &str = "22222222-2222-4222-8222-222222222222";

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

fn column(table: &str, name: &str, ty: ColumnType) -> ColumnDescriptor {
    ColumnDescriptor {
        table: table.into(),
        name: name.into(),
        ty,
        nullable: true,
        default_expr: None,
        is_primary: false,
        references: None,
    }
}

async fn test_app() -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ensure_metadata_tables(&pool).await.unwrap();

    sqlx::query(
        "CREATE TABLE todos (id INTEGER PRIMARY KEY, completed INTEGER NOT NULL DEFAULT 0, body TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id TEXT, body TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE products (id TEXT PRIMARY KEY, stock INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, label TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE order_items (id INTEGER PRIMARY KEY, order_id INTEGER, qty INTEGER)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let schema = SchemaCatalog::new(pool.clone());
    schema
        .register_column(ColumnDescriptor {
            is_primary: true,
            ..column("todos", "id", ColumnType::Integer)
        })
        .await
        .unwrap();
    schema
        .register_column(ColumnDescriptor {
            nullable: false,
            ..column("todos", "completed", ColumnType::Boolean)
        })
        .await
        .unwrap();
    schema
        .register_column(column("todos", "body", ColumnType::Text))
        .await
        .unwrap();

    schema
        .register_column(ColumnDescriptor {
            is_primary: true,
            ..column("notes", "id", ColumnType::Integer)
        })
        .await
        .unwrap();
    schema
        .register_column(column("notes", "user_id", ColumnType::Uuid))
        .await
        .unwrap();
    schema
        .register_column(column("notes", "body", ColumnType::Text))
        .await
        .unwrap();

    schema
        .register_column(ColumnDescriptor {
            is_primary: true,
            ..column("products", "id", ColumnType::Text)
        })
        .await
        .unwrap();
    schema
        .register_column(column("products", "stock", ColumnType::Integer))
        .await
        .unwrap();

    schema
        .register_column(ColumnDescriptor {
            is_primary: true,
            ..column("orders", "id", ColumnType::Integer)
        })
        .await
        .unwrap();
    schema
        .register_column(column("orders", "label", ColumnType::Text))
        .await
        .unwrap();
    schema
        .register_column(ColumnDescriptor {
            is_primary: true,
            ..column("order_items", "id", ColumnType::Integer)
        })
        .await
        .unwrap();
    schema
        .register_column(ColumnDescriptor {
            references: Some(("orders".into(), "id".into())),
            ..column("order_items", "order_id", ColumnType::Integer)
        })
        .await
        .unwrap();
    schema
        .register_column(column("order_items", "qty", ColumnType::Integer))
        .await
        .unwrap();

    let policies = PolicyCatalog::new(pool.clone());
    policies.set_rls("notes", true).await.unwrap();
    policies
        .add_policy(Policy {
            table: "notes".into(),
            name: "select_own".into(),
            command: PolicyCommand::Select,
            using_expr: Some("user_id = auth.uid()".into()),
            check_expr: None,
        })
        .await
        .unwrap();
    policies
        .add_policy(Policy {
            table: "notes".into(),
            name: "insert_own".into(),
            command: PolicyCommand::Insert,
            using_expr: None,
            check_expr: Some("user_id = auth.uid()".into()),
        })
        .await
        .unwrap();
    policies
        .add_policy(Policy {
            table: "notes".into(),
            name: "update_own".into(),
            command: PolicyCommand::Update,
            using_expr: Some("user_id = auth.uid()".into()),
            check_expr: Some("user_id = auth.uid()".into()),
        })
        .await
        .unwrap();
    policies
        .add_policy(Policy {
            table: "notes".into(),
            name: "delete_own".into(),
            command: PolicyCommand::Delete,
            using_expr: Some("user_id = auth.uid()".into()),
            check_expr: None,
        })
        .await
        .unwrap();

    let functions = FunctionCatalog::new(pool.clone());
    functions
        .register_function(RpcFunction {
            name: "get_user_by_id".into(),
            params: vec![FunctionParam {
                name: "p_user_id".into(),
                ty: "uuid".into(),
                required: true,
            }],
            body: "SELECT id, body FROM notes WHERE user_id = p_user_id".into(),
        })
        .await
        .unwrap();

    let state = AppState::new(
        pool.clone(),
        Arc::new(CatalogCache::new(pool.clone())),
        Arc::new(TokenVerifier::new(SECRET)),
        1000,
    );
    (router(state), pool)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .unwrap()
}

fn write_req(method: &str, uri: &str, bearer: Option<&str>, prefer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    if let Some(prefer) = prefer {
        builder = builder.header("prefer", prefer);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn seed_todos(pool: &SqlitePool) {
    for (id, completed, body) in [(1, 0, "walk"), (2, 1, "shop"), (3, 1, "code")] {
        sqlx::query("INSERT INTO todos (id, completed, body) VALUES (?, ?, ?)")
            .bind(id)
            .bind(completed)
            .bind(body)
            .execute(pool)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn anon_select_on_rls_off_table_returns_all_rows() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;

    let (status, headers, body) = send(&app, get("/rest/v1/todos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(headers[header::CONTENT_RANGE], "0-2/*");
}

#[tokio::test]
async fn unknown_table_is_404() {
    let (app, _pool) = test_app().await;
    let (status, _, body) = send(&app, get("/rest/v1/ghosts")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn filters_order_and_limit_apply() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;

    let (status, _, body) = send(
        &app,
        get("/rest/v1/todos?completed=eq.1&order=id.desc&limit=2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 3);
    assert_eq!(rows[1]["id"], 2);
    assert_eq!(rows[0]["completed"], json!(true));
}

#[tokio::test]
async fn select_list_fixes_key_order_and_aliases() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;

    let (_, _, body) = send(&app, get("/rest/v1/todos?select=body,done:completed,id&limit=1")).await;
    let row = &body.as_array().unwrap()[0];
    let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["body", "done", "id"]);
}

#[tokio::test]
async fn unknown_filter_column_is_validation_failed() {
    let (app, _pool) = test_app().await;
    let (status, _, body) = send(&app, get("/rest/v1/todos?missing=eq.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
}

#[tokio::test]
async fn empty_in_list_yields_zero_rows() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;
    let (status, _, body) = send(&app, get("/rest/v1/todos?id=in.()")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn range_header_paginates_with_partial_content() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;

    let req = Request::builder()
        .uri("/rest/v1/todos?order=id.asc")
        .header("range", "0-0")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(headers[header::CONTENT_RANGE], "0-0/3");
}

#[tokio::test]
async fn count_prefer_reports_total() {
    let (app, pool) = test_app().await;
    seed_todos(&pool).await;

    let req = Request::builder()
        .uri("/rest/v1/todos?completed=eq.1")
        .header("prefer", "count=exact")
        .body(Body::empty())
        .unwrap();
    let (_, headers, body) = send(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(headers[header::CONTENT_RANGE], "0-1/2");
}

#[tokio::test]
async fn users_only_see_their_own_notes() {
    let (app, _pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    let b = token(USER_B, "authenticated");

    let (status, _, _) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "private thought" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, body) = send(&app, get_as("/rest/v1/notes", &b)).await;
    assert_eq!(body, json!([]));

    let (_, _, body) = send(&app, get_as("/rest/v1/notes", &a)).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["body"], "private thought");
    assert_eq!(rows[0]["user_id"], USER_A);
}

#[tokio::test]
async fn anon_reads_on_rls_table_are_empty_not_errors() {
    let (app, _pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "x" }),
        ),
    )
    .await;

    let (status, _, body) = send(&app, get("/rest/v1/notes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn insert_violating_check_rolls_back_entirely() {
    let (app, pool) = test_app().await;
    let b = token(USER_B, "authenticated");

    // Second row impersonates user A; the whole request must fail.
    let (status, _, body) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&b),
            None,
            json!([
                { "user_id": USER_B, "body": "mine" },
                { "user_id": USER_A, "body": "forged" }
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "check_violation");

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn service_role_bypasses_rls() {
    let (app, _pool) = test_app().await;
    let service = token("", "service_role");
    let a = token(USER_A, "authenticated");

    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "secret" }),
        ),
    )
    .await;

    let (status, _, body) = send(&app, get_as("/rest/v1/notes", &service)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn patch_denied_by_rls_updates_zero_rows_silently() {
    let (app, pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    let b = token(USER_B, "authenticated");

    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "original" }),
        ),
    )
    .await;

    let uri = format!("/rest/v1/notes?user_id=eq.{USER_A}");
    let (status, _, _) = send(
        &app,
        write_req("PATCH", &uri, Some(&b), None, json!({ "body": "hacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let body: String = sqlx::query_scalar("SELECT body FROM notes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(body, "original");
}

#[tokio::test]
async fn patch_with_representation_returns_updated_rows() {
    let (app, _pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "before" }),
        ),
    )
    .await;

    let uri = format!("/rest/v1/notes?user_id=eq.{USER_A}");
    let (status, _, body) = send(
        &app,
        write_req(
            "PATCH",
            &uri,
            Some(&a),
            Some("return=representation"),
            json!({ "body": "after" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap()[0]["body"], "after");
}

#[tokio::test]
async fn delete_respects_rls_scope() {
    let (app, pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    let b = token(USER_B, "authenticated");

    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "keep me" }),
        ),
    )
    .await;

    let uri = format!("/rest/v1/notes?user_id=eq.{USER_A}");
    let (status, _, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {b}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn upsert_merges_on_primary_key() {
    let (app, _pool) = test_app().await;

    let (status, _, _) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/products",
            None,
            Some("resolution=merge-duplicates,return=representation"),
            json!({ "id": "p1", "stock": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/products",
            None,
            Some("resolution=merge-duplicates,return=representation"),
            json!({ "id": "p1", "stock": 7 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stock"], 7);

    let (_, _, all) = send(&app, get("/rest/v1/products")).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["stock"], 7);
}

#[tokio::test]
async fn plain_duplicate_insert_conflicts() {
    let (app, _pool) = test_app().await;
    send(
        &app,
        write_req("POST", "/rest/v1/products", None, None, json!({ "id": "p1", "stock": 1 })),
    )
    .await;
    let (status, _, body) = send(
        &app,
        write_req("POST", "/rest/v1/products", None, None, json!({ "id": "p1", "stock": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn single_insert_emits_location() {
    let (app, _pool) = test_app().await;
    let (status, headers, _) = send(
        &app,
        write_req("POST", "/rest/v1/products", None, None, json!({ "id": "p9", "stock": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::LOCATION], "/rest/v1/products?id=eq.p9");
}

#[tokio::test]
async fn type_validation_rejects_bad_values() {
    let (app, _pool) = test_app().await;
    let (status, _, body) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/products",
            None,
            None,
            json!({ "id": "p2", "stock": 2147483648i64 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let (app, _pool) = test_app().await;
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        - 600;
    let claims = json!({ "sub": USER_A, "role": "authenticated", "exp": exp });
    let stale = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    let (status, _, body) = send(&app, get_as("/rest/v1/todos", &stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_token");
}

#[tokio::test]
async fn embedding_follows_declared_foreign_keys() {
    let (app, pool) = test_app().await;
    sqlx::query("INSERT INTO orders (id, label) VALUES (1, 'first')")
        .execute(&pool)
        .await
        .unwrap();
    for (id, qty) in [(10, 2), (11, 5)] {
        sqlx::query("INSERT INTO order_items (id, order_id, qty) VALUES (?, 1, ?)")
            .bind(id)
            .bind(qty)
            .execute(&pool)
            .await
            .unwrap();
    }

    // Parent -> children renders an array.
    let (status, _, body) = send(&app, get("/rest/v1/orders?select=id,order_items(qty)")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["order_items"], json!([{ "qty": 2 }, { "qty": 5 }]));

    // Child -> parent renders an object.
    let (_, _, body) = send(&app, get("/rest/v1/order_items?select=qty,orders(label)")).await;
    assert_eq!(body[0]["orders"], json!({ "label": "first" }));

    // No declared key, no embed.
    let (status, _, body) = send(&app, get("/rest/v1/orders?select=id,products(stock)")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
}

#[tokio::test]
async fn typed_values_round_trip_through_post_and_get() {
    let (app, pool) = test_app().await;
    sqlx::query(
        "CREATE TABLE kitchen (id INTEGER PRIMARY KEY, amount TEXT, flag INTEGER, at TEXT, doc TEXT, raw BLOB, vec BLOB, ident TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    let schema = SchemaCatalog::new(pool.clone());
    for (name, ty) in [
        ("id", ColumnType::Integer),
        ("amount", ColumnType::Numeric),
        ("flag", ColumnType::Boolean),
        ("at", ColumnType::Timestamptz),
        ("doc", ColumnType::Jsonb),
        ("raw", ColumnType::Bytea),
        ("vec", ColumnType::Vector(2)),
        ("ident", ColumnType::Uuid),
    ] {
        schema
            .register_column(ColumnDescriptor {
                is_primary: name == "id",
                ..column("kitchen", name, ty)
            })
            .await
            .unwrap();
    }

    let row = json!({
        "id": 1,
        "amount": "12.50",
        "flag": true,
        "at": "2024-05-01T10:00:00Z",
        "doc": { "nested": [1, 2] },
        "raw": "aGVsbG8=",
        "vec": [0.5, -1.25],
        "ident": "550E8400-E29B-41D4-A716-446655440000"
    });
    let (status, _, _) = send(&app, write_req("POST", "/rest/v1/kitchen", None, None, row)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, body) = send(&app, get("/rest/v1/kitchen")).await;
    let row = &body.as_array().unwrap()[0];
    assert_eq!(row["amount"], json!(12.5));
    assert_eq!(row["flag"], json!(true));
    assert_eq!(row["at"], "2024-05-01T10:00:00Z");
    assert_eq!(row["doc"], json!({ "nested": [1, 2] }));
    assert_eq!(row["raw"], "aGVsbG8=");
    assert_eq!(row["vec"], json!([0.5, -1.25]));
    assert_eq!(row["ident"], "550e8400-e29b-41d4-a716-446655440000");
}

#[tokio::test]
async fn rpc_missing_required_argument_is_400() {
    let (app, _pool) = test_app().await;
    let (status, _, body) = send(
        &app,
        write_req("POST", "/rest/v1/rpc/get_user_by_id", None, None, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("missing required argument"));
}

#[tokio::test]
async fn rpc_unknown_function_uses_hosted_code() {
    let (app, _pool) = test_app().await;
    let (status, _, body) = send(
        &app,
        write_req("POST", "/rest/v1/rpc/nope", None, None, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PGRST202");
}

#[tokio::test]
async fn rpc_selects_return_rows() {
    let (app, _pool) = test_app().await;
    let a = token(USER_A, "authenticated");
    send(
        &app,
        write_req(
            "POST",
            "/rest/v1/notes",
            Some(&a),
            None,
            json!({ "user_id": USER_A, "body": "findable" }),
        ),
    )
    .await;

    let (status, _, body) = send(
        &app,
        write_req(
            "POST",
            "/rest/v1/rpc/get_user_by_id",
            None,
            None,
            json!({ "p_user_id": USER_A }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap()[0]["body"], "findable");
}
