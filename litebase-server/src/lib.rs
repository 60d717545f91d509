//! # litebase-server — the single binary
//!
//! Owns everything the core subsystems deliberately do not: the listener,
//! the middleware stack, store bootstrap, and the administrative surface
//! that writes the catalogs the request pipeline reads.

pub mod admin;

use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use litebase_catalog::{ensure_metadata_tables, CatalogCache};
use litebase_core::AppConfig;
use litebase_rest::AppState;
use litebase_security::TokenVerifier;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber with a standard `fmt` layer.
///
/// Respects `RUST_LOG`; falls back to `info,tower_http=debug`. Call once at
/// the very start of `main`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".parse().unwrap()),
        )
        .init();
}

/// Open the store, run metadata bootstrap, and assemble the shared state.
pub async fn build_state(config: &AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await?;
    ensure_metadata_tables(&pool).await?;
    Ok(AppState::new(
        pool.clone(),
        Arc::new(CatalogCache::new(pool)),
        Arc::new(TokenVerifier::new(config.auth.jwt_secret.as_bytes())),
        config.rest.max_rows,
    ))
}

/// The full application router: REST surface, admin surface, health, and the
/// standard middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(litebase_rest::router(state.clone()))
        .merge(admin::router(state))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::custom(
            panic_handler as fn(_) -> axum::response::Response,
        ))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn panic_handler(_err: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    let body = serde_json::json!({
        "code": "server_error",
        "message": "internal server error",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
