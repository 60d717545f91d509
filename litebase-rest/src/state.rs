use std::sync::Arc;

use litebase_catalog::CatalogCache;
use litebase_core::{ApiError, ApiResult};
use litebase_security::TokenVerifier;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

/// Shared state behind every REST handler.
///
/// Everything here is read-mostly: the pool and verifier are immutable, and
/// the catalog cache manages its own snapshot swapping.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub catalog: Arc<CatalogCache>,
    pub verifier: Arc<TokenVerifier>,
    /// Row cap applied when the client sends no limit or range.
    pub max_rows: u32,
    /// Cancelled on shutdown; checked at every suspension point.
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        catalog: Arc<CatalogCache>,
        verifier: Arc<TokenVerifier>,
        max_rows: u32,
    ) -> Self {
        Self {
            pool,
            catalog,
            verifier,
            max_rows,
            cancel: CancellationToken::new(),
        }
    }

    /// Fail fast once shutdown has been requested; no statement is issued
    /// past this point and the enclosing transaction rolls back on drop.
    pub fn ensure_live(&self) -> ApiResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Engine("server is shutting down".into()));
        }
        Ok(())
    }
}
