use litebase_core::{ApiError, EngineErrorExt};

use crate::types::TypeError;

/// Catalog-layer failures: store faults plus invariant violations caught
/// before anything is persisted.
#[derive(Debug)]
pub enum CatalogError {
    Engine(sqlx::Error),
    InvalidType(String),
    InvalidPolicy(String),
    InvalidFunction(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Engine(err) => write!(f, "catalog store error: {err}"),
            CatalogError::InvalidType(msg) => write!(f, "invalid type: {msg}"),
            CatalogError::InvalidPolicy(msg) => write!(f, "invalid policy: {msg}"),
            CatalogError::InvalidFunction(msg) => write!(f, "invalid function: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Engine(err)
    }
}

impl From<TypeError> for CatalogError {
    fn from(err: TypeError) -> Self {
        CatalogError::InvalidType(err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Engine(inner) => inner.into_api_error(),
            CatalogError::InvalidType(msg)
            | CatalogError::InvalidPolicy(msg)
            | CatalogError::InvalidFunction(msg) => ApiError::validation(msg),
        }
    }
}
