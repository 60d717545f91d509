//! # litebase-catalog — type, schema, policy, and function catalogs
//!
//! The read-mostly metadata the request pipeline consumes:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Domain types, value validation/coercion, storage and wire encodings |
//! | [`schema`] | Column descriptors persisted in `_columns`, default-expression translation |
//! | [`policy`] | RLS table flags and policies (`_rls_tables`, `_rls_policies`) |
//! | [`functions`] | RPC function declarations (`_functions`) |
//! | [`cache`] | Generation-stamped process-local snapshot of all of the above |
//!
//! Catalog rows are written by administrative endpoints and treated as
//! read-only within a request; readers go through [`cache::CatalogCache`],
//! which reloads only when a writer has bumped the generation counter.

pub mod cache;
pub mod error;
pub mod functions;
pub mod policy;
pub mod schema;
pub mod types;

pub use cache::{CatalogCache, CatalogSnapshot};
pub use error::CatalogError;
pub use functions::{FunctionCatalog, FunctionParam, RpcFunction};
pub use policy::{Policy, PolicyCatalog, PolicyCommand};
pub use schema::{ColumnDescriptor, SchemaCatalog};
pub use types::{ColumnType, SqlValue, TypeError};

use sqlx::SqlitePool;

/// Create the metadata tables if they are missing. Called once at startup,
/// before anything reads the catalogs.
pub async fn ensure_metadata_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _columns (
            table_name  TEXT NOT NULL,
            column_name TEXT NOT NULL,
            column_type TEXT NOT NULL,
            nullable    INTEGER NOT NULL DEFAULT 1,
            default_expr TEXT,
            is_primary  INTEGER NOT NULL DEFAULT 0,
            ref_table   TEXT,
            ref_column  TEXT,
            PRIMARY KEY (table_name, column_name)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _rls_tables (
            table_name TEXT PRIMARY KEY,
            enabled    INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _rls_policies (
            table_name  TEXT NOT NULL,
            policy_name TEXT NOT NULL,
            command     TEXT NOT NULL,
            using_expr  TEXT,
            check_expr  TEXT,
            PRIMARY KEY (table_name, policy_name)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _functions (
            function_name TEXT PRIMARY KEY,
            params        TEXT NOT NULL,
            body          TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}
