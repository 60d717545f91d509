//! Process-local catalog cache.
//!
//! Writers (the admin surface) bump a monotonic generation counter after any
//! catalog write; readers snapshot the counter at request start and reload
//! the whole catalog only when their cached snapshot is stale. Steady-state
//! reads are a counter load plus an `Arc` clone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CatalogError;
use crate::functions::{function_from_row, RpcFunction};
use crate::policy::{policy_from_row, Policy, PolicyCommand};
use crate::schema::{descriptor_from_row, ColumnDescriptor};

/// Immutable view of every catalog at one generation.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    generation: u64,
    tables: HashMap<String, Vec<ColumnDescriptor>>,
    rls: HashMap<String, bool>,
    policies: HashMap<(String, PolicyCommand), Vec<Policy>>,
    functions: HashMap<String, RpcFunction>,
}

impl CatalogSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Column descriptors for an exposed table; `None` when the table has no
    /// descriptors and is therefore invisible to the REST surface.
    pub fn table(&self, name: &str) -> Option<&[ColumnDescriptor]> {
        self.tables.get(name).map(|cols| cols.as_slice())
    }

    pub fn rls_enabled(&self, table: &str) -> bool {
        self.rls.get(table).copied().unwrap_or(false)
    }

    pub fn policies(&self, table: &str, command: PolicyCommand) -> &[Policy] {
        self.policies
            .get(&(table.to_string(), command))
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn function(&self, name: &str) -> Option<&RpcFunction> {
        self.functions.get(name)
    }

    /// The column of `from` that references `to`, if one is declared.
    pub fn reference(&self, from: &str, to: &str) -> Option<&ColumnDescriptor> {
        self.table(from)?
            .iter()
            .find(|col| matches!(&col.references, Some((t, _)) if t == to))
    }
}

/// Generation-stamped cache in front of the persistent catalogs.
pub struct CatalogCache {
    pool: SqlitePool,
    generation: AtomicU64,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            generation: AtomicU64::new(1),
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    /// Invalidate readers after a catalog write.
    pub fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Current snapshot, reloading from the store when stale.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let generation = self.generation.load(Ordering::Acquire);
        {
            let cached = self.snapshot.read().await;
            if cached.generation == generation {
                return Ok(cached.clone());
            }
        }

        let rebuilt = Arc::new(self.load(generation).await?);
        let mut cached = self.snapshot.write().await;
        // Another reader may have reloaded at an even newer generation while
        // we were loading; never move the cache backwards.
        if cached.generation < rebuilt.generation {
            *cached = rebuilt.clone();
        }
        debug!(generation, "catalog snapshot reloaded");
        Ok(rebuilt)
    }

    async fn load(&self, generation: u64) -> Result<CatalogSnapshot, CatalogError> {
        let mut snapshot = CatalogSnapshot {
            generation,
            ..CatalogSnapshot::default()
        };

        let rows = sqlx::query(
            "SELECT table_name, column_name, column_type, nullable, default_expr, is_primary, ref_table, ref_column \
             FROM _columns ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let desc = descriptor_from_row(row)?;
            snapshot
                .tables
                .entry(desc.table.clone())
                .or_default()
                .push(desc);
        }

        let rows = sqlx::query("SELECT table_name, enabled FROM _rls_tables")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            snapshot
                .rls
                .insert(row.try_get("table_name")?, row.try_get("enabled")?);
        }

        let rows = sqlx::query(
            "SELECT table_name, policy_name, command, using_expr, check_expr \
             FROM _rls_policies ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let policy = policy_from_row(row)?;
            snapshot
                .policies
                .entry((policy.table.clone(), policy.command))
                .or_default()
                .push(policy);
        }

        let rows = sqlx::query("SELECT function_name, params, body FROM _functions")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let function = function_from_row(row)?;
            snapshot.functions.insert(function.name.clone(), function);
        }

        Ok(snapshot)
    }
}
