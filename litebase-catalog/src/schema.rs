//! Column descriptors persisted in `_columns`, plus the source-dialect →
//! engine-dialect translation applied to column defaults before persistence.

use sqlx::{Row, SqlitePool};

use crate::error::CatalogError;
use crate::types::ColumnType;

/// Engine expression for a v4-shaped random UUID, parenthesised so it is
/// valid both as a column default and inline in a larger expression.
pub const ENGINE_UUID_EXPR: &str = "(lower(hex(randomblob(4))) || '-' || lower(hex(randomblob(2))) || '-4' || substr(lower(hex(randomblob(2))),2) || '-' || substr('89ab', abs(random()) % 4 + 1, 1) || substr(lower(hex(randomblob(2))),2) || '-' || lower(hex(randomblob(6))))";

/// Engine expression for the current UTC timestamp in the wire format.
pub const ENGINE_NOW_EXPR: &str = "(strftime('%Y-%m-%dT%H:%M:%fZ','now'))";

/// One `(table, column)` entry of the schema catalog.
///
/// `default_expr` holds the *engine* form; translation happens on
/// registration. `references` declares a foreign key used only for resource
/// embedding.
#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    pub table: String,
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default_expr: Option<String>,
    pub is_primary: bool,
    pub references: Option<(String, String)>,
}

/// Translate a source-dialect default expression to the engine dialect.
///
/// `gen_random_uuid()` and `now()` get engine equivalents, boolean literals
/// become `1`/`0` for boolean columns, anything else passes through verbatim.
pub fn translate_default(expr: &str, ty: ColumnType) -> String {
    let trimmed = expr.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "gen_random_uuid()" => ENGINE_UUID_EXPR.to_string(),
        "now()" => ENGINE_NOW_EXPR.to_string(),
        "true" if ty == ColumnType::Boolean => "1".to_string(),
        "false" if ty == ColumnType::Boolean => "0".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Persistent schema catalog over `_columns`.
#[derive(Clone)]
pub struct SchemaCatalog {
    pool: SqlitePool,
}

impl SchemaCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register (or replace) a column descriptor. The incoming default is in
    /// the source dialect; the stored form is the engine translation.
    pub async fn register_column(
        &self,
        mut desc: ColumnDescriptor,
    ) -> Result<(), CatalogError> {
        desc.default_expr = desc
            .default_expr
            .map(|expr| translate_default(&expr, desc.ty));
        let (ref_table, ref_column) = match &desc.references {
            Some((t, c)) => (Some(t.as_str()), Some(c.as_str())),
            None => (None, None),
        };
        sqlx::query(
            "INSERT OR REPLACE INTO _columns \
             (table_name, column_name, column_type, nullable, default_expr, is_primary, ref_table, ref_column) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&desc.table)
        .bind(&desc.name)
        .bind(desc.ty.format())
        .bind(desc.nullable)
        .bind(&desc.default_expr)
        .bind(desc.is_primary)
        .bind(ref_table)
        .bind(ref_column)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Descriptors for one table, in registration order. Empty means the
    /// table is not exposed through the REST surface.
    pub async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        let rows = sqlx::query(
            "SELECT table_name, column_name, column_type, nullable, default_expr, is_primary, ref_table, ref_column \
             FROM _columns WHERE table_name = ? ORDER BY rowid",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(descriptor_from_row).collect()
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let rows =
            sqlx::query("SELECT DISTINCT table_name FROM _columns ORDER BY table_name")
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(Into::into))
            .collect()
    }

    /// Remove every descriptor of a table. Separate from dropping the
    /// physical table; readers treat the descriptor-less state as "table not
    /// exposed".
    pub async fn delete_table_columns(&self, table: &str) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM _columns WHERE table_name = ?")
            .bind(table)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub(crate) fn descriptor_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ColumnDescriptor, CatalogError> {
    let ty_decl: String = row.try_get("column_type")?;
    let ty = ColumnType::parse(&ty_decl)?;
    let ref_table: Option<String> = row.try_get("ref_table")?;
    let ref_column: Option<String> = row.try_get("ref_column")?;
    Ok(ColumnDescriptor {
        table: row.try_get("table_name")?,
        name: row.try_get("column_name")?,
        ty,
        nullable: row.try_get("nullable")?,
        default_expr: row.try_get("default_expr")?,
        is_primary: row.try_get("is_primary")?,
        references: ref_table.zip(ref_column),
    })
}
