//! RPC function declarations persisted in `_functions`: a parameter list
//! typed against the type catalog plus a single SQL statement body.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::CatalogError;
use crate::types::ColumnType;

/// One declared function argument.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FunctionParam {
    pub fn column_type(&self) -> Result<ColumnType, CatalogError> {
        ColumnType::parse(&self.ty).map_err(Into::into)
    }
}

/// A callable function: `POST /rest/v1/rpc/{name}`.
#[derive(Clone, Debug)]
pub struct RpcFunction {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub body: String,
}

/// Persistent function catalog.
#[derive(Clone)]
pub struct FunctionCatalog {
    pool: SqlitePool,
}

impl FunctionCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register_function(&self, function: RpcFunction) -> Result<(), CatalogError> {
        if function.name.is_empty() {
            return Err(CatalogError::InvalidFunction("function name is empty".into()));
        }
        if function.body.trim().is_empty() {
            return Err(CatalogError::InvalidFunction("function body is empty".into()));
        }
        // Reject undeclarable parameter types before anything is persisted.
        for param in &function.params {
            param.column_type()?;
        }
        let params = serde_json::to_string(&function.params)
            .map_err(|e| CatalogError::InvalidFunction(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO _functions (function_name, params, body) VALUES (?, ?, ?)",
        )
        .bind(&function.name)
        .bind(params)
        .bind(&function.body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_function(&self, name: &str) -> Result<Option<RpcFunction>, CatalogError> {
        let row = sqlx::query(
            "SELECT function_name, params, body FROM _functions WHERE function_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(function_from_row).transpose()
    }

    pub async fn delete_function(&self, name: &str) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM _functions WHERE function_name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub(crate) fn function_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RpcFunction, CatalogError> {
    let params_json: String = row.try_get("params")?;
    let params: Vec<FunctionParam> = serde_json::from_str(&params_json)
        .map_err(|e| CatalogError::InvalidFunction(format!("stored params corrupt: {e}")))?;
    Ok(RpcFunction {
        name: row.try_get("function_name")?,
        params,
        body: row.try_get("body")?,
    })
}
