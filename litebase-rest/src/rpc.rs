//! `POST /rest/v1/rpc/{function}` — declared functions over the store.
//!
//! Arguments arrive as a JSON object, are coerced against the declared
//! parameter types, and reach the stored body as bound parameters wherever
//! the body names them. A body whose first keyword is SELECT (or WITH)
//! returns rows; anything else executes for effect.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use litebase_catalog::SqlValue;
use litebase_core::{ApiError, ApiResult, EngineErrorExt};
use litebase_query::expr::translate_expr;
use tracing::debug;

use crate::exec::{bind_params, dynamic_row, execute};
use crate::request::resolve_principal;
use crate::state::AppState;

pub async fn call_function(
    State(state): State<AppState>,
    Path(function): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let principal = resolve_principal(&state.verifier, &headers)?;
    state.ensure_live()?;
    let snapshot = state.catalog.snapshot().await?;
    let declared = snapshot
        .function(&function)
        .ok_or_else(|| ApiError::FunctionNotFound(format!("unknown function: {function}")))?;

    let args: serde_json::Map<String, serde_json::Value> = if body.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid json body: {e}")))?
        {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(ApiError::InvalidRequest(
                    "rpc body must be a json object of arguments".into(),
                ))
            }
        }
    };

    for key in args.keys() {
        if !declared.params.iter().any(|p| &p.name == key) {
            return Err(ApiError::validation(format!(
                "unknown argument: {key}"
            )));
        }
    }

    let mut named: HashMap<String, SqlValue> = HashMap::with_capacity(declared.params.len());
    for param in &declared.params {
        match args.get(&param.name) {
            Some(value) => {
                let canonical = param.column_type()?.validate(value).map_err(|e| {
                    ApiError::validation_with_details(e.to_string(), format!("argument {}", param.name))
                })?;
                named.insert(param.name.clone(), canonical);
            }
            None if param.required => {
                return Err(ApiError::InvalidRequest(format!(
                    "missing required argument: {}",
                    param.name
                )))
            }
            None => {
                named.insert(param.name.clone(), SqlValue::Null);
            }
        }
    }

    let fragment = translate_expr(&declared.body, &principal, &named)?;
    let compiled = litebase_query::CompiledStatement {
        sql: fragment.sql,
        params: fragment.params,
    };
    debug!(function, sql = %compiled.sql, "rpc compiled");

    let head = compiled
        .sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    state.ensure_live()?;
    let mut tx = state.pool.begin().await.map_err(|e| e.into_api_error())?;
    let response = if head == "SELECT" || head == "WITH" {
        let rows = bind_params(sqlx::query(&compiled.sql), &compiled.params)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| e.into_api_error())?;
        let shaped = rows
            .iter()
            .map(dynamic_row)
            .collect::<ApiResult<Vec<_>>>()?;
        tx.commit().await.map_err(|e| e.into_api_error())?;
        (StatusCode::OK, Json(serde_json::Value::Array(shaped))).into_response()
    } else {
        execute(&mut *tx, &compiled).await?;
        tx.commit().await.map_err(|e| e.into_api_error())?;
        StatusCode::NO_CONTENT.into_response()
    };
    Ok(response)
}
