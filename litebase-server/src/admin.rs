//! Administrative surface: the catalog writers.
//!
//! Everything under `/admin/v1` requires the service role. These handlers
//! are the only writers of `_columns`, `_rls_tables`, `_rls_policies` and
//! `_functions`; each write bumps the catalog generation so request workers
//! pick up the change on their next snapshot.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use litebase_catalog::{
    schema::translate_default, ColumnDescriptor, ColumnType, FunctionCatalog, FunctionParam,
    Policy, PolicyCatalog, PolicyCommand, RpcFunction, SchemaCatalog,
};
use litebase_core::{ApiError, ApiResult, EngineErrorExt};
use litebase_query::quote_ident;
use litebase_rest::request::resolve_principal;
use litebase_rest::AppState;
use serde::Deserialize;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/admin/v1/tables", post(create_table))
        .route("/admin/v1/tables/{table}", delete(drop_table))
        .route("/admin/v1/rls", post(set_rls))
        .route("/admin/v1/policies", post(add_policy))
        .route("/admin/v1/functions", post(register_function))
        .with_state(state)
}

fn require_service_role(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let principal = resolve_principal(&state.verifier, headers)?;
    if !principal.bypasses_rls() {
        return Err(ApiError::InsufficientPrivilege(
            "admin surface requires the service role".into(),
        ));
    }
    Ok(())
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid json body: {e}")))
}

#[derive(Deserialize)]
struct ColumnSpec {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    default: Option<String>,
    /// `table(column)` foreign-key declaration used for embedding.
    #[serde(default)]
    references: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Deserialize)]
struct CreateTableRequest {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl ColumnSpec {
    fn parse_references(&self) -> ApiResult<Option<(String, String)>> {
        let Some(raw) = &self.references else {
            return Ok(None);
        };
        let (table, rest) = raw.split_once('(').ok_or_else(|| {
            ApiError::validation(format!("references must be table(column): {raw}"))
        })?;
        let column = rest.strip_suffix(')').ok_or_else(|| {
            ApiError::validation(format!("references must be table(column): {raw}"))
        })?;
        Ok(Some((table.trim().to_string(), column.trim().to_string())))
    }
}

async fn create_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    require_service_role(&state, &headers)?;
    let request: CreateTableRequest = parse_body(&body)?;
    if request.columns.is_empty() {
        return Err(ApiError::validation("a table needs at least one column"));
    }
    let snapshot = state.catalog.snapshot().await?;
    if snapshot.table(&request.name).is_some() {
        return Err(ApiError::Conflict(format!(
            "table already exists: {}",
            request.name
        )));
    }

    let mut specs = Vec::with_capacity(request.columns.len());
    for spec in &request.columns {
        let ty = ColumnType::parse(&spec.ty)?;
        specs.push((spec, ty, spec.parse_references()?));
    }

    let primaries: Vec<&str> = specs
        .iter()
        .filter(|(spec, _, _)| spec.primary)
        .map(|(spec, _, _)| spec.name.as_str())
        .collect();

    let mut defs = Vec::with_capacity(specs.len());
    for (spec, ty, references) in &specs {
        let mut def = format!("{} {}", quote_ident(&spec.name), ty.engine_affinity());
        if spec.primary && primaries.len() == 1 {
            def.push_str(" PRIMARY KEY");
        }
        if !spec.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &spec.default {
            def.push_str(&format!(" DEFAULT {}", translate_default(default, *ty)));
        }
        if let Some((ref_table, ref_column)) = references {
            def.push_str(&format!(
                " REFERENCES {} ({})",
                quote_ident(ref_table),
                quote_ident(ref_column)
            ));
        }
        defs.push(def);
    }
    if primaries.len() > 1 {
        let key = primaries
            .iter()
            .map(|p| quote_ident(p))
            .collect::<Vec<_>>()
            .join(", ");
        defs.push(format!("PRIMARY KEY ({key})"));
    }

    let ddl = format!(
        "CREATE TABLE {} ({})",
        quote_ident(&request.name),
        defs.join(", ")
    );
    sqlx::query(&ddl)
        .execute(&state.pool)
        .await
        .map_err(|e| e.into_api_error())?;

    let schema = SchemaCatalog::new(state.pool.clone());
    for (spec, ty, references) in specs {
        schema
            .register_column(ColumnDescriptor {
                table: request.name.clone(),
                name: spec.name.clone(),
                ty,
                nullable: spec.nullable,
                default_expr: spec.default.clone(),
                is_primary: spec.primary,
                references,
            })
            .await?;
    }
    state.catalog.bump();
    info!(table = %request.name, "table created");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))).into_response())
}

async fn drop_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_service_role(&state, &headers)?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table)))
        .execute(&state.pool)
        .await
        .map_err(|e| e.into_api_error())?;
    SchemaCatalog::new(state.pool.clone())
        .delete_table_columns(&table)
        .await?;
    PolicyCatalog::new(state.pool.clone())
        .delete_table_policies(&table)
        .await?;
    state.catalog.bump();
    info!(table, "table dropped");
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize)]
struct RlsRequest {
    table: String,
    enabled: bool,
}

async fn set_rls(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    require_service_role(&state, &headers)?;
    let request: RlsRequest = parse_body(&body)?;
    PolicyCatalog::new(state.pool.clone())
        .set_rls(&request.table, request.enabled)
        .await?;
    state.catalog.bump();
    Ok(Json(serde_json::json!({ "ok": true })).into_response())
}

#[derive(Deserialize)]
struct PolicyRequest {
    table: String,
    name: String,
    command: String,
    #[serde(default)]
    using: Option<String>,
    #[serde(default)]
    check: Option<String>,
}

async fn add_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    require_service_role(&state, &headers)?;
    let request: PolicyRequest = parse_body(&body)?;
    let command = PolicyCommand::parse(&request.command).ok_or_else(|| {
        ApiError::validation(format!("unknown policy command: {}", request.command))
    })?;
    PolicyCatalog::new(state.pool.clone())
        .add_policy(Policy {
            table: request.table,
            name: request.name,
            command,
            using_expr: request.using,
            check_expr: request.check,
        })
        .await?;
    state.catalog.bump();
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))).into_response())
}

#[derive(Deserialize)]
struct FunctionRequest {
    name: String,
    #[serde(default)]
    params: Vec<FunctionParam>,
    body: String,
}

async fn register_function(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    require_service_role(&state, &headers)?;
    let request: FunctionRequest = parse_body(&body)?;
    FunctionCatalog::new(state.pool.clone())
        .register_function(RpcFunction {
            name: request.name,
            params: request.params,
            body: request.body,
        })
        .await?;
    state.catalog.bump();
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))).into_response())
}
