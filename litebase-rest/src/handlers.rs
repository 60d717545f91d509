//! The four table verbs over `/rest/v1/{table}`.
//!
//! Each handler walks the same pipeline: parse the request surface, resolve
//! the principal, load the catalog snapshot, compile the statement set, run
//! it inside one transaction, then shape and emit. RLS hides rows by
//! *silence*: a principal that cannot see a row gets empty results and
//! zero-row mutations that still succeed, never a 404.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use litebase_catalog::{ColumnDescriptor, PolicyCommand, SqlValue};
use litebase_core::{ApiError, ApiResult, EngineErrorExt};
use litebase_query::compile::{
    build_count, build_delete, build_insert, build_select, build_update, combine_where,
    compile_predicate, compile_using_clause, InsertConflict, SqlFragment,
};
use litebase_query::filter::{parse_filters, parse_order};
use litebase_query::select::parse_select;
use litebase_security::Principal;
use tracing::debug;

use crate::exec::{
    column_names, execute_returning, fetch_count, fetch_shaped, resolve_output, run_check_probes,
    shape_rows, OutputField,
};
use crate::request::{
    find_param, parse_integer_param, query_pairs, resolve_principal, Preferences, Resolution,
    RowRange,
};
use crate::response::{content_range, insert_location};
use crate::state::AppState;

/// Everything the verb bodies share, assembled once per request.
struct RequestContext {
    principal: Principal,
    columns: Vec<ColumnDescriptor>,
    snapshot: std::sync::Arc<litebase_catalog::CatalogSnapshot>,
    pairs: Vec<(String, String)>,
    prefs: Preferences,
    rls_active: bool,
}

async fn load_context(
    state: &AppState,
    table: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> ApiResult<RequestContext> {
    let principal = resolve_principal(&state.verifier, headers)?;
    state.ensure_live()?;
    let snapshot = state.catalog.snapshot().await?;
    let columns = snapshot
        .table(table)
        .ok_or_else(|| ApiError::NotFound(format!("unknown table: {table}")))?
        .to_vec();
    let rls_active = snapshot.rls_enabled(table) && !principal.bypasses_rls();
    debug!(table, role = principal.role().as_str(), rls_active, "request context loaded");
    Ok(RequestContext {
        principal,
        columns,
        snapshot,
        pairs: query_pairs(query),
        prefs: Preferences::parse(headers),
        rls_active,
    })
}

impl RequestContext {
    fn user_where(&self) -> ApiResult<Option<SqlFragment>> {
        parse_filters(&self.pairs, &self.columns)?
            .map(|predicate| compile_predicate(&predicate, &self.columns))
            .transpose()
    }

    fn rls_where(&self, table: &str, command: PolicyCommand) -> ApiResult<Option<SqlFragment>> {
        if !self.rls_active {
            return Ok(None);
        }
        compile_using_clause(self.snapshot.policies(table, command), &self.principal).map(Some)
    }

    fn check_exprs(&self, table: &str, command: PolicyCommand) -> Vec<String> {
        self.snapshot
            .policies(table, command)
            .iter()
            .filter_map(|p| p.check_expr.clone())
            .collect()
    }

    fn output_fields(&self, table: &str) -> ApiResult<Vec<OutputField>> {
        let items = parse_select(find_param(&self.pairs, "select").unwrap_or(""))?;
        resolve_output(
            &self.snapshot,
            table,
            &self.columns,
            &items,
            &self.principal,
        )
    }

    /// Validate one JSON object body against the column catalog, keeping the
    /// caller's key order.
    fn validate_row(&self, row: &serde_json::Value) -> ApiResult<Vec<(String, SqlValue)>> {
        let object = row
            .as_object()
            .ok_or_else(|| ApiError::InvalidRequest("row must be a json object".into()))?;
        let mut validated = Vec::with_capacity(object.len());
        for (key, value) in object {
            let descriptor = self
                .columns
                .iter()
                .find(|c| &c.name == key)
                .ok_or_else(|| ApiError::validation(format!("unknown column: {key}")))?;
            let canonical = descriptor.ty.validate(value).map_err(|e| {
                ApiError::validation_with_details(e.to_string(), format!("column {key}"))
            })?;
            validated.push((key.clone(), canonical));
        }
        Ok(validated)
    }
}

/// GET `/rest/v1/{table}`
pub async fn select_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let ctx = load_context(&state, &table, query.as_deref(), &headers).await?;
    let fields = ctx.output_fields(&table)?;
    let where_ = combine_where(
        ctx.user_where()?,
        ctx.rls_where(&table, PolicyCommand::Select)?,
    );
    let order = match find_param(&ctx.pairs, "order") {
        Some(raw) => parse_order(raw, &ctx.columns)?,
        None => Vec::new(),
    };

    let range = RowRange::parse(&headers)?;
    let max_rows = u64::from(state.max_rows);
    let (limit, offset) = match &range {
        Some(range) => (range.limit(), range.first),
        None => {
            let limit = parse_integer_param(&ctx.pairs, "limit")?
                .unwrap_or(max_rows)
                .min(max_rows);
            (limit, parse_integer_param(&ctx.pairs, "offset")?.unwrap_or(0))
        }
    };

    let names = column_names(&ctx.columns);
    let stmt = build_select(&table, &names, where_.as_ref(), &order, Some(limit), Some(offset));

    state.ensure_live()?;
    let mut tx = state.pool.begin().await.map_err(|e| e.into_api_error())?;
    let rows = fetch_shaped(&mut *tx, stmt, &ctx.columns, &fields).await?;
    let total = if ctx.prefs.count || range.is_some() {
        state.ensure_live()?;
        Some(fetch_count(&mut *tx, &build_count(&table, where_.as_ref())).await?)
    } else {
        None
    };
    tx.commit().await.map_err(|e| e.into_api_error())?;

    let status = if range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let range_header = content_range(offset, rows.len(), total);
    Ok((
        status,
        [(http::header::CONTENT_RANGE, range_header)],
        Json(serde_json::Value::Array(rows)),
    )
        .into_response())
}

/// POST `/rest/v1/{table}`
pub async fn insert_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = load_context(&state, &table, query.as_deref(), &headers).await?;
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid json body: {e}")))?;
    let (incoming, single) = match payload {
        serde_json::Value::Array(rows) => (rows, false),
        object @ serde_json::Value::Object(_) => (vec![object], true),
        _ => {
            return Err(ApiError::InvalidRequest(
                "body must be a json object or array of objects".into(),
            ))
        }
    };
    let validated: Vec<Vec<(String, SqlValue)>> = incoming
        .iter()
        .map(|row| ctx.validate_row(row))
        .collect::<ApiResult<_>>()?;

    let checks = ctx.check_exprs(&table, PolicyCommand::Insert);
    if ctx.rls_active && checks.is_empty() {
        // Enabled RLS with no INSERT policy admits nothing.
        return Err(ApiError::rls_violation(
            "no insert policy permits rows in this table",
        ));
    }

    let primary: Vec<&str> = ctx
        .columns
        .iter()
        .filter(|c| c.is_primary)
        .map(|c| c.name.as_str())
        .collect();
    if ctx.prefs.resolution != Resolution::Error && primary.is_empty() {
        return Err(ApiError::InvalidRequest(
            "duplicate resolution requires a primary key".into(),
        ));
    }

    state.ensure_live()?;
    let mut tx = state.pool.begin().await.map_err(|e| e.into_api_error())?;
    let mut written = Vec::with_capacity(validated.len());
    for row in &validated {
        let cols: Vec<&str> = row.iter().map(|(name, _)| name.as_str()).collect();
        let values: Vec<SqlValue> = row.iter().map(|(_, value)| value.clone()).collect();
        let conflict = match ctx.prefs.resolution {
            Resolution::Error => InsertConflict::None,
            Resolution::IgnoreDuplicates => InsertConflict::IgnoreDuplicates {
                key: primary.clone(),
            },
            Resolution::MergeDuplicates => InsertConflict::MergeDuplicates {
                key: primary.clone(),
                update: cols
                    .iter()
                    .copied()
                    .filter(|c| !primary.contains(c))
                    .collect(),
            },
        };
        let stmt = build_insert(&table, &cols, values, &conflict, true);
        state.ensure_live()?;
        let images = execute_returning(&mut *tx, &stmt, &ctx.columns).await?;
        if ctx.rls_active {
            run_check_probes(&mut *tx, &checks, &ctx.principal, &images).await?;
        }
        written.extend(images);
    }

    let body = if ctx.prefs.representation {
        let fields = ctx.output_fields(&table)?;
        let mut shaped = shape_rows(&mut *tx, &written, &fields).await?;
        Some(if single {
            shaped.drain(..).next().unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::Array(shaped)
        })
    } else {
        None
    };
    tx.commit().await.map_err(|e| e.into_api_error())?;

    let mut response_headers = HeaderMap::new();
    if single && written.len() == 1 {
        if let Some(location) = insert_location(&table, &ctx.columns, &written[0]) {
            if let Ok(value) = http::HeaderValue::from_str(&location) {
                response_headers.insert(http::header::LOCATION, value);
            }
        }
    }
    Ok(match body {
        Some(body) => (StatusCode::CREATED, response_headers, Json(body)).into_response(),
        None => (StatusCode::CREATED, response_headers).into_response(),
    })
}

/// PATCH `/rest/v1/{table}`
pub async fn update_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = load_context(&state, &table, query.as_deref(), &headers).await?;
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid json body: {e}")))?;
    let changes = ctx.validate_row(&payload)?;
    if changes.is_empty() {
        return Err(ApiError::InvalidRequest("empty update body".into()));
    }

    let where_ = combine_where(
        ctx.user_where()?,
        ctx.rls_where(&table, PolicyCommand::Update)?,
    );
    let set_cols: Vec<&str> = changes.iter().map(|(name, _)| name.as_str()).collect();
    let set_values: Vec<SqlValue> = changes.iter().map(|(_, value)| value.clone()).collect();
    let stmt = build_update(&table, &set_cols, set_values, where_.as_ref(), true);

    state.ensure_live()?;
    let mut tx = state.pool.begin().await.map_err(|e| e.into_api_error())?;
    let images = execute_returning(&mut *tx, &stmt, &ctx.columns).await?;
    let checks = ctx.check_exprs(&table, PolicyCommand::Update);
    if ctx.rls_active && !checks.is_empty() {
        run_check_probes(&mut *tx, &checks, &ctx.principal, &images).await?;
    }

    // Zero updated rows is a success; RLS hides rows silently.
    let body = if ctx.prefs.representation {
        let fields = ctx.output_fields(&table)?;
        Some(serde_json::Value::Array(
            shape_rows(&mut *tx, &images, &fields).await?,
        ))
    } else {
        None
    };
    tx.commit().await.map_err(|e| e.into_api_error())?;

    Ok(match body {
        Some(body) => (StatusCode::OK, Json(body)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE `/rest/v1/{table}`
pub async fn delete_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let ctx = load_context(&state, &table, query.as_deref(), &headers).await?;
    let where_ = combine_where(
        ctx.user_where()?,
        ctx.rls_where(&table, PolicyCommand::Delete)?,
    );
    let stmt = build_delete(&table, where_.as_ref(), true);

    state.ensure_live()?;
    let mut tx = state.pool.begin().await.map_err(|e| e.into_api_error())?;
    let images = execute_returning(&mut *tx, &stmt, &ctx.columns).await?;
    let body = if ctx.prefs.representation {
        let fields = ctx.output_fields(&table)?;
        Some(serde_json::Value::Array(
            shape_rows(&mut *tx, &images, &fields).await?,
        ))
    } else {
        None
    };
    tx.commit().await.map_err(|e| e.into_api_error())?;

    Ok(match body {
        Some(body) => (StatusCode::OK, Json(body)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
