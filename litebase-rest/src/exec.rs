//! Statement execution against the store.
//!
//! Everything in this module runs on the single connection of the enclosing
//! request transaction, including embed sub-selects and RLS check probes, so
//! every read shares one visibility point and cyclic policy references cannot
//! self-deadlock the single-writer engine.

use std::collections::HashMap;
use std::pin::Pin;

use litebase_catalog::{CatalogSnapshot, ColumnDescriptor, ColumnType, PolicyCommand, SqlValue};
use litebase_core::{ApiError, ApiResult, EngineErrorExt};
use litebase_query::ast::{SelectField, SelectItem};
use litebase_query::compile::{build_select, compile_using_clause, compile_check_probe, CompiledStatement, SqlFragment};
use litebase_query::quote_ident;
use litebase_security::Principal;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::query::Query;
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Bind canonical values onto a prepared query in order.
pub fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
        };
    }
    query
}

/// Decode one column of a fetched row into its canonical storage value.
fn decode_value(row: &SqliteRow, name: &str, ty: ColumnType) -> ApiResult<SqlValue> {
    let value = match ty {
        ColumnType::Integer | ColumnType::Boolean => row
            .try_get::<Option<i64>, _>(name)
            .map(|v| v.map(SqlValue::Integer)),
        ColumnType::Bytea | ColumnType::Vector(_) => row
            .try_get::<Option<Vec<u8>>, _>(name)
            .map(|v| v.map(SqlValue::Blob)),
        _ => row
            .try_get::<Option<String>, _>(name)
            .map(|v| v.map(SqlValue::Text)),
    }
    .map_err(|e| e.into_api_error())?;
    Ok(value.unwrap_or(SqlValue::Null))
}

/// Decode every catalog column of a row. This is the post-image map consumed
/// by check probes and response shaping.
pub fn row_values(
    row: &SqliteRow,
    columns: &[ColumnDescriptor],
) -> ApiResult<HashMap<String, SqlValue>> {
    let mut values = HashMap::with_capacity(columns.len());
    for column in columns {
        values.insert(column.name.clone(), decode_value(row, &column.name, column.ty)?);
    }
    Ok(values)
}

/// One key of the response object: a presented column or an embedded
/// relation.
pub enum OutputField {
    Column {
        key: String,
        column: String,
        ty: ColumnType,
    },
    Embed(EmbedPlan),
}

/// A resolved resource embedding.
pub struct EmbedPlan {
    pub key: String,
    pub relation: String,
    /// Parent→children renders an array; child→parent a single object.
    pub many: bool,
    /// Column on the *current* row whose value scopes the sub-select.
    pub local_column: String,
    /// Column on the embedded table the sub-select filters on.
    pub remote_column: String,
    pub columns: Vec<ColumnDescriptor>,
    pub fields: Vec<OutputField>,
    pub rls: Option<SqlFragment>,
}

/// Resolve the parsed select list against the catalog: column names must
/// exist, embeds must ride a declared foreign key (in either direction), and
/// embedded tables bring their own SELECT policies along.
pub fn resolve_output(
    snapshot: &CatalogSnapshot,
    table: &str,
    columns: &[ColumnDescriptor],
    items: &[SelectItem],
    principal: &Principal,
) -> ApiResult<Vec<OutputField>> {
    if items.is_empty() {
        return Ok(columns
            .iter()
            .map(|c| OutputField::Column {
                key: c.name.clone(),
                column: c.name.clone(),
                ty: c.ty,
            })
            .collect());
    }

    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        match &item.field {
            SelectField::Column(name) => {
                let descriptor = columns
                    .iter()
                    .find(|c| &c.name == name)
                    .ok_or_else(|| {
                        ApiError::validation(format!("unknown select column: {name}"))
                    })?;
                fields.push(OutputField::Column {
                    key: item.output_name().to_string(),
                    column: descriptor.name.clone(),
                    ty: descriptor.ty,
                });
            }
            SelectField::Embed { relation, items } => {
                let (many, local_column, remote_column) =
                    if let Some(fk) = snapshot.reference(table, relation) {
                        let (_, remote) = fk.references.clone().unwrap_or_default();
                        (false, fk.name.clone(), remote)
                    } else if let Some(fk) = snapshot.reference(relation, table) {
                        let (_, local) = fk.references.clone().unwrap_or_default();
                        (true, local, fk.name.clone())
                    } else {
                        return Err(ApiError::validation(format!(
                            "no foreign key between {table} and {relation}"
                        )));
                    };
                let embed_columns = snapshot.table(relation).ok_or_else(|| {
                    ApiError::validation(format!("unknown embedded relation: {relation}"))
                })?;
                let rls = if snapshot.rls_enabled(relation) && !principal.bypasses_rls() {
                    Some(compile_using_clause(
                        snapshot.policies(relation, PolicyCommand::Select),
                        principal,
                    )?)
                } else {
                    None
                };
                let fields_inner =
                    resolve_output(snapshot, relation, embed_columns, items, principal)?;
                fields.push(OutputField::Embed(EmbedPlan {
                    key: item.output_name().to_string(),
                    relation: relation.clone(),
                    many,
                    local_column,
                    remote_column,
                    columns: embed_columns.to_vec(),
                    fields: fields_inner,
                    rls,
                }));
            }
        }
    }
    Ok(fields)
}

/// Every physical column name of a table, for `SELECT`-list emission.
pub fn column_names(columns: &[ColumnDescriptor]) -> Vec<&str> {
    columns.iter().map(|c| c.name.as_str()).collect()
}

/// Execute a row-returning statement and shape each row through the output
/// plan, running embed sub-selects on the same connection.
pub fn fetch_shaped<'a>(
    conn: &'a mut SqliteConnection,
    stmt: CompiledStatement,
    columns: &'a [ColumnDescriptor],
    fields: &'a [OutputField],
) -> BoxFuture<'a, ApiResult<Vec<serde_json::Value>>> {
    Box::pin(async move {
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| e.into_api_error())?;
        let mut value_maps = Vec::with_capacity(rows.len());
        for row in &rows {
            value_maps.push(row_values(row, columns)?);
        }
        drop(rows);

        let mut shaped = Vec::with_capacity(value_maps.len());
        for values in &value_maps {
            shaped.push(shape_row(conn, values, fields).await?);
        }
        Ok(shaped)
    })
}

/// Shape already-decoded post-image maps (mutation representations).
pub async fn shape_rows(
    conn: &mut SqliteConnection,
    maps: &[HashMap<String, SqlValue>],
    fields: &[OutputField],
) -> ApiResult<Vec<serde_json::Value>> {
    let mut shaped = Vec::with_capacity(maps.len());
    for values in maps {
        shaped.push(shape_row(conn, values, fields).await?);
    }
    Ok(shaped)
}

async fn shape_row(
    conn: &mut SqliteConnection,
    values: &HashMap<String, SqlValue>,
    fields: &[OutputField],
) -> ApiResult<serde_json::Value> {
    let mut object = serde_json::Map::new();
    for field in fields {
        match field {
            OutputField::Column { key, column, ty } => {
                let value = values.get(column).cloned().unwrap_or(SqlValue::Null);
                object.insert(key.clone(), ty.present(value));
            }
            OutputField::Embed(plan) => {
                object.insert(plan.key.clone(), fetch_embed(conn, plan, values).await?);
            }
        }
    }
    Ok(serde_json::Value::Object(object))
}

async fn fetch_embed(
    conn: &mut SqliteConnection,
    plan: &EmbedPlan,
    parent: &HashMap<String, SqlValue>,
) -> ApiResult<serde_json::Value> {
    let local = parent
        .get(&plan.local_column)
        .cloned()
        .unwrap_or(SqlValue::Null);
    if local == SqlValue::Null {
        // A NULL key matches nothing; skip the round-trip.
        return Ok(if plan.many {
            serde_json::Value::Array(Vec::new())
        } else {
            serde_json::Value::Null
        });
    }

    let mut fragment = SqlFragment {
        sql: format!("{} = ?", quote_ident(&plan.remote_column)),
        params: vec![local],
    };
    if let Some(rls) = &plan.rls {
        let mut params = fragment.params;
        params.extend(rls.params.iter().cloned());
        fragment = SqlFragment {
            sql: format!("({}) AND ({})", fragment.sql, rls.sql),
            params,
        };
    }
    let names = column_names(&plan.columns);
    let stmt = build_select(
        &plan.relation,
        &names,
        Some(&fragment),
        &[],
        (!plan.many).then_some(1),
        None,
    );
    let mut rows = fetch_shaped(conn, stmt, &plan.columns, &plan.fields).await?;
    Ok(if plan.many {
        serde_json::Value::Array(rows)
    } else {
        rows.drain(..).next().unwrap_or(serde_json::Value::Null)
    })
}

/// Probe each written row's post-image against the OR-combined WITH CHECK
/// expressions; one empty probe aborts the whole request.
pub async fn run_check_probes(
    conn: &mut SqliteConnection,
    checks: &[String],
    principal: &Principal,
    post_images: &[HashMap<String, SqlValue>],
) -> ApiResult<()> {
    for values in post_images {
        let probe = compile_check_probe(checks, principal, values)?;
        let admitted = bind_params(sqlx::query(&probe.sql), &probe.params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| e.into_api_error())?;
        if admitted.is_none() {
            return Err(ApiError::rls_violation(
                "new row violates row-level security policy",
            ));
        }
    }
    Ok(())
}

/// Execute a statement and return the affected-row count.
pub async fn execute(
    conn: &mut SqliteConnection,
    stmt: &CompiledStatement,
) -> ApiResult<u64> {
    let result = bind_params(sqlx::query(&stmt.sql), &stmt.params)
        .execute(&mut *conn)
        .await
        .map_err(|e| e.into_api_error())?;
    Ok(result.rows_affected())
}

/// Execute a `RETURNING` statement and decode post-image value maps.
pub async fn execute_returning(
    conn: &mut SqliteConnection,
    stmt: &CompiledStatement,
    columns: &[ColumnDescriptor],
) -> ApiResult<Vec<HashMap<String, SqlValue>>> {
    let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| e.into_api_error())?;
    rows.iter().map(|row| row_values(row, columns)).collect()
}

/// Run the paired COUNT statement.
pub async fn fetch_count(
    conn: &mut SqliteConnection,
    stmt: &CompiledStatement,
) -> ApiResult<u64> {
    let row = bind_params(sqlx::query(&stmt.sql), &stmt.params)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| e.into_api_error())?;
    let count: i64 = row.try_get(0).map_err(|e| e.into_api_error())?;
    Ok(count.max(0) as u64)
}

/// Decode a row of unknown shape (RPC results) by runtime value type.
pub fn dynamic_row(row: &SqliteRow) -> ApiResult<serde_json::Value> {
    let mut object = serde_json::Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i).map_err(|e| e.into_api_error())?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(i)
                    .map(serde_json::Value::from)
                    .map_err(|e| e.into_api_error())?,
                "REAL" => row
                    .try_get::<f64, _>(i)
                    .map(serde_json::Value::from)
                    .map_err(|e| e.into_api_error())?,
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(i).map_err(|e| e.into_api_error())?;
                    ColumnType::Bytea.present(SqlValue::Blob(bytes))
                }
                _ => row
                    .try_get::<String, _>(i)
                    .map(serde_json::Value::from)
                    .map_err(|e| e.into_api_error())?,
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(serde_json::Value::Object(object))
}
