//! Statement builders.
//!
//! Everything here accumulates SQL text plus a parallel vector of bound
//! parameters; the two always travel together as a [`SqlFragment`] or a
//! finished [`CompiledStatement`]. Identifiers pass through [`quote_ident`],
//! values become `?` placeholders, and policy fragments arrive pre-translated
//! from [`crate::expr`].

use std::collections::HashMap;

use litebase_catalog::{ColumnDescriptor, Policy, SqlValue};
use litebase_core::ApiError;
use litebase_security::Principal;

use crate::ast::{FilterValue, IsArg, Operator, OrderTerm, Predicate};
use crate::expr::translate_expr;

/// A WHERE-clause-shaped piece of SQL with its bound parameters.
#[derive(Clone, Debug, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// A complete statement ready for execution.
#[derive(Clone, Debug)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Quote an identifier for the engine: embedded quotes are stripped, the
/// result is wrapped in double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}

fn lookup_column<'a>(
    columns: &'a [ColumnDescriptor],
    name: &str,
) -> Result<&'a ColumnDescriptor, ApiError> {
    columns
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ApiError::validation(format!("unknown column: {name}")))
}

/// Compile a predicate tree into a WHERE fragment, coercing every leaf value
/// through the column's domain type.
pub fn compile_predicate(
    predicate: &Predicate,
    columns: &[ColumnDescriptor],
) -> Result<SqlFragment, ApiError> {
    let mut fragment = SqlFragment::default();
    emit_predicate(predicate, columns, &mut fragment)?;
    Ok(fragment)
}

fn emit_predicate(
    predicate: &Predicate,
    columns: &[ColumnDescriptor],
    out: &mut SqlFragment,
) -> Result<(), ApiError> {
    match predicate {
        Predicate::Leaf { column, op, value } => emit_leaf(column, *op, value, columns, out),
        Predicate::And(children) | Predicate::Or(children) => {
            let joiner = if matches!(predicate, Predicate::And(_)) {
                " AND "
            } else {
                " OR "
            };
            if children.is_empty() {
                out.sql.push_str("1 = 1");
                return Ok(());
            }
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.sql.push_str(joiner);
                }
                out.sql.push('(');
                emit_predicate(child, columns, out)?;
                out.sql.push(')');
            }
            Ok(())
        }
        Predicate::Not(child) => {
            out.sql.push_str("NOT (");
            emit_predicate(child, columns, out)?;
            out.sql.push(')');
            Ok(())
        }
    }
}

fn emit_leaf(
    column: &str,
    op: Operator,
    value: &FilterValue,
    columns: &[ColumnDescriptor],
    out: &mut SqlFragment,
) -> Result<(), ApiError> {
    let descriptor = lookup_column(columns, column)?;
    let ident = quote_ident(column);

    match (op, value) {
        (Operator::In, FilterValue::List(items)) => {
            // Empty IN-list is the constant-false predicate, not an error.
            if items.is_empty() {
                out.sql.push_str("1 = 0");
                return Ok(());
            }
            out.sql.push_str(&ident);
            out.sql.push_str(" IN (");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.sql.push_str(", ");
                }
                out.sql.push('?');
                out.params.push(descriptor.ty.parse_filter_value(item)?);
            }
            out.sql.push(')');
            Ok(())
        }
        (Operator::Is, FilterValue::Is(arg)) => {
            out.sql.push_str(&ident);
            out.sql.push_str(match arg {
                IsArg::Null => " IS NULL",
                IsArg::NotNull => " IS NOT NULL",
                IsArg::True => " IS 1",
                IsArg::False => " IS 0",
            });
            Ok(())
        }
        (op, FilterValue::Scalar(raw)) => {
            match op {
                Operator::Eq => emit_comparison(&ident, "=", raw, descriptor, out)?,
                Operator::Neq => emit_comparison(&ident, "<>", raw, descriptor, out)?,
                Operator::Gt => emit_comparison(&ident, ">", raw, descriptor, out)?,
                Operator::Gte => emit_comparison(&ident, ">=", raw, descriptor, out)?,
                Operator::Lt => emit_comparison(&ident, "<", raw, descriptor, out)?,
                Operator::Lte => emit_comparison(&ident, "<=", raw, descriptor, out)?,
                Operator::Like => {
                    out.sql.push_str(&ident);
                    out.sql.push_str(" LIKE ?");
                    out.params.push(SqlValue::Text(raw.clone()));
                }
                Operator::Ilike => {
                    // Fold both sides; the engine's bare LIKE only folds ASCII.
                    out.sql.push_str("lower(");
                    out.sql.push_str(&ident);
                    out.sql.push_str(") LIKE lower(?)");
                    out.params.push(SqlValue::Text(raw.clone()));
                }
                Operator::Fts => {
                    out.sql.push_str(&ident);
                    out.sql.push_str(" LIKE '%' || ? || '%'");
                    out.params.push(SqlValue::Text(raw.clone()));
                }
                Operator::Match => {
                    out.sql.push_str(&ident);
                    out.sql.push_str(" GLOB ?");
                    out.params.push(SqlValue::Text(raw.clone()));
                }
                Operator::Cs | Operator::Cd => emit_containment(op, &ident, raw, out)?,
                Operator::In | Operator::Is => {
                    return Err(ApiError::validation(format!(
                        "malformed argument for operator on {column}"
                    )))
                }
            }
            Ok(())
        }
        _ => Err(ApiError::validation(format!(
            "malformed argument for operator on {column}"
        ))),
    }
}

fn emit_comparison(
    ident: &str,
    sql_op: &str,
    raw: &str,
    descriptor: &ColumnDescriptor,
    out: &mut SqlFragment,
) -> Result<(), ApiError> {
    out.sql.push_str(ident);
    out.sql.push(' ');
    out.sql.push_str(sql_op);
    out.sql.push_str(" ?");
    out.params.push(descriptor.ty.parse_filter_value(raw)?);
    Ok(())
}

/// JSON array containment via the engine's JSON1 table functions. `cs` means
/// the column contains every element of the literal, `cd` the converse.
fn emit_containment(
    op: Operator,
    ident: &str,
    raw: &str,
    out: &mut SqlFragment,
) -> Result<(), ApiError> {
    let parsed: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| ApiError::validation(format!("containment filter requires a json array: {raw}")))?;
    if !parsed.is_array() {
        return Err(ApiError::validation(format!(
            "containment filter requires a json array: {raw}"
        )));
    }
    let literal = parsed.to_string();
    match op {
        Operator::Cs => {
            out.sql.push_str(&format!(
                "(SELECT count(*) FROM json_each(?) WHERE value IN \
                 (SELECT value FROM json_each({ident}))) = json_array_length(?)"
            ));
            out.params.push(SqlValue::Text(literal.clone()));
            out.params.push(SqlValue::Text(literal));
        }
        _ => {
            out.sql.push_str(&format!(
                "(SELECT count(*) FROM json_each({ident}) WHERE value IN \
                 (SELECT value FROM json_each(?))) = json_array_length({ident})"
            ));
            out.params.push(SqlValue::Text(literal));
        }
    }
    Ok(())
}

/// AND the user predicate with the RLS scope, keeping parameter order aligned
/// with the emitted text.
pub fn combine_where(
    user: Option<SqlFragment>,
    rls: Option<SqlFragment>,
) -> Option<SqlFragment> {
    match (user, rls) {
        (Some(user), Some(rls)) => {
            let mut params = user.params;
            params.extend(rls.params);
            Some(SqlFragment {
                sql: format!("({}) AND ({})", user.sql, rls.sql),
                params,
            })
        }
        (Some(one), None) | (None, Some(one)) => Some(one),
        (None, None) => None,
    }
}

/// OR-combine the USING expressions of the applicable policies.
///
/// An empty policy set on an RLS-enabled table is deny-all; a policy without
/// a USING expression (possible for UPDATE) scopes permissively.
pub fn compile_using_clause(
    policies: &[Policy],
    principal: &Principal,
) -> Result<SqlFragment, ApiError> {
    if policies.is_empty() {
        return Ok(SqlFragment {
            sql: "1 = 0".into(),
            params: Vec::new(),
        });
    }
    let empty = HashMap::new();
    let mut combined = SqlFragment::default();
    for (i, policy) in policies.iter().enumerate() {
        let using = policy.using_expr.as_deref().unwrap_or("1 = 1");
        let fragment = translate_expr(using, principal, &empty)?;
        if i > 0 {
            combined.sql.push_str(" OR ");
        }
        combined.sql.push('(');
        combined.sql.push_str(&fragment.sql);
        combined.sql.push(')');
        combined.params.extend(fragment.params);
    }
    Ok(combined)
}

/// Build the `SELECT 1 WHERE (check) OR (check)` probe that a written row's
/// post-image must satisfy. `row` maps column names to post-image values.
pub fn compile_check_probe(
    checks: &[String],
    principal: &Principal,
    row: &HashMap<String, SqlValue>,
) -> Result<CompiledStatement, ApiError> {
    let mut sql = String::from("SELECT 1 WHERE ");
    let mut params = Vec::new();
    for (i, check) in checks.iter().enumerate() {
        let fragment = translate_expr(check, principal, row)?;
        if i > 0 {
            sql.push_str(" OR ");
        }
        sql.push('(');
        sql.push_str(&fragment.sql);
        sql.push(')');
        params.extend(fragment.params);
    }
    Ok(CompiledStatement { sql, params })
}

/// SELECT over explicit columns with optional WHERE / ORDER BY / LIMIT.
pub fn build_select(
    table: &str,
    columns: &[&str],
    where_: Option<&SqlFragment>,
    order: &[OrderTerm],
    limit: Option<u64>,
    offset: Option<u64>,
) -> CompiledStatement {
    let column_list = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("SELECT {column_list} FROM {}", quote_ident(table));
    let mut params = Vec::new();
    append_where(&mut sql, &mut params, where_);
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        let clauses: Vec<String> = order
            .iter()
            .map(|term| {
                format!(
                    "{} {} {}",
                    quote_ident(&term.column),
                    if term.ascending { "ASC" } else { "DESC" },
                    if term.nulls_first {
                        "NULLS FIRST"
                    } else {
                        "NULLS LAST"
                    }
                )
            })
            .collect();
        sql.push_str(&clauses.join(", "));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }
    CompiledStatement { sql, params }
}

/// COUNT over the same WHERE clause as the paired SELECT.
pub fn build_count(table: &str, where_: Option<&SqlFragment>) -> CompiledStatement {
    let mut sql = format!("SELECT count(*) FROM {}", quote_ident(table));
    let mut params = Vec::new();
    append_where(&mut sql, &mut params, where_);
    CompiledStatement { sql, params }
}

/// Conflict handling for INSERT, driven by `Prefer: resolution=...`.
pub enum InsertConflict<'a> {
    None,
    MergeDuplicates {
        key: Vec<&'a str>,
        update: Vec<&'a str>,
    },
    IgnoreDuplicates {
        key: Vec<&'a str>,
    },
}

/// Single-row INSERT; the caller binds one validated value per column.
pub fn build_insert(
    table: &str,
    columns: &[&str],
    values: Vec<SqlValue>,
    conflict: &InsertConflict<'_>,
    returning: bool,
) -> CompiledStatement {
    let mut sql = if columns.is_empty() {
        // An all-defaults row.
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    } else {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(table)
        )
    };
    match conflict {
        InsertConflict::None => {}
        InsertConflict::IgnoreDuplicates { key } => {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO NOTHING",
                quote_idents(key)
            ));
        }
        InsertConflict::MergeDuplicates { key, update } => {
            if update.is_empty() {
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO NOTHING",
                    quote_idents(key)
                ));
            } else {
                let assignments: Vec<String> = update
                    .iter()
                    .map(|c| {
                        let ident = quote_ident(c);
                        format!("{ident} = excluded.{ident}")
                    })
                    .collect();
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    quote_idents(key),
                    assignments.join(", ")
                ));
            }
        }
    }
    if returning {
        sql.push_str(" RETURNING *");
    }
    CompiledStatement { sql, params: values }
}

/// UPDATE with SET parameters first, WHERE parameters after.
pub fn build_update(
    table: &str,
    set_columns: &[&str],
    set_params: Vec<SqlValue>,
    where_: Option<&SqlFragment>,
    returning: bool,
) -> CompiledStatement {
    let assignments: Vec<String> = set_columns
        .iter()
        .map(|c| format!("{} = ?", quote_ident(c)))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_ident(table),
        assignments.join(", ")
    );
    let mut params = set_params;
    append_where(&mut sql, &mut params, where_);
    if returning {
        sql.push_str(" RETURNING *");
    }
    CompiledStatement { sql, params }
}

pub fn build_delete(
    table: &str,
    where_: Option<&SqlFragment>,
    returning: bool,
) -> CompiledStatement {
    let mut sql = format!("DELETE FROM {}", quote_ident(table));
    let mut params = Vec::new();
    append_where(&mut sql, &mut params, where_);
    if returning {
        sql.push_str(" RETURNING *");
    }
    CompiledStatement { sql, params }
}

fn append_where(sql: &mut String, params: &mut Vec<SqlValue>, where_: Option<&SqlFragment>) {
    if let Some(fragment) = where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&fragment.sql);
        params.extend(fragment.params.iter().cloned());
    }
}

fn quote_idents(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
