//! Parsing of the filter grammar from URL query parameters.
//!
//! Any parameter named after a known column contributes a leaf; `and`, `or`,
//! `not.and`, `not.or` contribute combinators; `select`, `order`, `limit`,
//! `offset` are reserved; anything else is a validation failure.

use litebase_catalog::ColumnDescriptor;
use litebase_core::ApiError;

use crate::ast::{FilterValue, IsArg, Operator, Predicate};

/// Query parameters that are not filters.
pub const RESERVED_PARAMS: &[&str] = &["select", "order", "limit", "offset"];

const COMBINATORS: &[&str] = &["and", "or", "not.and", "not.or"];

fn column_exists(columns: &[ColumnDescriptor], name: &str) -> bool {
    columns.iter().any(|c| c.name == name)
}

/// Parse every filter-bearing query parameter into one predicate tree.
///
/// Multiple parameters AND together, matching the wire contract.
pub fn parse_filters(
    pairs: &[(String, String)],
    columns: &[ColumnDescriptor],
) -> Result<Option<Predicate>, ApiError> {
    let mut parts = Vec::new();
    for (name, value) in pairs {
        if RESERVED_PARAMS.contains(&name.as_str()) {
            continue;
        }
        if COMBINATORS.contains(&name.as_str()) {
            parts.push(parse_logical(name, value, columns)?);
        } else if column_exists(columns, name) {
            parts.push(parse_leaf(name, value)?);
        } else {
            return Err(ApiError::validation(format!(
                "unknown filter column: {name}"
            )));
        }
    }
    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Predicate::And(parts)),
    })
}

/// Parse one `col=op.value` pair, with an optional `not.` prefix on the op.
fn parse_leaf(column: &str, raw: &str) -> Result<Predicate, ApiError> {
    let (raw, negated) = match raw.strip_prefix("not.") {
        Some(rest) => (rest, true),
        None => (raw, false),
    };
    let (op_str, arg) = raw.split_once('.').ok_or_else(|| {
        ApiError::validation(format!("malformed filter for {column}: {raw}"))
    })?;
    let op = Operator::parse(op_str)
        .ok_or_else(|| ApiError::validation(format!("unknown operator: {op_str}")))?;

    let value = match op {
        Operator::In => FilterValue::List(parse_list(column, arg)?),
        Operator::Is => FilterValue::Is(match arg {
            "null" => IsArg::Null,
            "not.null" => IsArg::NotNull,
            "true" => IsArg::True,
            "false" => IsArg::False,
            _ => {
                return Err(ApiError::validation(format!(
                    "is accepts null, not.null, true or false, got: {arg}"
                )))
            }
        }),
        _ => FilterValue::Scalar(arg.to_string()),
    };

    let leaf = Predicate::Leaf {
        column: column.to_string(),
        op,
        value,
    };
    Ok(if negated {
        Predicate::Not(Box::new(leaf))
    } else {
        leaf
    })
}

fn parse_list(column: &str, arg: &str) -> Result<Vec<String>, ApiError> {
    let inner = arg
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| {
            ApiError::validation(format!("in filter for {column} requires a (list)"))
        })?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(split_top_level(inner)
        .into_iter()
        .map(|item| unquote(item.trim()).to_string())
        .collect())
}

/// Parse `and=(...)` / `or=(...)` / `not.and=(...)` / `not.or=(...)`.
fn parse_logical(
    name: &str,
    value: &str,
    columns: &[ColumnDescriptor],
) -> Result<Predicate, ApiError> {
    let (base, negated) = match name.strip_prefix("not.") {
        Some(rest) => (rest, true),
        None => (name, false),
    };
    let inner = value
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| {
            ApiError::validation(format!("{name} requires a parenthesised list"))
        })?;
    if inner.trim().is_empty() {
        return Err(ApiError::validation(format!("{name} list is empty")));
    }
    let children = split_top_level(inner)
        .into_iter()
        .map(|part| parse_condition(part.trim(), columns))
        .collect::<Result<Vec<_>, _>>()?;
    let combined = if base == "and" {
        Predicate::And(children)
    } else {
        Predicate::Or(children)
    };
    Ok(if negated {
        Predicate::Not(Box::new(combined))
    } else {
        combined
    })
}

/// One element inside a combinator list: either a nested combinator or a
/// `col.op.value` leaf.
fn parse_condition(
    expr: &str,
    columns: &[ColumnDescriptor],
) -> Result<Predicate, ApiError> {
    for name in COMBINATORS {
        if let Some(rest) = expr.strip_prefix(name) {
            if rest.starts_with('(') && rest.ends_with(')') {
                return parse_logical(name, rest, columns);
            }
        }
    }
    let (column, rest) = expr.split_once('.').ok_or_else(|| {
        ApiError::validation(format!("malformed filter condition: {expr}"))
    })?;
    if !column_exists(columns, column) {
        return Err(ApiError::validation(format!(
            "unknown filter column: {column}"
        )));
    }
    parse_leaf(column, rest)
}

/// Parse `order=col[.asc|.desc][.nullsfirst|.nullslast],...`.
pub fn parse_order(
    raw: &str,
    columns: &[ColumnDescriptor],
) -> Result<Vec<crate::ast::OrderTerm>, ApiError> {
    let mut terms = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut segments = part.split('.');
        let column = segments.next().unwrap_or_default();
        if !column_exists(columns, column) {
            return Err(ApiError::validation(format!(
                "unknown order column: {column}"
            )));
        }
        let mut term = crate::ast::OrderTerm::new(column);
        for segment in segments {
            match segment {
                "asc" => term.ascending = true,
                "desc" => term.ascending = false,
                "nullsfirst" => term.nulls_first = true,
                "nullslast" => term.nulls_first = false,
                other => {
                    return Err(ApiError::validation(format!(
                        "unknown order modifier: {other}"
                    )))
                }
            }
        }
        terms.push(term);
    }
    Ok(terms)
}

/// Split on commas at parenthesis depth zero, honouring double-quoted
/// segments.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(s)
}
