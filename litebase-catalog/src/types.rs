//! The domain type catalog: what column types exist, what JSON values they
//! accept, and how canonical values map between the store and the wire.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime};
use litebase_core::ApiError;

/// A value in the engine's storage encoding.
///
/// Every validated input canonicalises to one of these before it is bound to
/// a statement parameter; nothing else ever reaches the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Value or type-declaration rejection. Always maps to `validation_failed`.
#[derive(Debug, PartialEq)]
pub struct TypeError(pub String);

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for ApiError {
    fn from(err: TypeError) -> Self {
        ApiError::validation(err.0)
    }
}

fn type_error(msg: impl Into<String>) -> TypeError {
    TypeError(msg.into())
}

/// The closed set of domain types addressable through the REST surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Numeric,
    Boolean,
    Timestamptz,
    Jsonb,
    Bytea,
    /// Fixed-dimension float vector, `N >= 1`.
    Vector(u32),
}

impl ColumnType {
    /// Parse a type declaration. Case-insensitive; `vector(N)` tolerates
    /// whitespace around the dimension but requires the parentheses.
    pub fn parse(decl: &str) -> Result<Self, TypeError> {
        let normalized = decl.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "uuid" => return Ok(ColumnType::Uuid),
            "text" => return Ok(ColumnType::Text),
            "integer" => return Ok(ColumnType::Integer),
            "numeric" => return Ok(ColumnType::Numeric),
            "boolean" => return Ok(ColumnType::Boolean),
            "timestamptz" => return Ok(ColumnType::Timestamptz),
            "jsonb" => return Ok(ColumnType::Jsonb),
            "bytea" => return Ok(ColumnType::Bytea),
            _ => {}
        }
        if let Some(rest) = normalized.strip_prefix("vector") {
            let rest = rest.trim();
            let inner = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| type_error(format!("unknown type: {decl}")))?;
            let dims: u32 = inner
                .trim()
                .parse()
                .map_err(|_| type_error(format!("bad vector dimension: {decl}")))?;
            if dims == 0 {
                return Err(type_error("vector dimension must be at least 1"));
            }
            return Ok(ColumnType::Vector(dims));
        }
        Err(type_error(format!("unknown type: {decl}")))
    }

    pub fn format(&self) -> String {
        match self {
            ColumnType::Uuid => "uuid".into(),
            ColumnType::Text => "text".into(),
            ColumnType::Integer => "integer".into(),
            ColumnType::Numeric => "numeric".into(),
            ColumnType::Boolean => "boolean".into(),
            ColumnType::Timestamptz => "timestamptz".into(),
            ColumnType::Jsonb => "jsonb".into(),
            ColumnType::Bytea => "bytea".into(),
            ColumnType::Vector(n) => format!("vector({n})"),
        }
    }

    /// The engine column affinity a table-creation statement should declare.
    pub fn engine_affinity(&self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Bytea | ColumnType::Vector(_) => "BLOB",
            _ => "TEXT",
        }
    }

    /// Validate a decoded JSON value and produce the canonical storage form.
    ///
    /// `null` is always accepted here; nullability is a schema-catalog
    /// concern.
    pub fn validate(&self, value: &serde_json::Value) -> Result<SqlValue, TypeError> {
        use serde_json::Value;
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        match self {
            ColumnType::Uuid => match value {
                Value::String(s) if is_uuid(s) => Ok(SqlValue::Text(s.to_ascii_lowercase())),
                _ => Err(type_error(format!("not a uuid: {value}"))),
            },
            ColumnType::Text => match value {
                Value::String(s) => Ok(SqlValue::Text(s.clone())),
                _ => Err(type_error(format!("expected a string, got {value}"))),
            },
            ColumnType::Integer => {
                let n = value
                    .as_i64()
                    .or_else(|| {
                        value.as_f64().and_then(|f| {
                            if f.fract() == 0.0 {
                                Some(f as i64)
                            } else {
                                None
                            }
                        })
                    })
                    .ok_or_else(|| type_error(format!("not an integer: {value}")))?;
                if n < i32::MIN as i64 || n > i32::MAX as i64 {
                    return Err(type_error(format!("integer out of range: {n}")));
                }
                Ok(SqlValue::Integer(n))
            }
            ColumnType::Numeric => match value {
                Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
                Value::String(s) if is_numeric_literal(s) => Ok(SqlValue::Text(s.trim().into())),
                _ => Err(type_error(format!("not numeric: {value}"))),
            },
            ColumnType::Boolean => match value {
                Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
                Value::Number(_) => match value.as_f64() {
                    Some(f) if f == 0.0 => Ok(SqlValue::Integer(0)),
                    Some(f) if f == 1.0 => Ok(SqlValue::Integer(1)),
                    _ => Err(type_error(format!("not a boolean: {value}"))),
                },
                _ => Err(type_error(format!("not a boolean: {value}"))),
            },
            ColumnType::Timestamptz => match value {
                Value::String(s) if is_timestamp(s) => Ok(SqlValue::Text(s.trim().into())),
                _ => Err(type_error(format!("not a timestamp: {value}"))),
            },
            ColumnType::Jsonb => match value {
                Value::Object(_) | Value::Array(_) => Ok(SqlValue::Text(value.to_string())),
                Value::String(s) => {
                    let parsed: serde_json::Value = serde_json::from_str(s)
                        .map_err(|e| type_error(format!("invalid json: {e}")))?;
                    match parsed {
                        Value::Object(_) | Value::Array(_) => {
                            Ok(SqlValue::Text(parsed.to_string()))
                        }
                        _ => Err(type_error("jsonb requires a json object or array")),
                    }
                }
                _ => Err(type_error("jsonb requires a json object or array")),
            },
            ColumnType::Bytea => match value {
                Value::String(s) => {
                    if s.chars().any(|c| c.is_ascii_whitespace()) {
                        return Err(type_error("base64 value contains whitespace"));
                    }
                    BASE64
                        .decode(s)
                        .map(SqlValue::Blob)
                        .map_err(|e| type_error(format!("invalid base64: {e}")))
                }
                Value::Array(items) => {
                    let mut bytes = Vec::with_capacity(items.len());
                    for item in items {
                        let b = item
                            .as_u64()
                            .filter(|b| *b <= u8::MAX as u64)
                            .ok_or_else(|| type_error("byte array element out of range"))?;
                        bytes.push(b as u8);
                    }
                    Ok(SqlValue::Blob(bytes))
                }
                _ => Err(type_error(format!("not bytea input: {value}"))),
            },
            ColumnType::Vector(dims) => {
                let floats = match value {
                    Value::Array(items) => {
                        let mut floats = Vec::with_capacity(items.len());
                        for item in items {
                            let f = item
                                .as_f64()
                                .ok_or_else(|| type_error("vector element is not numeric"))?;
                            floats.push(f as f32);
                        }
                        floats
                    }
                    Value::String(s) => parse_vector_text(s)?,
                    _ => return Err(type_error(format!("not a vector: {value}"))),
                };
                if floats.len() != *dims as usize {
                    return Err(type_error(format!(
                        "vector dimension mismatch: expected {dims}, got {}",
                        floats.len()
                    )));
                }
                Ok(SqlValue::Blob(pack_vector(&floats)))
            }
        }
    }

    /// Coerce a filter-grammar scalar (always URL text) to the storage form.
    pub fn parse_filter_value(&self, raw: &str) -> Result<SqlValue, TypeError> {
        match self {
            ColumnType::Integer => {
                let n: i64 = raw
                    .parse()
                    .map_err(|_| type_error(format!("not an integer: {raw}")))?;
                self.validate(&serde_json::Value::from(n))
            }
            ColumnType::Boolean => match raw {
                "true" | "1" => Ok(SqlValue::Integer(1)),
                "false" | "0" => Ok(SqlValue::Integer(0)),
                _ => Err(type_error(format!("not a boolean: {raw}"))),
            },
            _ => self.validate(&serde_json::Value::String(raw.to_string())),
        }
    }

    /// Map a stored value back to its wire (JSON) encoding.
    pub fn present(&self, value: SqlValue) -> serde_json::Value {
        use serde_json::Value;
        match (self, value) {
            (_, SqlValue::Null) => Value::Null,
            (ColumnType::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
            (ColumnType::Numeric, SqlValue::Text(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(v @ Value::Number(_)) => v,
                _ => Value::String(s),
            },
            (ColumnType::Jsonb, SqlValue::Text(s)) => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
            (ColumnType::Vector(_), SqlValue::Blob(b)) => Value::Array(
                unpack_vector(&b)
                    .into_iter()
                    .map(|f| {
                        serde_json::Number::from_f64(f64::from(f))
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ),
            (_, SqlValue::Integer(i)) => Value::from(i),
            (_, SqlValue::Real(f)) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (_, SqlValue::Text(s)) => Value::String(s),
            (_, SqlValue::Blob(b)) => Value::String(BASE64.encode(b)),
        }
    }
}

fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if *b != b'-' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    true
}

fn is_numeric_literal(s: &str) -> bool {
    let s = s.trim();
    let mut chars = s.chars().peekable();
    if matches!(chars.peek(), Some('+') | Some('-')) {
        chars.next();
    }
    let mut digits = 0usize;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => digits += 1,
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if !seen_exp && digits > 0 => {
                seen_exp = true;
                if matches!(chars.peek(), Some('+') | Some('-')) {
                    chars.next();
                }
                match chars.next() {
                    Some(d) if d.is_ascii_digit() => {}
                    _ => return false,
                }
            }
            _ => return false,
        }
    }
    digits > 0
}

fn is_timestamp(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

fn parse_vector_text(s: &str) -> Result<Vec<f32>, TypeError> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| type_error(format!("not a vector literal: {s}")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| type_error(format!("vector element is not numeric: {part}")))
        })
        .collect()
}

fn pack_vector(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn unpack_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
