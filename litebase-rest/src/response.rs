//! Response shaping helpers: pagination headers and the `Location` of a
//! fresh single insert.

use litebase_catalog::{ColumnDescriptor, SqlValue};
use std::collections::HashMap;

/// Build the `Content-Range` value: `first-last/total`, with `*` standing in
/// for an empty window or an unrequested count.
pub fn content_range(first: u64, returned: usize, total: Option<u64>) -> String {
    let total_part = match total {
        Some(total) => total.to_string(),
        None => "*".to_string(),
    };
    if returned == 0 {
        format!("*/{total_part}")
    } else {
        let last = first + returned as u64 - 1;
        format!("{first}-{last}/{total_part}")
    }
}

/// `Location` for a single inserted row, addressed by its primary key.
/// `None` when the table has no single-column primary key.
pub fn insert_location(
    table: &str,
    columns: &[ColumnDescriptor],
    row: &HashMap<String, SqlValue>,
) -> Option<String> {
    let mut primaries = columns.iter().filter(|c| c.is_primary);
    let pk = primaries.next()?;
    if primaries.next().is_some() {
        return None;
    }
    let value = match pk.ty.present(row.get(&pk.name)?.clone()) {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    Some(format!("/rest/v1/{table}?{}=eq.{encoded}", pk.name))
}
