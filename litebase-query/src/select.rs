//! Parsing of the `select=` list: column names, `alias:col` renames, and
//! `relation(cols)` embeds. Name resolution against the catalog happens
//! later, in the translation engine; this module is pure grammar.

use litebase_core::ApiError;

use crate::ast::{SelectField, SelectItem};

/// Parse a `select=` parameter. An empty string selects everything.
pub fn parse_select(raw: &str) -> Result<Vec<SelectItem>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return Ok(Vec::new());
    }
    parse_items(raw)
}

fn parse_items(raw: &str) -> Result<Vec<SelectItem>, ApiError> {
    split_top_level(raw)
        .into_iter()
        .map(|item| parse_item(item.trim()))
        .collect()
}

fn parse_item(item: &str) -> Result<SelectItem, ApiError> {
    if item.is_empty() {
        return Err(ApiError::validation("empty select item"));
    }

    // An alias applies to whatever follows the first colon, as long as the
    // colon sits before any embed parenthesis.
    let (alias, rest) = match item.split_once(':') {
        Some((alias, rest))
            if item.find('(').map(|p| p > alias.len()).unwrap_or(true) =>
        {
            (Some(alias.trim().to_string()), rest.trim())
        }
        _ => (None, item),
    };

    if let Some(open) = rest.find('(') {
        let close = rest
            .rfind(')')
            .filter(|close| *close > open)
            .ok_or_else(|| {
                ApiError::validation(format!("unbalanced parentheses in select: {item}"))
            })?;
        if close != rest.len() - 1 {
            return Err(ApiError::validation(format!(
                "trailing characters after embed: {item}"
            )));
        }
        let relation = rest[..open].trim();
        if relation.is_empty() {
            return Err(ApiError::validation(format!("embed without a name: {item}")));
        }
        let inner = rest[open + 1..close].trim();
        let items = if inner.is_empty() || inner == "*" {
            Vec::new()
        } else {
            parse_items(inner)?
        };
        return Ok(SelectItem {
            alias,
            field: SelectField::Embed {
                relation: relation.to_string(),
                items,
            },
        });
    }

    Ok(SelectItem {
        alias,
        field: SelectField::Column(rest.to_string()),
    })
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
