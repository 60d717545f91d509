//! Request-surface parsing: query pairs in arrival order, `Prefer`
//! directives, and the rows-unit `Range` header.

use axum::http::HeaderMap;
use litebase_core::{ApiError, ApiResult};
use litebase_security::{Principal, TokenVerifier};

/// Decode the raw query string into ordered pairs. Order matters: filter
/// parameters AND together in arrival order and `select=` fixes JSON key
/// order.
pub fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(q) => form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    }
}

/// Find the last occurrence of a reserved parameter.
pub fn find_param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// How an INSERT should treat primary-key conflicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Error,
    MergeDuplicates,
    IgnoreDuplicates,
}

/// Parsed `Prefer` header directives.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preferences {
    pub representation: bool,
    pub count: bool,
    pub resolution: Resolution,
}

impl Preferences {
    /// Parse a `Prefer` header. Unknown directives are ignored, matching the
    /// hosted-service behaviour; `count=exact|planned|estimated` all run the
    /// exact count on this engine.
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut prefs = Preferences::default();
        let Some(raw) = headers.get("prefer").and_then(|v| v.to_str().ok()) else {
            return prefs;
        };
        for directive in raw.split(',') {
            match directive.trim() {
                "return=representation" => prefs.representation = true,
                "return=minimal" => prefs.representation = false,
                "count=exact" | "count=planned" | "count=estimated" => prefs.count = true,
                "resolution=merge-duplicates" => prefs.resolution = Resolution::MergeDuplicates,
                "resolution=ignore-duplicates" => prefs.resolution = Resolution::IgnoreDuplicates,
                _ => {}
            }
        }
        prefs
    }
}

/// A rows-unit `Range` header, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub first: u64,
    pub last: u64,
}

impl RowRange {
    pub fn limit(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Parse `Range: first-last`, tolerating a `rows=` unit prefix.
    pub fn parse(headers: &HeaderMap) -> ApiResult<Option<Self>> {
        let Some(raw) = headers.get("range").and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        let spec = raw.trim().strip_prefix("rows=").unwrap_or(raw.trim());
        let (first, last) = spec
            .split_once('-')
            .ok_or_else(|| ApiError::InvalidRequest(format!("malformed range: {raw}")))?;
        let first: u64 = first
            .trim()
            .parse()
            .map_err(|_| ApiError::InvalidRequest(format!("malformed range: {raw}")))?;
        let last: u64 = last
            .trim()
            .parse()
            .map_err(|_| ApiError::InvalidRequest(format!("malformed range: {raw}")))?;
        if last < first {
            return Err(ApiError::InvalidRequest(format!(
                "range end before start: {raw}"
            )));
        }
        Ok(Some(RowRange { first, last }))
    }
}

/// Run token resolution over the two token-bearing headers.
pub fn resolve_principal(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> ApiResult<Principal> {
    let authorization = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    verifier.resolve(authorization, apikey).map_err(Into::into)
}

/// Parse a non-negative integer query parameter (`limit` / `offset`).
pub fn parse_integer_param(pairs: &[(String, String)], name: &str) -> ApiResult<Option<u64>> {
    match find_param(pairs, name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("{name} must be a non-negative integer"))),
    }
}
