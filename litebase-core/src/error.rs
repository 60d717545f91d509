use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Convenience alias used across the request pipeline.
pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level error carrying the wire taxonomy.
///
/// Every pipeline stage returns an `ApiError` on failure and the emit stage
/// maps it to a status code plus the JSON body
/// `{"code", "message", "details"?, "hint"?}`. The mapping is flat: no stage
/// retries, no stage wraps.
pub enum ApiError {
    /// Malformed request surface: bad JSON body, bad header, bad RPC call.
    InvalidRequest(String),
    /// Grammar or type validation failure.
    ValidationFailed {
        message: String,
        details: Option<String>,
    },
    /// Expired token or unrecognised role claim.
    InvalidToken(String),
    /// Caller is authenticated but not allowed to perform the operation.
    InsufficientPrivilege(String),
    /// Unknown table.
    NotFound(String),
    /// Unknown RPC function. Carries the hosted-service literal code.
    FunctionNotFound(String),
    /// Unique or foreign-key conflict.
    Conflict(String),
    /// WITH CHECK / CHECK constraint failure. `rls` selects the status: a
    /// policy check is a 403, an engine CHECK constraint is a 400.
    CheckViolation { message: String, rls: bool },
    /// Transient engine fault (busy / locked). The caller may retry.
    Engine(String),
    /// Everything else.
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn rls_violation(message: impl Into<String>) -> Self {
        ApiError::CheckViolation {
            message: message.into(),
            rls: true,
        }
    }

    /// Taxonomy kind as it appears in the `code` field of the wire body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ValidationFailed { .. } => "validation_failed",
            ApiError::InvalidToken(_) => "invalid_token",
            ApiError::InsufficientPrivilege(_) => "insufficient_privilege",
            ApiError::NotFound(_) => "not_found",
            ApiError::FunctionNotFound(_) => "PGRST202",
            ApiError::Conflict(_) => "conflict",
            ApiError::CheckViolation { .. } => "check_violation",
            ApiError::Engine(_) => "engine_error",
            ApiError::Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientPrivilege(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::FunctionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::CheckViolation { rls: true, .. } => StatusCode::FORBIDDEN,
            ApiError::CheckViolation { rls: false, .. } => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidRequest(m)
            | ApiError::InvalidToken(m)
            | ApiError::InsufficientPrivilege(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Engine(m)
            | ApiError::Internal(m) => m,
            ApiError::ValidationFailed { message, .. }
            | ApiError::CheckViolation { message, .. } => message,
            ApiError::FunctionNotFound(m) => m,
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            ApiError::ValidationFailed { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    fn hint(&self) -> Option<&str> {
        match self {
            ApiError::FunctionNotFound(_) => {
                Some("Register the function before calling it over /rest/v1/rpc")
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::Map::new();
        body.insert("code".into(), self.code().into());
        body.insert("message".into(), self.message().into());
        if let Some(details) = self.details() {
            body.insert("details".into(), details.into());
        }
        if let Some(hint) = self.hint() {
            body.insert("hint".into(), hint.into());
        }
        (self.status(), Json(serde_json::Value::Object(body))).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}

/// Bridge from `sqlx::Error` to the taxonomy.
///
/// Lives here as an extension trait because the orphan rules forbid a
/// `From<sqlx::Error>` impl in crates that do not own either type.
pub trait EngineErrorExt {
    fn into_api_error(self) -> ApiError;
}

// SQLite primary result codes for transient lock contention.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

impl EngineErrorExt for sqlx::Error {
    fn into_api_error(self) -> ApiError {
        match &self {
            sqlx::Error::RowNotFound => ApiError::NotFound("row not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ApiError::Engine(self.to_string())
            }
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => ApiError::Conflict(db.message().into()),
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    ApiError::Conflict(db.message().into())
                }
                sqlx::error::ErrorKind::NotNullViolation => ApiError::ValidationFailed {
                    message: db.message().into(),
                    details: None,
                },
                sqlx::error::ErrorKind::CheckViolation => ApiError::CheckViolation {
                    message: db.message().into(),
                    rls: false,
                },
                _ => {
                    let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                    if code == SQLITE_BUSY || code == SQLITE_LOCKED {
                        ApiError::Engine(db.message().into())
                    } else {
                        ApiError::Internal(db.message().into())
                    }
                }
            },
            _ => ApiError::Internal(self.to_string()),
        }
    }
}
