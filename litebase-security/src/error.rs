use litebase_core::ApiError;

/// Token verification failures.
#[derive(Debug)]
pub enum SecurityError {
    /// The token is malformed or carries a bad signature. Resolution treats
    /// this the same as an absent token.
    InvalidToken(String),

    /// The token verified but its `exp` claim is in the past.
    TokenExpired,

    /// The `role` claim is not one of `anon`, `authenticated`, `service_role`.
    UnknownRole(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::TokenExpired => write!(f, "token expired"),
            SecurityError::UnknownRole(role) => write!(f, "unrecognised role claim: {role}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        ApiError::InvalidToken(err.to_string())
    }
}
