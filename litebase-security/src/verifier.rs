use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use crate::error::SecurityError;
use crate::principal::{Principal, Role};

/// Verifies bearer / apikey JWTs against the shared server secret and builds
/// the request [`Principal`].
///
/// The token contract is HMAC-SHA256 with `sub`, `role`, `exp` claims
/// (`iat` and `iss` are accepted but not enforced).
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a single token and build its principal.
    pub fn verify(&self, token: &str) -> Result<Principal, SecurityError> {
        let token_data = decode::<serde_json::Value>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::InvalidToken(e.to_string()),
            })?;
        let claims = token_data.claims;

        let role_claim = claims
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let role = Role::from_claim(role_claim)
            .ok_or_else(|| SecurityError::UnknownRole(role_claim.to_string()))?;

        let subject = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .map(String::from);

        debug!(sub = ?subject, role = role.as_str(), "token verified");
        Ok(Principal::new(subject, role, claims))
    }

    /// Resolve the request principal from the two token-bearing headers.
    ///
    /// Each header is probed independently; the higher-privilege principal
    /// wins. Undecodable tokens count as absent, but an expired token or a
    /// bad role claim anywhere fails the whole request.
    pub fn resolve(
        &self,
        authorization: Option<&str>,
        apikey: Option<&str>,
    ) -> Result<Principal, SecurityError> {
        let bearer = authorization.and_then(|h| {
            h.strip_prefix("Bearer ")
                .or_else(|| h.strip_prefix("bearer "))
        });

        let mut winner: Option<Principal> = None;
        for token in [bearer, apikey].into_iter().flatten() {
            match self.verify(token.trim()) {
                Ok(principal) => {
                    let stronger = winner
                        .as_ref()
                        .map(|w| principal.role().privilege() > w.role().privilege())
                        .unwrap_or(true);
                    if stronger {
                        winner = Some(principal);
                    }
                }
                Err(err @ SecurityError::TokenExpired)
                | Err(err @ SecurityError::UnknownRole(_)) => return Err(err),
                Err(SecurityError::InvalidToken(reason)) => {
                    warn!(%reason, "ignoring undecodable token");
                }
            }
        }

        Ok(winner.unwrap_or_else(Principal::anonymous))
    }
}
