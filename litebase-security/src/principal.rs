use serde::{Deserialize, Serialize};

/// The roles the REST surface recognises.
///
/// Anything else in a `role` claim is rejected during verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anon,
    Authenticated,
    ServiceRole,
}

impl Role {
    pub fn from_claim(claim: &str) -> Option<Self> {
        match claim {
            "anon" => Some(Role::Anon),
            "authenticated" => Some(Role::Authenticated),
            "service_role" => Some(Role::ServiceRole),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Anon => "anon",
            Role::Authenticated => "authenticated",
            Role::ServiceRole => "service_role",
        }
    }

    /// Ordering used when both the bearer token and the apikey verify.
    pub(crate) fn privilege(self) -> u8 {
        match self {
            Role::Anon => 0,
            Role::Authenticated => 1,
            Role::ServiceRole => 2,
        }
    }
}

/// The authenticated identity carried by a single request.
///
/// `subject` feeds `auth.uid()` in policy expressions; `role` feeds
/// `auth.role()` and the service-role bypass. Lives exactly as long as the
/// request that produced it.
#[derive(Clone, Debug)]
pub struct Principal {
    subject: Option<String>,
    role: Role,
    claims: serde_json::Value,
}

impl Principal {
    pub fn new(subject: Option<String>, role: Role, claims: serde_json::Value) -> Self {
        Self {
            subject: subject.filter(|s| !s.is_empty()),
            role,
            claims,
        }
    }

    /// The principal for requests with no usable token.
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            role: Role::Anon,
            claims: serde_json::Value::Null,
        }
    }

    /// The value `auth.uid()` resolves to; `None` binds SQL NULL.
    pub fn uid(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn claims(&self) -> &serde_json::Value {
        &self.claims
    }

    /// `service_role` skips RLS rewriting entirely.
    pub fn bypasses_rls(&self) -> bool {
        self.role == Role::ServiceRole
    }
}
