//! # litebase-security — auth principal resolver
//!
//! Binds an incoming request to a [`Principal`]: the `(subject, role, claims)`
//! triple the rest of the pipeline keys row-level security on. Tokens arrive
//! through the `Authorization: Bearer` header and/or the `apikey` header,
//! both HMAC-SHA256 JWTs signed with the server secret; when both verify, the
//! higher-privilege one wins.
//!
//! Resolution is deliberately quiet about garbage: a missing or undecodable
//! token yields the anonymous principal, while an *expired* token or an
//! unrecognised `role` claim fails the request outright.

pub mod error;
pub mod principal;
pub mod verifier;

pub use error::SecurityError;
pub use principal::{Principal, Role};
pub use verifier::TokenVerifier;
