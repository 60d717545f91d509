//! # litebase-rest — the request translation engine
//!
//! Drives each REST request through the pipeline
//! `PARSE → AUTHN → CATALOG-LOAD → COMPILE → EXECUTE → SHAPE → EMIT`,
//! with the whole EXECUTE phase inside one store transaction. Any stage
//! failure short-circuits to the error emitter in `litebase-core`.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`state`] | Shared per-process state handed to every handler |
//! | [`request`] | `Prefer` / `Range` header parsing and query-pair decoding |
//! | [`exec`] | Transaction driving, row decoding, RLS check probes, embeds |
//! | [`handlers`] | GET / POST / PATCH / DELETE over `/rest/v1/{table}` |
//! | [`rpc`] | `POST /rest/v1/rpc/{function}` |
//! | [`response`] | `Content-Range`, `Location`, representation shaping |

pub mod exec;
pub mod handlers;
pub mod request;
pub mod response;
pub mod rpc;
pub mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;

/// The REST surface as a nestable router. The caller owns the listener and
/// any middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rest/v1/rpc/{function}", post(rpc::call_function))
        .route(
            "/rest/v1/{table}",
            get(handlers::select_rows)
                .post(handlers::insert_rows)
                .patch(handlers::update_rows)
                .delete(handlers::delete_rows),
        )
        .with_state(state)
}
