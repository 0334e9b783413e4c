//! # Liaison API
//!
//! HTTP surface of the authentication bridge.
//!
//! | Method | Path                        | Purpose                              |
//! |--------|-----------------------------|--------------------------------------|
//! | GET    | `/v1/sys/health`            | Liveness                             |
//! | POST   | `/v1/sessions/authenticate` | Run the bridge for the session       |
//! | POST   | `/v1/sessions/groups`       | Re-sync groups from the context      |
//! | POST   | `/v1/sessions/logout`       | Log the session out                  |
//! | PUT    | `/v1/sessions/context`      | Attach a security context (dev only) |
//!
//! Sessions are identified by the `x-liaison-session` header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod state;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use registry::{SessionHandle, SessionRegistry};
pub use state::AppState;

/// Header carrying the session identifier, in requests and responses.
pub const SESSION_HEADER: &str = "x-liaison-session";

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    let mut sessions = Router::new()
        .route("/authenticate", post(handlers::sessions::authenticate))
        .route("/groups", post(handlers::sessions::refresh_groups))
        .route("/logout", post(handlers::sessions::logout));

    if state.dev_mode {
        sessions = sessions.route("/context", put(handlers::sessions::attach_context));
    }

    Router::new()
        .route("/v1/sys/health", get(handlers::health::health))
        .nest("/v1/sessions", sessions)
        .layer(from_fn_with_state(state.clone(), middleware::pre_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
