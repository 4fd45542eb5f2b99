use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes that require a resolved `AuthUser`. The router layer in `create_router`
/// rejects unauthenticated requests with 401 before any handler here runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /session/login
        // Login: loads the caller's profile, validates its role and opens a session.
        // The response carries the session id and the role's default destination.
        .route("/session/login", post(handlers::open_session))
}
