use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a bearer token. Anything user-specific here reads the
/// `x-session-id` header and falls back to the anonymous session, so the access guard
/// decides what the caller sees rather than the router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer probe. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET/DELETE /session
        // Read the current session, or log out. Logging in lives in the authenticated router.
        .route(
            "/session",
            get(handlers::get_session).delete(handlers::close_session),
        )
        // GET /navigation/home
        // Where the SPA should land after login (or `/login` when anonymous).
        .route("/navigation/home", get(handlers::get_home))
        // GET /navigation/resolve?path=...
        // Guard decision for an arbitrary frontend path.
        .route("/navigation/resolve", get(handlers::resolve_navigation))
        // GET /dashboards/{slug}
        // Render-or-redirect access guard for the six role dashboards.
        .route("/dashboards/{slug}", get(handlers::get_dashboard))
        // GET /departments/{id}/overview
        // Department-scoped view; staff and department heads only see their own.
        .route(
            "/departments/{id}/overview",
            get(handlers::get_department_overview),
        )
}
