use axum::{
    extract::{FromRef, Request},
    http::HeaderName,
    Router,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod agent;
pub mod auth;
pub mod config;
pub mod directory;
pub mod handlers;
pub mod messaging;
pub mod models;
pub mod navigation;
pub mod session;

// Module for routing segregation (Public, Authenticated, WhatsApp).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, whatsapp};

// --- Public Re-exports ---

pub use agent::{AgentState, HttpAgentService, MockAgentService};
pub use config::AppConfig;
pub use directory::{DirectoryState, InMemoryUserDirectory, PostgresUserDirectory};
pub use navigation::RouteTable;
pub use session::SessionRegistry;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::open_session, handlers::get_session, handlers::close_session,
        handlers::get_home, handlers::resolve_navigation, handlers::get_dashboard,
        handlers::get_department_overview, handlers::receive_webhook,
        handlers::status_callback, handlers::whatsapp_health, handlers::test_message
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::SessionData, models::SessionView,
            models::OpenSessionResponse, models::DestinationResponse,
            models::NavigationResponse, models::DashboardView, models::DepartmentScope,
            models::DepartmentOverview, models::ErrorBody, models::WhatsAppWebhookForm,
            models::StatusCallbackForm, models::TestMessageRequest,
            models::TestMessageResponse,
        )
    ),
    tags(
        (name = "civic-portal", description = "Civic Portal dashboards and WhatsApp ingress API")
    )
)]
struct ApiDoc;

/// RouteState
///
/// The route table, built once at startup and shared read-only.
pub type RouteState = Arc<RouteTable>;

/// AppState
///
/// The single container of shared services handed to every request. Nothing in it is
/// ambient: handlers receive exactly the pieces they extract.
#[derive(Clone)]
pub struct AppState {
    /// Profile lookups for authentication.
    pub directory: DirectoryState,
    /// Reply generation for WhatsApp messages.
    pub agent: AgentState,
    /// Per-client session stores.
    pub sessions: SessionRegistry,
    /// Role to dashboard mapping used by the access guard.
    pub routes: RouteState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles state around the standard route table, with sessions expiring after
    /// `config.session_idle_timeout` of inactivity.
    pub fn new(directory: DirectoryState, agent: AgentState, config: AppConfig) -> Self {
        Self {
            directory,
            agent,
            sessions: SessionRegistry::with_idle_timeout(config.session_idle_timeout),
            routes: Arc::new(RouteTable::standard()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for AgentState {
    fn from_ref(app_state: &AppState) -> AgentState {
        app_state.agent.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(app_state: &AppState) -> SessionRegistry {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for RouteState {
    fn from_ref(app_state: &AppState) -> RouteState {
        app_state.routes.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. Extracting `AuthUser` either
/// succeeds or rejects the request with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: session-aware, no authentication layer.
        .merge(public::public_routes())
        // Authenticated Routes: protected by `auth_middleware`.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Twilio ingress.
        .nest("/api/whatsapp", whatsapp::whatsapp_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its
/// `x-request-id`, method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
