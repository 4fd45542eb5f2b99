use crate::{
    AppState, RouteState,
    agent::AgentState,
    auth::AuthUser,
    messaging::{Twiml, process_message},
    models::{
        DashboardView, DepartmentOverview, DepartmentScope, DestinationResponse, ErrorBody,
        InboundMessage, NavigationQuery, NavigationResponse, OpenSessionResponse, Role,
        SessionData, SessionView, StatusCallbackForm, TestMessageRequest, TestMessageResponse,
        WhatsAppWebhookForm,
    },
    navigation::{Decision, LOGIN_PATH},
    session::{CurrentSession, SessionError, SessionRegistry},
};
use axum::{
    Form, Json,
    extract::{Path, Query, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use uuid::Uuid;

// --- Session Handlers ---

/// open_session
///
/// [Authenticated Route] Logs the caller in: their directory profile is run through
/// `set_session`. When the request carries a live `x-session-id`, that session is
/// replaced in place and keeps its id; otherwise a new session is registered.
///
/// A profile whose role is not one of the portal roles is refused with 422, and any
/// session the caller already had is left untouched.
#[utoipa::path(
    post,
    path = "/session/login",
    params(("x-session-id" = Option<Uuid>, Header, description = "Session to replace, if any")),
    responses(
        (status = 201, description = "Session opened", body = OpenSessionResponse),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Profile has an invalid role", body = ErrorBody)
    )
)]
pub async fn open_session(
    AuthUser { id, profile }: AuthUser,
    CurrentSession { id: existing, .. }: CurrentSession,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<OpenSessionResponse>), (StatusCode, Json<ErrorBody>)> {
    match state.sessions.login(existing, SessionData::from(profile)).await {
        Ok((session_id, session)) => {
            let destination = state.routes.home_for(&session).to_string();
            tracing::info!(user_id = %id, session_id = %session_id, %destination, "Session opened");
            Ok((
                StatusCode::CREATED,
                Json(OpenSessionResponse {
                    session_id,
                    session: session.view(),
                    destination,
                }),
            ))
        }
        Err(e) => Err(session_error_response(e)),
    }
}

fn session_error_response(err: SessionError) -> (StatusCode, Json<ErrorBody>) {
    let code = match err {
        SessionError::InvalidRole(_) => "invalid_role",
        SessionError::MissingUser => "missing_user",
    };
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            error: code.to_string(),
            message: err.to_string(),
        }),
    )
}

/// get_session
///
/// [Public Route] Returns the session bound to `x-session-id`, or the anonymous
/// sentinel.
#[utoipa::path(
    get,
    path = "/session",
    params(("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")),
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(CurrentSession { session, .. }: CurrentSession) -> Json<SessionView> {
    Json(session.view())
}

/// close_session
///
/// [Public Route] Logs out. Always succeeds, whether or not the id was known.
#[utoipa::path(
    delete,
    path = "/session",
    params(("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")),
    responses((status = 204, description = "Logged out"))
)]
pub async fn close_session(
    CurrentSession { id, .. }: CurrentSession,
    State(sessions): State<SessionRegistry>,
) -> StatusCode {
    if let Some(id) = id {
        if sessions.close(id).await {
            tracing::info!(session_id = %id, "Session closed");
        }
    }
    StatusCode::NO_CONTENT
}

// --- Navigation Handlers ---

/// get_home
///
/// [Public Route] Default destination for the caller: their dashboard, or `/login`.
#[utoipa::path(
    get,
    path = "/navigation/home",
    params(("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")),
    responses((status = 200, description = "Default destination", body = DestinationResponse))
)]
pub async fn get_home(
    CurrentSession { session, .. }: CurrentSession,
    State(routes): State<RouteState>,
) -> Json<DestinationResponse> {
    Json(DestinationResponse {
        destination: routes.home_for(&session).to_string(),
    })
}

/// resolve_navigation
///
/// [Public Route] Runs the access guard for a frontend path without rendering
/// anything, so the SPA router can decide where to go.
#[utoipa::path(
    get,
    path = "/navigation/resolve",
    params(
        NavigationQuery,
        ("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")
    ),
    responses((status = 200, description = "Guard decision", body = NavigationResponse))
)]
pub async fn resolve_navigation(
    CurrentSession { session, .. }: CurrentSession,
    State(routes): State<RouteState>,
    Query(query): Query<NavigationQuery>,
) -> Json<NavigationResponse> {
    let decision = routes.authorize(&query.path, &session);
    Json(NavigationResponse {
        allowed: decision.is_allowed(),
        location: decision.location().to_string(),
        path: query.path,
    })
}

/// get_dashboard
///
/// [Public Route] The access guard proper: renders the dashboard named by `slug` when
/// the caller's role is allowed in, otherwise answers with a 307 redirect to `/login`
/// (anonymous) or the caller's own dashboard.
#[utoipa::path(
    get,
    path = "/dashboards/{slug}",
    params(
        ("slug" = String, Path, description = "Dashboard slug, e.g. `admin` or `department-head`"),
        ("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")
    ),
    responses(
        (status = 200, description = "Dashboard", body = DashboardView),
        (status = 307, description = "Redirect to login or own dashboard")
    )
)]
pub async fn get_dashboard(
    CurrentSession { session, .. }: CurrentSession,
    State(routes): State<RouteState>,
    Path(slug): Path<String>,
) -> Response {
    let decision = match routes.entry_for_slug(&slug) {
        Some(entry) => routes.authorize(entry.path, &session),
        None => routes.deny(&session),
    };

    match decision {
        Decision::Allow(entry) => Json(DashboardView {
            role: entry.role,
            path: entry.path.to_string(),
            title: entry.title.to_string(),
            viewer: session.view(),
        })
        .into_response(),
        Decision::Redirect(to) => {
            tracing::debug!(%slug, redirect = to, "Dashboard access denied");
            Redirect::temporary(to).into_response()
        }
    }
}

/// get_department_overview
///
/// [Public Route] Department-scoped guard. Admins, super admins and commissioners see
/// any department; staff and department heads only their own. Everyone else is
/// redirected like on a denied dashboard.
#[utoipa::path(
    get,
    path = "/departments/{id}/overview",
    params(
        ("id" = Uuid, Path, description = "Department ID"),
        ("x-session-id" = Option<Uuid>, Header, description = "Session id from POST /session/login")
    ),
    responses(
        (status = 200, description = "Overview", body = DepartmentOverview),
        (status = 307, description = "Redirect to login or own dashboard")
    )
)]
pub async fn get_department_overview(
    CurrentSession { session, .. }: CurrentSession,
    State(routes): State<RouteState>,
    Path(department_id): Path<Uuid>,
) -> Response {
    let Some(role) = session.role() else {
        return Redirect::temporary(LOGIN_PATH).into_response();
    };

    let scope = match role {
        Role::Admin | Role::SuperAdmin | Role::Commissioner => Some(DepartmentScope::All),
        Role::Staff | Role::DepartmentHead if session.belongs_to_department(department_id) => {
            Some(DepartmentScope::Own)
        }
        Role::Staff | Role::DepartmentHead | Role::Citizen => None,
    };

    match scope {
        Some(scope) => Json(DepartmentOverview {
            department_id,
            viewer_role: role,
            scope,
        })
        .into_response(),
        None => Redirect::temporary(routes.deny(&session).location()).into_response(),
    }
}

// --- WhatsApp Handlers ---

/// receive_webhook
///
/// [Public Route] Twilio's inbound-message webhook. Always answers 200 with a TwiML
/// envelope: a body that does not parse is handled as an empty form, and an agent
/// failure is replaced by the apology text (and logged by `process_message`).
#[utoipa::path(
    post,
    path = "/api/whatsapp/webhook",
    request_body(content = WhatsAppWebhookForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "TwiML reply", content_type = "application/xml", body = String))
)]
pub async fn receive_webhook(
    State(agent): State<AgentState>,
    form: Result<Form<WhatsAppWebhookForm>, FormRejection>,
) -> Twiml {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable webhook form; treating as empty");
            WhatsAppWebhookForm::default()
        }
    };

    let message = InboundMessage::from_form(form, Utc::now());
    let outcome = process_message(agent.as_ref(), &message).await;
    Twiml::message(outcome.reply_text())
}

/// status_callback
///
/// [Public Route] Delivery status updates from Twilio. Observational only.
#[utoipa::path(
    post,
    path = "/api/whatsapp/status",
    request_body(content = StatusCallbackForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "Acknowledged", body = String))
)]
pub async fn status_callback(form: Result<Form<StatusCallbackForm>, FormRejection>) -> &'static str {
    match form {
        Ok(Form(status)) => {
            let sid = status.message_sid.as_deref().unwrap_or("-");
            let state = status.message_status.as_deref().unwrap_or("-");
            match status.error_code.as_deref() {
                Some(code) => tracing::warn!(
                    message_sid = sid,
                    status = state,
                    error_code = code,
                    error_message = status.error_message.as_deref().unwrap_or("-"),
                    "WhatsApp delivery failed"
                ),
                None => tracing::info!(message_sid = sid, status = state, "WhatsApp delivery status"),
            }
        }
        Err(rejection) => tracing::warn!(error = %rejection, "Unreadable status callback"),
    }
    "OK"
}

/// whatsapp_health
///
/// [Public Route] Liveness probe for the webhook integration.
#[utoipa::path(
    get,
    path = "/api/whatsapp/health",
    responses((status = 200, description = "Running", body = String))
)]
pub async fn whatsapp_health() -> &'static str {
    "WhatsApp webhook is running"
}

/// test_message
///
/// [Public Route] Runs a message through the same path as the webhook and returns the
/// reply as JSON. Agent failures produce the apology text, exactly as on the webhook.
#[utoipa::path(
    post,
    path = "/api/whatsapp/test",
    request_body = TestMessageRequest,
    responses((status = 200, description = "Generated reply", body = TestMessageResponse))
)]
pub async fn test_message(
    State(agent): State<AgentState>,
    Json(payload): Json<TestMessageRequest>,
) -> Json<TestMessageResponse> {
    let message = InboundMessage::from_test(&payload.phone, &payload.message, Utc::now());
    let reply = process_message(agent.as_ref(), &message).await.into_reply();

    Json(TestMessageResponse {
        phone: payload.phone,
        message: payload.message,
        reply,
    })
}
