use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Access Control ---

/// Role
///
/// The closed set of access levels a portal user can hold. Every dashboard,
/// guard and route entry matches on this enum exhaustively, so a role string
/// that does not parse into one of these variants can never reach a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Citizen,
    Staff,
    DepartmentHead,
    Admin,
    Commissioner,
    SuperAdmin,
}

impl Role {
    /// Every role, in the order the route table is built.
    pub const ALL: [Role; 6] = [
        Role::Citizen,
        Role::Staff,
        Role::DepartmentHead,
        Role::Admin,
        Role::Commissioner,
        Role::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Staff => "staff",
            Role::DepartmentHead => "department_head",
            Role::Admin => "admin",
            Role::Commissioner => "commissioner",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UnknownRole
///
/// Returned when a stored or submitted role string is not one of the six known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the frontend's upper-case constants (`DEPARTMENT_HEAD`) as well as
    /// the kebab-case form used in paths (`department-head`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "citizen" => Ok(Role::Citizen),
            "staff" => Ok(Role::Staff),
            "department_head" => Ok(Role::DepartmentHead),
            "admin" => Ok(Role::Admin),
            "commissioner" => Ok(Role::Commissioner),
            "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }
}

// --- Identity (Mapped to Database) ---

/// UserProfile
///
/// The user's record in the `public.profiles` table. The role column is free text in
/// the database, so it stays a `String` here and is only trusted once the session
/// store has parsed it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub department_id: Option<Uuid>,
}

/// SessionData
///
/// Raw login payload handed to `SessionStore::set_session`. Nothing in here has been
/// validated yet.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionData {
    pub user_id: Option<Uuid>,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

impl From<UserProfile> for SessionData {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: Some(profile.id),
            role: profile.role,
            department_id: profile.department_id,
            email: profile.email,
            name: profile.name,
            phone: profile.phone,
        }
    }
}

/// Identity
///
/// A validated, authenticated user as held by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

// --- Session & Navigation Schemas (Output) ---

/// SessionView
///
/// Serializable snapshot of a session, shaped like the frontend's user context.
/// Every identity field is `None` for the anonymous session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
    pub department_id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub is_authenticated: bool,
}

/// OpenSessionResponse
///
/// Output of `POST /session/login`. The client sends `session_id` back in the
/// `x-session-id` header on subsequent navigation requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpenSessionResponse {
    pub session_id: Uuid,
    pub session: SessionView,
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DestinationResponse {
    pub destination: String,
}

/// NavigationResponse
///
/// Allow/redirect decision for a requested path. When `allowed` is false the client
/// should navigate to `location` instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationResponse {
    pub path: String,
    pub allowed: bool,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct NavigationQuery {
    /// The frontend path the user is trying to open, e.g. `/admin/dashboard`.
    pub path: String,
}

/// DashboardView
///
/// What the access guard hands back when a dashboard may be rendered.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardView {
    pub role: Role,
    pub path: String,
    pub title: String,
    pub viewer: SessionView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DepartmentScope {
    /// Cross-department roles.
    All,
    /// The viewer belongs to the requested department.
    Own,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DepartmentOverview {
    pub department_id: Uuid,
    pub viewer_role: Role,
    pub scope: DepartmentScope,
}

/// ErrorBody
///
/// JSON error payload for the few endpoints that report structured failures.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// --- WhatsApp Ingress Schemas ---

/// WhatsAppWebhookForm
///
/// Twilio's `application/x-www-form-urlencoded` webhook payload. Twilio omits fields
/// freely (no media, no location, no profile), so every field is optional.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub struct WhatsAppWebhookForm {
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub message_sid: Option<String>,
    pub account_sid: Option<String>,
    pub num_media: Option<String>,
    #[serde(rename = "MediaUrl0")]
    pub media_url0: Option<String>,
    #[serde(rename = "MediaContentType0")]
    pub media_content_type0: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub address: Option<String>,
    pub profile_name: Option<String>,
    pub wa_id: Option<String>,
}

/// StatusCallbackForm
///
/// Delivery status update posted by Twilio for messages we sent.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallbackForm {
    pub message_sid: Option<String>,
    pub message_status: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Media,
    Location,
}

/// InboundMessage
///
/// The immutable record built once per webhook call and handed to the agent service.
/// Fields are private; the record is only readable after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    message_sid: Option<String>,
    account_sid: Option<String>,
    from: Option<String>,
    to: Option<String>,
    phone: Option<String>,
    body: String,
    num_media: u32,
    media_url: Option<String>,
    media_content_type: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    profile_name: Option<String>,
    wa_id: Option<String>,
    kind: MessageKind,
    received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// from_form
    ///
    /// Builds the record from whatever Twilio sent. Numeric fields that are absent or
    /// unparseable fall back to "none" rather than failing the request.
    pub fn from_form(form: WhatsAppWebhookForm, received_at: DateTime<Utc>) -> Self {
        let num_media = parse_trimmed::<u32>(form.num_media.as_deref()).unwrap_or(0);
        let latitude = parse_trimmed::<f64>(form.latitude.as_deref());
        let longitude = parse_trimmed::<f64>(form.longitude.as_deref());

        let kind = if latitude.is_some() && longitude.is_some() {
            MessageKind::Location
        } else if num_media > 0 || form.media_url0.is_some() {
            MessageKind::Media
        } else {
            MessageKind::Text
        };

        Self {
            phone: form.from.as_deref().and_then(normalize_phone),
            message_sid: form.message_sid,
            account_sid: form.account_sid,
            from: form.from,
            to: form.to,
            body: form.body.unwrap_or_default(),
            num_media,
            media_url: form.media_url0,
            media_content_type: form.media_content_type0,
            latitude,
            longitude,
            address: form.address,
            profile_name: form.profile_name,
            wa_id: form.wa_id,
            kind,
            received_at,
        }
    }

    /// Record for the `/test` endpoint, which has no Twilio metadata.
    pub fn from_test(phone: &str, message: &str, received_at: DateTime<Utc>) -> Self {
        Self::from_form(
            WhatsAppWebhookForm {
                from: Some(phone.to_string()),
                body: Some(message.to_string()),
                ..Default::default()
            },
            received_at,
        )
    }

    pub fn message_sid(&self) -> Option<&str> {
        self.message_sid.as_deref()
    }

    /// Raw `From` value, channel prefix included.
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Sender phone number with the `whatsapp:` channel prefix removed.
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn num_media(&self) -> u32 {
        self.num_media
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }
}

fn parse_trimmed<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// normalize_phone
///
/// Strips Twilio's `whatsapp:` channel prefix. Returns `None` for a blank sender.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let number = trimmed
        .strip_prefix("whatsapp:")
        .unwrap_or(trimmed)
        .trim();
    if number.is_empty() {
        None
    } else {
        Some(number.to_string())
    }
}

/// TestMessageRequest
///
/// Input for `POST /api/whatsapp/test`, used to exercise the reply path without Twilio.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TestMessageRequest {
    #[schema(example = "+15551234567")]
    pub phone: String,
    #[schema(example = "Where do I report a broken streetlight?")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TestMessageResponse {
    pub phone: String,
    pub message: String,
    pub reply: String,
}
