use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::{collections::HashMap, convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Identity, Role, SessionData, SessionView};

/// Header carrying the id returned by `POST /session/login`.
pub const SESSION_HEADER: &str = "x-session-id";

/// SessionError
///
/// Reasons a login payload is refused. The session that was in place before the
/// failed call is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("role {0:?} is not a recognised portal role")]
    InvalidRole(String),
    #[error("session payload has no user id")]
    MissingUser,
}

/// Session
///
/// Either the anonymous sentinel or a validated identity. There is no half-populated
/// state in between.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Authenticated(identity) => Some(identity),
            Session::Anonymous => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(|identity| identity.role)
    }

    /// True iff authenticated and holding exactly `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.has_any_role(&[role])
    }

    /// True iff authenticated and the session's role is one of `roles`.
    /// An empty slice never matches.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        match self {
            Session::Authenticated(identity) => roles.contains(&identity.role),
            Session::Anonymous => false,
        }
    }

    pub fn belongs_to_department(&self, department_id: Uuid) -> bool {
        self.identity()
            .and_then(|identity| identity.department_id)
            .is_some_and(|own| own == department_id)
    }

    pub fn view(&self) -> SessionView {
        match self {
            Session::Anonymous => SessionView::default(),
            Session::Authenticated(identity) => SessionView {
                user_id: Some(identity.user_id),
                role: Some(identity.role),
                department_id: identity.department_id,
                email: Some(identity.email.clone()),
                name: Some(identity.name.clone()),
                phone: identity.phone.clone(),
                is_authenticated: true,
            },
        }
    }
}

/// SessionStore
///
/// Holds one client's session. All writes replace the whole `Session` value, so a
/// reader sees either the old session or the new one.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: Session,
}

impl SessionStore {
    /// Starts out anonymous.
    pub fn new() -> Self {
        Self::default()
    }

    /// set_session
    ///
    /// Validates `data` and, only if it is acceptable, replaces the current session
    /// with an authenticated one. On error nothing changes.
    pub fn set_session(&mut self, data: SessionData) -> Result<&Session, SessionError> {
        let identity = validate(data).inspect_err(|e| {
            tracing::warn!(error = %e, "Refusing session update");
        })?;
        self.current = Session::Authenticated(identity);
        Ok(&self.current)
    }

    pub fn clear_session(&mut self) {
        self.current = Session::Anonymous;
    }

    pub fn current(&self) -> &Session {
        &self.current
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.current.has_role(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.current.has_any_role(roles)
    }

    pub fn belongs_to_department(&self, department_id: Uuid) -> bool {
        self.current.belongs_to_department(department_id)
    }

    pub fn view(&self) -> SessionView {
        self.current.view()
    }
}

fn validate(data: SessionData) -> Result<Identity, SessionError> {
    let user_id = data.user_id.ok_or(SessionError::MissingUser)?;
    let role: Role = data
        .role
        .parse()
        .map_err(|_| SessionError::InvalidRole(data.role.clone()))?;

    Ok(Identity {
        user_id,
        role,
        department_id: data.department_id,
        email: data.email,
        name: data.name,
        phone: data.phone,
    })
}

/// Sessions left unused for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct RegisteredSession {
    store: SessionStore,
    expires_at: DateTime<Utc>,
}

impl RegisteredSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// SessionRegistry
///
/// One `SessionStore` per client, keyed by the id handed out on login. Every use of a
/// session pushes its expiry back by the idle timeout; expired ids read as anonymous
/// and are swept on the next login. Cloning the registry clones the handle, not the
/// sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    stores: Arc<RwLock<HashMap<Uuid, RegisteredSession>>>,
    idle_timeout: TimeDelta,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            stores: Arc::default(),
            idle_timeout: TimeDelta::from_std(idle_timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.idle_timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// open
    ///
    /// Validates `data` into a fresh store and registers it under a new id. Nothing is
    /// registered when validation fails.
    pub async fn open(&self, data: SessionData) -> Result<(Uuid, Session), SessionError> {
        self.login(None, data).await
    }

    /// login
    ///
    /// Logs `data` in for the client currently holding `existing`. A live session under
    /// that id is replaced in place through `set_session`, so a refused payload leaves
    /// it exactly as it was and the id stays the same. Without a live session a new
    /// store is registered under a new id, and a stale `existing` entry is dropped.
    pub async fn login(
        &self,
        existing: Option<Uuid>,
        data: SessionData,
    ) -> Result<(Uuid, Session), SessionError> {
        let now = Utc::now();
        let expires_at = self.expiry_from(now);
        let mut stores = self.stores.write().await;

        let before = stores.len();
        stores.retain(|_, entry| !entry.is_expired(now));
        if stores.len() < before {
            tracing::debug!(swept = before - stores.len(), "Expired sessions removed");
        }

        if let Some(id) = existing {
            if let Some(entry) = stores.get_mut(&id) {
                let session = entry.store.set_session(data)?.clone();
                entry.expires_at = expires_at;
                return Ok((id, session));
            }
        }

        let mut store = SessionStore::new();
        let session = store.set_session(data)?.clone();
        let id = Uuid::new_v4();
        stores.insert(id, RegisteredSession { store, expires_at });
        Ok((id, session))
    }

    /// get
    ///
    /// Current session for `id`, extending its expiry. Unknown and expired ids yield
    /// the anonymous sentinel.
    pub async fn get(&self, id: Uuid) -> Session {
        let now = Utc::now();
        let mut stores = self.stores.write().await;
        let Some(entry) = stores.get_mut(&id) else {
            return Session::Anonymous;
        };
        if !entry.is_expired(now) {
            entry.expires_at = self.expiry_from(now);
            return entry.store.current().clone();
        }

        stores.remove(&id);
        tracing::debug!(session_id = %id, "Session expired");
        Session::Anonymous
    }

    /// close
    ///
    /// Logs the session out and forgets it. Returns whether the id was known.
    pub async fn close(&self, id: Uuid) -> bool {
        let mut stores = self.stores.write().await;
        match stores.remove(&id) {
            Some(mut entry) => {
                entry.store.clear_session();
                true
            }
            None => false,
        }
    }

    /// Number of registered sessions, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.stores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stores.read().await.is_empty()
    }
}

/// CurrentSession
///
/// Extractor resolving the `x-session-id` header to the caller's session. A missing,
/// malformed or unknown id yields the anonymous session, so this never rejects;
/// deciding what an anonymous caller may see is the guard's job.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: Option<Uuid>,
    pub session: Session,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SessionRegistry: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

        let session = match id {
            Some(id) => SessionRegistry::from_ref(state).get(id).await,
            None => Session::Anonymous,
        };

        Ok(CurrentSession { id, session })
    }
}
