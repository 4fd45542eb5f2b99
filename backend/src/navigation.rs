use std::collections::HashSet;

use crate::{models::Role, session::Session};

/// Where anonymous callers are sent.
pub const LOGIN_PATH: &str = "/login";

/// RouteEntry
///
/// One dashboard: the role that calls it home, its path, and every role allowed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub role: Role,
    pub path: &'static str,
    pub title: &'static str,
    pub allowed: &'static [Role],
}

impl RouteEntry {
    fn for_role(role: Role) -> Self {
        // A new role needs an arm here before it can compile.
        let (path, title, allowed): (&'static str, &'static str, &'static [Role]) = match role {
            Role::Citizen => ("/citizen/dashboard", "Citizen Dashboard", &[Role::Citizen]),
            Role::Staff => ("/staff/dashboard", "Staff Dashboard", &[Role::Staff]),
            Role::DepartmentHead => (
                "/department-head/dashboard",
                "Department Head Dashboard",
                &[Role::DepartmentHead],
            ),
            Role::Admin => (
                "/admin/dashboard",
                "Admin Dashboard",
                &[Role::Admin, Role::SuperAdmin],
            ),
            Role::Commissioner => (
                "/commissioner/dashboard",
                "Commissioner Dashboard",
                &[Role::Commissioner],
            ),
            Role::SuperAdmin => (
                "/super-admin/dashboard",
                "Super Admin Dashboard",
                &[Role::SuperAdmin],
            ),
        };
        Self {
            role,
            path,
            title,
            allowed,
        }
    }

    /// The `{slug}` segment used by `/dashboards/{slug}`, e.g. `department-head`.
    pub fn slug(&self) -> &'static str {
        self.path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
    }
}

/// Decision
///
/// Outcome of a guard check: render the entry, or send the caller elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(RouteEntry),
    Redirect(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// The path the caller ends up on.
    pub fn location(&self) -> &'static str {
        match self {
            Decision::Allow(entry) => entry.path,
            Decision::Redirect(to) => to,
        }
    }
}

/// RouteTableError
///
/// Configuration problems found by `RouteTable::validate`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("role {0} has no dashboard")]
    MissingRole(Role),
    #[error("role {0} has more than one dashboard")]
    DuplicateRole(Role),
    #[error("path {0} is claimed by more than one role")]
    DuplicatePath(&'static str),
}

/// RouteTable
///
/// The static role to dashboard mapping. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RouteTable {
    /// One dashboard per role.
    pub fn standard() -> Self {
        Self {
            entries: Role::ALL.into_iter().map(RouteEntry::for_role).collect(),
        }
    }

    /// Table from arbitrary entries; call `validate` before trusting it.
    pub fn from_entries(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// validate
    ///
    /// Every role must own exactly one entry and no two entries may share a path.
    pub fn validate(&self) -> Result<(), RouteTableError> {
        let mut seen_roles = HashSet::new();
        let mut seen_paths = HashSet::new();
        for entry in &self.entries {
            if !seen_roles.insert(entry.role) {
                return Err(RouteTableError::DuplicateRole(entry.role));
            }
            if !seen_paths.insert(entry.path) {
                return Err(RouteTableError::DuplicatePath(entry.path));
            }
        }
        match Role::ALL.into_iter().find(|role| !seen_roles.contains(role)) {
            Some(missing) => Err(RouteTableError::MissingRole(missing)),
            None => Ok(()),
        }
    }

    pub fn entry_for_role(&self, role: Role) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.role == role)
    }

    /// Looks a path up, ignoring a trailing slash.
    pub fn entry_for_path(&self, path: &str) -> Option<&RouteEntry> {
        let wanted = normalize_path(path);
        self.entries.iter().find(|entry| entry.path == wanted)
    }

    pub fn entry_for_slug(&self, slug: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.slug() == slug)
    }

    /// default_destination
    ///
    /// The role's own dashboard, or the login page when there is no role.
    pub fn default_destination(&self, role: Option<Role>) -> &'static str {
        role.and_then(|role| self.entry_for_role(role))
            .map(|entry| entry.path)
            .unwrap_or(LOGIN_PATH)
    }

    /// Default destination for whoever holds `session`.
    pub fn home_for(&self, session: &Session) -> &'static str {
        self.default_destination(session.role())
    }

    /// authorize
    ///
    /// Guard check for `path`. Anonymous callers are always sent to login; signed-in
    /// callers without access (or asking for an unknown path) go to their own dashboard.
    pub fn authorize(&self, path: &str, session: &Session) -> Decision {
        match self.entry_for_path(path) {
            Some(entry) if session.has_any_role(entry.allowed) => Decision::Allow(entry.clone()),
            _ => self.deny(session),
        }
    }

    /// The redirect a denied caller receives.
    pub fn deny(&self, session: &Session) -> Decision {
        Decision::Redirect(self.home_for(session))
    }
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/')
    } else {
        trimmed
    }
}
