use civic_portal::{
    models::{Role, SessionData, SessionView},
    session::{Session, SessionError, SessionRegistry, SessionStore},
};
use std::time::Duration;
use uuid::Uuid;

// --- Helpers ---

const DEPARTMENT: Uuid = Uuid::from_u128(42);

fn session_data(role: &str) -> SessionData {
    SessionData {
        user_id: Some(Uuid::from_u128(7)),
        role: role.to_string(),
        department_id: Some(DEPARTMENT),
        email: "clerk@city.gov".to_string(),
        name: "Dana Clerk".to_string(),
        phone: Some("+15550001111".to_string()),
    }
}

// --- SessionStore ---

#[test]
fn test_new_store_is_anonymous() {
    let store = SessionStore::new();
    assert_eq!(store.current(), &Session::Anonymous);
    assert_eq!(store.view(), SessionView::default());
    assert!(!store.view().is_authenticated);
}

#[test]
fn test_set_session_authenticates() {
    let mut store = SessionStore::new();
    let session = store.set_session(session_data("staff")).unwrap().clone();

    assert!(session.is_authenticated());
    assert_eq!(session.role(), Some(Role::Staff));

    let view = store.view();
    assert!(view.is_authenticated);
    assert_eq!(view.user_id, Some(Uuid::from_u128(7)));
    assert_eq!(view.department_id, Some(DEPARTMENT));
    assert_eq!(view.email.as_deref(), Some("clerk@city.gov"));
}

#[test]
fn test_set_session_accepts_frontend_role_spellings() {
    for (raw, expected) in [
        ("DEPARTMENT_HEAD", Role::DepartmentHead),
        ("department-head", Role::DepartmentHead),
        ("Super_Admin", Role::SuperAdmin),
        (" commissioner ", Role::Commissioner),
    ] {
        let mut store = SessionStore::new();
        store.set_session(session_data(raw)).unwrap();
        assert_eq!(store.current().role(), Some(expected), "role {raw:?}");
    }
}

#[test]
fn test_invalid_role_leaves_anonymous_session_untouched() {
    let mut store = SessionStore::new();
    let err = store.set_session(session_data("mayor")).unwrap_err();

    assert_eq!(err, SessionError::InvalidRole("mayor".to_string()));
    assert_eq!(store.current(), &Session::Anonymous);
}

#[test]
fn test_invalid_role_leaves_existing_session_untouched() {
    let mut store = SessionStore::new();
    store.set_session(session_data("admin")).unwrap();
    let before = store.current().clone();

    for bad in ["", "root", "guest", "admins", "super admin"] {
        assert!(store.set_session(session_data(bad)).is_err(), "{bad:?} accepted");
        assert_eq!(store.current(), &before);
    }
}

#[test]
fn test_missing_user_is_rejected() {
    let mut store = SessionStore::new();
    store.set_session(session_data("citizen")).unwrap();
    let before = store.current().clone();

    let mut data = session_data("admin");
    data.user_id = None;

    assert_eq!(store.set_session(data), Err(SessionError::MissingUser));
    assert_eq!(store.current(), &before);
}

#[test]
fn test_set_session_replaces_whole_identity() {
    let mut store = SessionStore::new();
    store.set_session(session_data("staff")).unwrap();

    let replacement = SessionData {
        user_id: Some(Uuid::from_u128(8)),
        role: "citizen".to_string(),
        department_id: None,
        email: "resident@mail.com".to_string(),
        name: "Res Ident".to_string(),
        phone: None,
    };
    store.set_session(replacement).unwrap();

    let view = store.view();
    assert_eq!(view.user_id, Some(Uuid::from_u128(8)));
    assert_eq!(view.role, Some(Role::Citizen));
    assert_eq!(view.department_id, None);
    assert_eq!(view.phone, None);
}

#[test]
fn test_has_role_matches_only_own_role() {
    let mut store = SessionStore::new();
    store.set_session(session_data("department_head")).unwrap();

    for role in Role::ALL {
        assert_eq!(store.has_role(role), role == Role::DepartmentHead, "{role}");
    }
    assert!(store.has_any_role(&[Role::Admin, Role::DepartmentHead]));
    assert!(!store.has_any_role(&[Role::Admin, Role::SuperAdmin]));
    assert!(!store.has_any_role(&[]));
}

#[test]
fn test_has_role_false_when_anonymous() {
    let store = SessionStore::new();
    for role in Role::ALL {
        assert!(!store.has_role(role));
    }
    assert!(!store.has_any_role(&Role::ALL));
}

#[test]
fn test_clear_session_revokes_every_role() {
    let mut store = SessionStore::new();
    store.set_session(session_data("super_admin")).unwrap();
    store.clear_session();

    assert_eq!(store.current(), &Session::Anonymous);
    assert!(!store.has_any_role(&Role::ALL));
    assert!(!store.belongs_to_department(DEPARTMENT));

    // Clearing twice is harmless.
    store.clear_session();
    assert_eq!(store.current(), &Session::Anonymous);
}

#[test]
fn test_belongs_to_department() {
    let mut store = SessionStore::new();
    assert!(!store.belongs_to_department(DEPARTMENT));

    store.set_session(session_data("staff")).unwrap();
    assert!(store.belongs_to_department(DEPARTMENT));
    assert!(!store.belongs_to_department(Uuid::from_u128(43)));

    let mut no_department = session_data("staff");
    no_department.department_id = None;
    store.set_session(no_department).unwrap();
    assert!(!store.belongs_to_department(DEPARTMENT));
}

#[test]
fn test_session_view_serializes_camel_case() {
    let mut store = SessionStore::new();
    store.set_session(session_data("department-head")).unwrap();

    let json = serde_json::to_value(store.view()).unwrap();
    assert_eq!(json["isAuthenticated"], true);
    assert_eq!(json["role"], "department_head");
    assert_eq!(json["departmentId"], DEPARTMENT.to_string());
    assert!(json.get("is_authenticated").is_none());
}

// --- SessionRegistry ---

#[tokio::test]
async fn test_registry_open_get_close() {
    let registry = SessionRegistry::new();
    let (id, session) = registry.open(session_data("admin")).await.unwrap();

    assert_eq!(session.role(), Some(Role::Admin));
    assert_eq!(registry.get(id).await, session);
    assert_eq!(registry.len().await, 1);

    assert!(registry.close(id).await);
    assert_eq!(registry.get(id).await, Session::Anonymous);
    assert!(registry.is_empty().await);
    assert!(!registry.close(id).await);
}

#[tokio::test]
async fn test_registry_refuses_invalid_role_without_registering() {
    let registry = SessionRegistry::new();
    let result = registry.open(session_data("janitor")).await;

    assert_eq!(
        result.unwrap_err(),
        SessionError::InvalidRole("janitor".to_string())
    );
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_registry_unknown_id_is_anonymous() {
    let registry = SessionRegistry::new();
    assert_eq!(registry.get(Uuid::new_v4()).await, Session::Anonymous);
}

#[tokio::test]
async fn test_registry_sessions_are_isolated() {
    let registry = SessionRegistry::new();
    let (citizen_id, _) = registry.open(session_data("citizen")).await.unwrap();
    let (admin_id, _) = registry.open(session_data("admin")).await.unwrap();

    registry.close(admin_id).await;

    assert_eq!(registry.get(citizen_id).await.role(), Some(Role::Citizen));
    assert_eq!(registry.get(admin_id).await, Session::Anonymous);
}

#[tokio::test]
async fn test_registry_login_replaces_existing_session_in_place() {
    let registry = SessionRegistry::new();
    let (id, _) = registry.open(session_data("admin")).await.unwrap();

    let mut citizen = session_data("citizen");
    citizen.user_id = Some(Uuid::from_u128(8));
    let (same_id, session) = registry.login(Some(id), citizen).await.unwrap();

    assert_eq!(same_id, id);
    assert_eq!(session.role(), Some(Role::Citizen));
    assert_eq!(registry.get(id).await.role(), Some(Role::Citizen));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_registry_refused_login_keeps_existing_session() {
    let registry = SessionRegistry::new();
    let (id, before) = registry.open(session_data("staff")).await.unwrap();

    let err = registry
        .login(Some(id), session_data("janitor"))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::InvalidRole("janitor".to_string()));
    assert_eq!(registry.get(id).await, before);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_registry_login_with_unknown_id_registers_new_session() {
    let registry = SessionRegistry::new();
    let stale = Uuid::new_v4();

    let (id, _) = registry.login(Some(stale), session_data("citizen")).await.unwrap();

    assert_ne!(id, stale);
    assert_eq!(registry.get(stale).await, Session::Anonymous);
    assert_eq!(registry.len().await, 1);
}

// --- Idle expiry ---

#[tokio::test]
async fn test_registry_idle_session_expires() {
    let registry = SessionRegistry::with_idle_timeout(Duration::from_millis(50));
    let (id, _) = registry.open(session_data("admin")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(registry.get(id).await, Session::Anonymous);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_registry_sweeps_expired_sessions_on_login() {
    let registry = SessionRegistry::with_idle_timeout(Duration::from_millis(50));
    for _ in 0..10 {
        registry.open(session_data("citizen")).await.unwrap();
    }
    assert_eq!(registry.len().await, 10);

    tokio::time::sleep(Duration::from_millis(120)).await;
    registry.open(session_data("staff")).await.unwrap();

    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_registry_use_extends_expiry() {
    let registry = SessionRegistry::with_idle_timeout(Duration::from_millis(400));
    let (id, _) = registry.open(session_data("staff")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(registry.get(id).await.is_authenticated());

    // Past the original deadline, but within the timeout of the last use.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(registry.get(id).await.is_authenticated());
}

#[tokio::test]
async fn test_registry_expired_session_cannot_be_reused_for_login() {
    let registry = SessionRegistry::with_idle_timeout(Duration::from_millis(50));
    let (old, _) = registry.open(session_data("admin")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    let (id, _) = registry.login(Some(old), session_data("citizen")).await.unwrap();

    assert_ne!(id, old);
    assert_eq!(registry.len().await, 1);
}
