use crate::models::UserProfile;
use async_trait::async_trait;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// UserDirectory Trait
///
/// Where portal identities come from. The auth extractor resolves a token subject (or
/// the local `x-user-id` header) to a profile through this trait, so handlers never
/// know whether it is backed by Postgres or by memory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Option<UserProfile>;
}

/// DirectoryState
///
/// The concrete type used to share the directory across the application state.
pub type DirectoryState = Arc<dyn UserDirectory>;

/// PostgresUserDirectory
///
/// Reads profiles from the `public.profiles` table.
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_user(&self, id: Uuid) -> Option<UserProfile> {
        let result = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, name, phone, role, department_id
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(profile) => profile,
            Err(e) => {
                // A lookup failure is treated as "no such user" so auth rejects with 401.
                tracing::error!(user_id = %id, error = %e, "Profile lookup failed");
                None
            }
        }
    }
}

/// InMemoryUserDirectory
///
/// Directory backed by a map, for tests and database-less local runs.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let users = users.into_iter().map(|user| (user.id, user)).collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    pub async fn insert(&self, user: UserProfile) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: Uuid) -> Option<UserProfile> {
        self.users.read().await.get(&id).cloned()
    }
}
