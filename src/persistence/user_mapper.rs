/// User accounts as seen by authentication
///
/// Login reads the password hash from here, and the JWT middleware reloads
/// the account on every protected request so that roles and the active flag
/// come from the store rather than from the token.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AppError;
use crate::persistence::session::SessionFactory;

const FIND_CREDENTIALS: &str = "user.find_credentials";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub user_id: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub is_active: bool,
}

#[async_trait]
pub trait UserMapper: Send + Sync {
    /// Account of `user_id`, if it exists
    async fn find_credentials(&self, user_id: &str) -> Result<Option<UserCredentials>, AppError>;
}

/// PostgreSQL-backed mapper using the `user.*` statements
pub struct PgUserMapper {
    session: SessionFactory,
}

impl PgUserMapper {
    pub fn new(session: SessionFactory) -> Self {
        Self { session }
    }
}

#[async_trait]
impl UserMapper for PgUserMapper {
    async fn find_credentials(&self, user_id: &str) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query_as::<_, (String, String, Vec<String>, bool)>(
            self.session.statement(FIND_CREDENTIALS)?,
        )
        .bind(user_id)
        .fetch_optional(self.session.pool())
        .await?;

        Ok(row.map(|(user_id, password_hash, roles, is_active)| UserCredentials {
            user_id,
            password_hash,
            roles,
            is_active,
        }))
    }
}

/// Accounts kept in process memory, keyed by user id
#[derive(Default)]
pub struct InMemoryUserMapper {
    users: RwLock<HashMap<String, UserCredentials>>,
}

impl InMemoryUserMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the account of `user.user_id`
    pub fn insert(&self, user: UserCredentials) -> Result<(), AppError> {
        let mut users = self.users.write().map_err(poisoned)?;
        users.insert(user.user_id.clone(), user);
        Ok(())
    }

    /// Flip the active flag of an existing account
    pub fn set_active(&self, user_id: &str, is_active: bool) -> Result<(), AppError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if let Some(user) = users.get_mut(user_id) {
            user.is_active = is_active;
        }
        Ok(())
    }

    pub fn remove(&self, user_id: &str) -> Result<(), AppError> {
        self.users.write().map_err(poisoned)?.remove(user_id);
        Ok(())
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("user store lock poisoned".to_string())
}

#[async_trait]
impl UserMapper for InMemoryUserMapper {
    async fn find_credentials(&self, user_id: &str) -> Result<Option<UserCredentials>, AppError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(user_id).cloned())
    }
}
