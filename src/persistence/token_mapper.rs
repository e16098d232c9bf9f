/// Persisted token records.
///
/// A record ties a user to the access token currently valid for them.
/// Validation looks records up by the raw token string and requires an
/// exact match.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AppError;
use crate::persistence::session::SessionFactory;

const FIND_BY_ACCESS_TOKEN: &str = "user_token.find_by_access_token";
const UPSERT: &str = "user_token.upsert";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(user_id: &str, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token,
            refresh_token,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TokenMapper: Send + Sync {
    /// Record whose access token is `token`, if any
    async fn get_token_record(&self, token: &str) -> Result<Option<TokenRecord>, AppError>;

    /// Insert or replace the record of `record.user_id`
    async fn save_token_record(&self, record: &TokenRecord) -> Result<(), AppError>;
}

/// PostgreSQL-backed mapper using the `user_token.*` statements
pub struct PgTokenMapper {
    session: SessionFactory,
}

impl PgTokenMapper {
    pub fn new(session: SessionFactory) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenMapper for PgTokenMapper {
    async fn get_token_record(&self, token: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, DateTime<Utc>)>(
            self.session.statement(FIND_BY_ACCESS_TOKEN)?,
        )
        .bind(token)
        .fetch_optional(self.session.pool())
        .await?;

        Ok(row.map(
            |(user_id, access_token, refresh_token, updated_at)| TokenRecord {
                user_id,
                access_token,
                refresh_token,
                updated_at,
            },
        ))
    }

    async fn save_token_record(&self, record: &TokenRecord) -> Result<(), AppError> {
        sqlx::query(self.session.statement(UPSERT)?)
            .bind(&record.user_id)
            .bind(&record.access_token)
            .bind(&record.refresh_token)
            .bind(record.updated_at)
            .execute(self.session.pool())
            .await?;

        tracing::debug!(user_id = %record.user_id, "Token record saved");
        Ok(())
    }
}

/// Mapper kept in process memory, keyed by user id
#[derive(Default)]
pub struct InMemoryTokenMapper {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("token store lock poisoned".to_string())
}

#[async_trait]
impl TokenMapper for InMemoryTokenMapper {
    async fn get_token_record(&self, token: &str) -> Result<Option<TokenRecord>, AppError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .find(|record| record.access_token == token)
            .cloned())
    }

    async fn save_token_record(&self, record: &TokenRecord) -> Result<(), AppError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup_requires_exact_token() {
        let mapper = InMemoryTokenMapper::new();
        let record = TokenRecord::new("user42", "abc.def.ghi".to_string(), None);
        mapper.save_token_record(&record).await.unwrap();

        assert_eq!(mapper.get_token_record("abc.def.ghi").await.unwrap(), Some(record));
        assert!(mapper.get_token_record("abc.def.gh").await.unwrap().is_none());
        assert!(mapper.get_token_record("abc.def.ghiX").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_save_replaces_previous_token_of_user() {
        let mapper = InMemoryTokenMapper::new();
        mapper
            .save_token_record(&TokenRecord::new("user42", "old".to_string(), None))
            .await
            .unwrap();
        mapper
            .save_token_record(&TokenRecord::new(
                "user42",
                "new".to_string(),
                Some("refresh".to_string()),
            ))
            .await
            .unwrap();

        assert!(mapper.get_token_record("old").await.unwrap().is_none());
        let current = mapper.get_token_record("new").await.unwrap().unwrap();
        assert_eq!(current.refresh_token.as_deref(), Some("refresh"));
    }
}
