use crate::error::StorageResult;
use crate::models::RfidToken;
use crate::models::token::TokenWithOwner;
use gatelink_core::AccessToken;
use sqlx::SqlitePool;
use std::future::Future;

/// Token lookup used by the access decision.
pub trait TokenRepository: Send + Sync {
    /// Find a token and its owner by code. `Ok(None)` when the code is unknown.
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = StorageResult<Option<AccessToken>>> + Send;

    /// Register a new token.
    fn create(&self, token: &RfidToken) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Enable or disable a token.
    fn set_active(&self, id: i64, active: bool) -> impl Future<Output = StorageResult<()>> + Send;
}

/// SQLite implementation of TokenRepository
#[derive(Debug, Clone)]
pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TokenRepository for SqliteTokenRepository {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<AccessToken>> {
        let row = sqlx::query_as::<_, TokenWithOwner>(
            r#"
            SELECT t.id, t.rfid_code, t.is_active,
                   u.id AS owner_id, u.name AS owner_name, u.is_active AS owner_active
            FROM rfid_tokens t
            LEFT JOIN users u ON u.id = t.user_id
            WHERE t.rfid_code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccessToken::from))
    }

    async fn create(&self, token: &RfidToken) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO rfid_tokens (user_id, rfid_code, is_active, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(token.user_id)
        .bind(&token.rfid_code)
        .bind(token.is_active)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE rfid_tokens SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::StorageError::not_found("RfidToken", "id", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use crate::connection::Database;
    use crate::models::User;
    use crate::repositories::user::{SqliteUserRepository, UserRepository};

    async fn setup() -> (Database, SqliteTokenRepository, SqliteUserRepository) {
        let db = Database::in_memory().await.unwrap();
        let tokens = SqliteTokenRepository::new(db.pool().clone());
        let users = SqliteUserRepository::new(db.pool().clone());
        (db, tokens, users)
    }

    #[tokio::test]
    async fn test_find_unknown_code() {
        let (_db, tokens, _users) = setup().await;
        assert_eq!(tokens.find_by_code("DEADBEEF").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_with_owner() {
        let (_db, tokens, users) = setup().await;
        let owner = users.create(&User::new("Ada Lovelace")).await.unwrap();
        let id = tokens
            .create(&RfidToken::new("AB12CD34", Some(owner)))
            .await
            .unwrap();

        let token = tokens.find_by_code("AB12CD34").await.unwrap().unwrap();
        assert_eq!(token.id, id);
        assert_eq!(token.code, "AB12CD34");
        assert!(token.active);
        assert!(token.owner_active());
        assert_eq!(token.owner_name(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_find_is_case_sensitive() {
        let (_db, tokens, _users) = setup().await;
        tokens
            .create(&RfidToken::new("AB12CD34", None))
            .await
            .unwrap();

        assert!(tokens.find_by_code("ab12cd34").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_inactive_owner() {
        let (_db, tokens, users) = setup().await;
        let owner = users.create(&User::new("Bob").inactive()).await.unwrap();
        tokens
            .create(&RfidToken::new("0004521337", Some(owner)))
            .await
            .unwrap();

        let token = tokens.find_by_code("0004521337").await.unwrap().unwrap();
        assert!(token.active);
        assert!(!token.owner_active());
    }

    #[tokio::test]
    async fn test_deleted_owner_becomes_none() {
        let (db, tokens, users) = setup().await;
        let owner = users.create(&User::new("Eve")).await.unwrap();
        tokens
            .create(&RfidToken::new("EEEE0000", Some(owner)))
            .await
            .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(owner)
            .execute(db.pool())
            .await
            .unwrap();

        let token = tokens.find_by_code("EEEE0000").await.unwrap().unwrap();
        assert!(token.owner.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let (_db, tokens, _users) = setup().await;
        tokens.create(&RfidToken::new("AB12CD34", None)).await.unwrap();

        let result = tokens.create(&RfidToken::new("AB12CD34", None)).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[tokio::test]
    async fn test_set_active() {
        let (_db, tokens, _users) = setup().await;
        let id = tokens.create(&RfidToken::new("AB12CD34", None)).await.unwrap();

        tokens.set_active(id, false).await.unwrap();
        let token = tokens.find_by_code("AB12CD34").await.unwrap().unwrap();
        assert!(!token.active);

        let missing = tokens.set_active(999, true).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
    }
}
