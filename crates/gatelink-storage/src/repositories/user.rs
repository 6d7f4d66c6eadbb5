use crate::error::{StorageError, StorageResult};
use crate::models::User;
use sqlx::SqlitePool;
use std::future::Future;

/// Repository trait for token owners
pub trait UserRepository: Send + Sync {
    /// Find a user by primary key
    fn find_by_id(&self, id: i64) -> impl Future<Output = StorageResult<Option<User>>> + Send;

    /// Create a new user, returning its id
    fn create(&self, user: &User) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Enable or disable a user
    fn set_active(&self, id: i64, active: bool) -> impl Future<Output = StorageResult<()>> + Send;
}

/// SQLite implementation of UserRepository
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, is_active, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, phone, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", "id", id));
        }
        Ok(())
    }
}
