use crate::error::StorageResult;
use crate::models::AccessLog;
use sqlx::SqlitePool;
use std::future::Future;

/// Repository trait for the access log
///
/// `append` is the only write the access pipeline performs; the queries
/// exist for inspection and tests.
pub trait AccessLogRepository: Send + Sync {
    /// Append one entry, returning its id
    fn append(&self, log: &AccessLog) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Most recent entries first
    fn recent(&self, limit: i64) -> impl Future<Output = StorageResult<Vec<AccessLog>>> + Send;

    /// Entries for one presented code, most recent first
    fn find_by_code(
        &self,
        rfid_code: &str,
        limit: i64,
    ) -> impl Future<Output = StorageResult<Vec<AccessLog>>> + Send;

    /// Total number of entries
    fn count(&self) -> impl Future<Output = StorageResult<i64>> + Send;
}

/// SQLite implementation of AccessLogRepository
#[derive(Debug, Clone)]
pub struct SqliteAccessLogRepository {
    pool: SqlitePool,
}

impl SqliteAccessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AccessLogRepository for SqliteAccessLogRepository {
    async fn append(&self, log: &AccessLog) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_logs (
                rfid_token_id, rfid_code, access_status, is_granted,
                denied_reason, owner_name, access_time, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.rfid_token_id)
        .bind(&log.rfid_code)
        .bind(&log.access_status)
        .bind(log.is_granted)
        .bind(&log.denied_reason)
        .bind(&log.owner_name)
        .bind(log.access_time)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<AccessLog>> {
        let logs = sqlx::query_as::<_, AccessLog>(
            r#"
            SELECT id, rfid_token_id, rfid_code, access_status, is_granted,
                   denied_reason, owner_name, access_time, created_at
            FROM access_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn find_by_code(&self, rfid_code: &str, limit: i64) -> StorageResult<Vec<AccessLog>> {
        let logs = sqlx::query_as::<_, AccessLog>(
            r#"
            SELECT id, rfid_token_id, rfid_code, access_status, is_granted,
                   denied_reason, owner_name, access_time, created_at
            FROM access_logs
            WHERE rfid_code = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(rfid_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn count(&self) -> StorageResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0)
    }
}
