//! Integration tests for database connection and pooling.

use gatelink_core::{AccessDecision, DenialReason};
use gatelink_storage::{
    AccessLog, AccessLogRepository, Database, DatabaseConfig, SqliteAccessLogRepository,
};
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_in_memory_database() {
    let db = Database::in_memory().await.unwrap();
    db.health_check().await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_file_database_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("gatelink.db");

    let db = Database::new(DatabaseConfig::new(path.to_string_lossy()).min_connections(1))
        .await
        .unwrap();
    db.health_check().await.unwrap();
    db.close().await;

    assert!(path.exists());
}

#[tokio::test]
async fn test_file_database_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gatelink.db").to_string_lossy().to_string();

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let logs = SqliteAccessLogRepository::new(db.pool().clone());
    let decision =
        AccessDecision::deny(DenialReason::InvalidToken, "DEADBEEF", None, chrono::Utc::now());
    logs.append(&AccessLog::from_decision(&decision)).await.unwrap();
    db.close().await;

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let logs = SqliteAccessLogRepository::new(db.pool().clone());
    assert_eq!(logs.count().await.unwrap(), 1);
    db.close().await;
}

#[tokio::test]
async fn test_concurrent_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gatelink.db").to_string_lossy().to_string();
    let db = Database::new(DatabaseConfig::new(&path).max_connections(4))
        .await
        .unwrap();

    const NUM_CONCURRENT_TASKS: usize = 10;
    let barrier = Arc::new(Barrier::new(NUM_CONCURRENT_TASKS));
    let repo = Arc::new(SqliteAccessLogRepository::new(db.pool().clone()));

    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_TASKS {
        let repo = Arc::clone(&repo);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let decision = AccessDecision::deny(
                DenialReason::InvalidToken,
                format!("CODE{i:04}"),
                None,
                chrono::Utc::now(),
            );
            repo.append(&AccessLog::from_decision(&decision)).await
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(repo.count().await.unwrap(), NUM_CONCURRENT_TASKS as i64);
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();

    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    let result: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='access_logs'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();

    assert_eq!(result.0, 1);
    db.close().await;
}
