//! SQLite pool setup.
//!
//! File databases run in WAL mode with `synchronous = NORMAL`, so the gateway's
//! log appends never block token lookups from other connections. Foreign keys
//! are enforced on every connection.

use crate::error::{StorageError, StorageResult};
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Pool and file settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file. Missing parent directories are created.
    pub database_path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Connections older than this are recycled.
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
    /// Apply pending migrations when the pool opens.
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "gatelink.db".to_string(),
            max_connections: 4,
            min_connections: 1,
            max_lifetime: Duration::from_secs(1800),
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(10),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }

    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}", self.database_path);
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StorageError::Configuration(format!("Invalid database path: {e}")))?;

        Ok(options
            .create_if_missing(self.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging())
    }
}

/// Shared connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and by default migrate) a file database.
    ///
    /// ```no_run
    /// use gatelink_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("/var/lib/gatelink/gatelink.db")).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!(
                    "Cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await?;

        info!(
            path = %config.database_path,
            max_connections = config.max_connections,
            "Database opened"
        );
        let db = Self { pool };

        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// Migrated in-memory database.
    ///
    /// The pool holds a single connection that is never recycled; closing it
    /// would discard the database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations from this crate's `migrations/` directory,
    /// embedded at compile time. Already applied ones are skipped.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool once checked-out connections are returned.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database closed");
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
