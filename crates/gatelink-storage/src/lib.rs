//! Persistence for the gatelink access gateway.
//!
//! SQLite-backed storage for token owners, RFID tokens and the access log.
//! The access pipeline needs exactly two operations from this crate:
//!
//! - [`TokenRepository::find_by_code`]: token plus owner for a presented code
//! - [`AccessLogRepository::append`]: write one decision
//!
//! Everything else (user and token creation, log queries) exists so the
//! database can be seeded and inspected.
//!
//! # Example
//!
//! ```no_run
//! use gatelink_storage::{Database, DatabaseConfig, SqliteTokenRepository, TokenRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("gatelink.db")).await?;
//! let tokens = SqliteTokenRepository::new(db.pool().clone());
//!
//! if let Some(token) = tokens.find_by_code("AB12CD34").await? {
//!     println!("token {} owned by {:?}", token.id, token.owner_name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All queries use parameterized statements. Migrations are embedded at
//! compile time and applied by [`Database::migrate`].

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{AccessLog, RfidToken, User};
pub use repositories::{
    AccessLogRepository, SqliteAccessLogRepository, SqliteTokenRepository, SqliteUserRepository,
    TokenRepository, UserRepository,
};
