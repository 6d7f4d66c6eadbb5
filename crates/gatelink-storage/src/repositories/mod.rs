//! Repository traits and their SQLite implementations.
//!
//! [`TokenRepository`] and [`AccessLogRepository`] are the two operations the
//! access pipeline depends on. Their futures are `Send` so the pipeline can
//! drive them from spawned tasks.

pub mod access_log;
pub mod token;
pub mod user;

pub use access_log::{AccessLogRepository, SqliteAccessLogRepository};
pub use token::{SqliteTokenRepository, TokenRepository};
pub use user::{SqliteUserRepository, UserRepository};
