//! # Gatelink Access
//!
//! Access pipeline for an RFID reader attached over a serial link.
//!
//! The device sends one `RFID:<code>` line per card read and expects a single
//! `A` (granted) or `N` (denied) line back. This crate wires the pieces that
//! make that happen:
//!
//! - [`AccessDecisionEngine`]: token lookup, access policy and the access log
//! - [`LinkEventDispatcher`]: framing, parsing and acknowledgement, in arrival
//!   order
//! - [`Gateway`]: owns the link supervisor and the dispatcher task, and shuts
//!   both down with a bounded wait for pending log writes
//!
//! ## Example
//!
//! ```no_run
//! use gatelink_access::{Gateway, GatewayConfig};
//! use gatelink_core::LinkConfig;
//! use gatelink_link::SystemSerial;
//! use gatelink_storage::{Database, DatabaseConfig, SqliteAccessLogRepository, SqliteTokenRepository};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("gatelink.db")).await?;
//!
//! let gateway = Gateway::start(
//!     Arc::new(SystemSerial::new()),
//!     GatewayConfig::new(LinkConfig::new("/dev/ttyUSB0")),
//!     SqliteTokenRepository::new(db.pool().clone()),
//!     SqliteAccessLogRepository::new(db.pool().clone()),
//! )
//! .await?;
//!
//! let mut events = gateway.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//!
//! gateway.shutdown(Duration::from_secs(5)).await?;
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gateway;

pub use dispatcher::{DispatchEvent, LinkEventDispatcher};
pub use engine::{AccessDecisionEngine, LogFailure, evaluate};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayConfig};
