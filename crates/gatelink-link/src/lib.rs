//! Serial link management for the gatelink access gateway.
//!
//! This crate owns the physical connection to the access controller. It
//! opens and closes the serial port, keeps it open across cable pulls and
//! device resets, and is the single path through which acknowledgements are
//! written back to the device.
//!
//! # Design Philosophy
//!
//! - **Single owner**: the port handle lives inside one actor task
//!   ([`ConnectionSupervisor`]); callers talk to it through a cloneable
//!   [`SupervisorHandle`]. Nothing else can open, close or write the port.
//! - **Blocking at the edges**: serial drivers are blocking. Opens and writes
//!   run on `spawn_blocking`, reads on a dedicated thread per open link.
//! - **Swappable drivers**: [`SerialBackend`] hides the driver. Production
//!   uses [`SystemSerial`]; tests use [`MockSerial`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatelink_core::{AckByte, LinkConfig};
//! use gatelink_link::{ConnectionSupervisor, SystemSerial};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LinkConfig::new("/dev/ttyACM0");
//!     let (link, mut frames) =
//!         ConnectionSupervisor::spawn(Arc::new(SystemSerial::new()), config, 64);
//!
//!     if link.connect("/dev/ttyACM0").await {
//!         if let Some(chunk) = frames.recv().await {
//!             println!("received {} bytes", chunk.bytes.len());
//!             let _ = link.send(AckByte::Denied).await;
//!         }
//!     }
//!
//!     link.shutdown().await;
//! }
//! ```

pub mod error;
pub mod mock;
pub mod serial;
pub mod supervisor;
pub mod traits;

pub use error::{LinkError, Result};
pub use mock::{MockSerial, MockSerialHandle};
pub use serial::SystemSerial;
pub use supervisor::{ConnectionSupervisor, LinkChunk, SupervisorHandle};
pub use traits::{LinkReader, LinkWriter, SerialBackend};
