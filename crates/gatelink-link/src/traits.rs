//! Serial driver abstraction.
//!
//! The supervisor never touches a driver directly; it goes through
//! [`SerialBackend`] so the real `serialport` driver and the in-process mock
//! are interchangeable. Driver calls are blocking and are only ever made from
//! `spawn_blocking` or the dedicated reader thread.

use crate::error::Result;
use gatelink_core::LinkConfig;
use std::io::{Read, Write};

/// Read half of an open link.
///
/// Reads must honour the configured read timeout and report it as
/// [`std::io::ErrorKind::TimedOut`] so the reader thread can observe its stop
/// flag.
pub type LinkReader = Box<dyn Read + Send>;

/// Write half of an open link.
pub type LinkWriter = Box<dyn Write + Send>;

/// A serial driver.
///
/// Object-safe so the supervisor can hold an `Arc<dyn SerialBackend>`.
pub trait SerialBackend: Send + Sync + 'static {
    /// Open the port described by `config`, returning independent read and
    /// write halves.
    fn open(&self, config: &LinkConfig) -> Result<(LinkReader, LinkWriter)>;

    /// Enumerate host-visible serial endpoints.
    fn available_ports(&self) -> Result<Vec<String>>;
}
