//! In-process serial driver for tests and development.
//!
//! [`MockSerial`] implements [`SerialBackend`]; the paired [`MockSerialHandle`]
//! plays the device side: it plugs and unplugs the port, pushes lines towards
//! the host and observes what the host writes back.
//!
//! Like an exclusive serial device, a port stays busy until both the reader
//! and the writer half of its link have been dropped.

use crate::error::{LinkError, Result};
use crate::traits::{LinkReader, LinkWriter, SerialBackend};
use gatelink_core::LinkConfig;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc as std_mpsc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Default port exposed by a fresh mock.
pub const MOCK_PORT: &str = "/dev/ttyMOCK0";

#[derive(Debug)]
enum DeviceInput {
    Data(Vec<u8>),
    Unplug,
}

#[derive(Debug)]
struct OpenLink {
    id: u64,
    port: String,
    input: std_mpsc::Sender<DeviceInput>,
    alive: Arc<AtomicBool>,
}

#[derive(Debug)]
struct MockState {
    ports: Vec<String>,
    plugged: bool,
    fail_writes: bool,
    open_count: usize,
    next_id: u64,
    current: Option<OpenLink>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    // A panic while holding the lock only happens inside a failing test.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Claim on an open port, shared by both halves of a link.
#[derive(Debug)]
struct PortLease {
    id: u64,
    state: Shared,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.current.as_ref().is_some_and(|link| link.id == self.id) {
            state.current = None;
        }
    }
}

/// Simulated serial driver.
///
/// # Examples
///
/// ```
/// use gatelink_link::mock::{MockSerial, MOCK_PORT};
/// use gatelink_link::traits::SerialBackend;
/// use gatelink_core::LinkConfig;
///
/// let (serial, handle) = MockSerial::new();
/// assert!(serial.open(&LinkConfig::new(MOCK_PORT)).is_ok());
/// assert!(handle.is_open());
///
/// handle.unplug();
/// assert!(serial.open(&LinkConfig::new(MOCK_PORT)).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MockSerial {
    state: Shared,
    written_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MockSerial {
    /// Create a mock exposing [`MOCK_PORT`], plugged in.
    pub fn new() -> (Self, MockSerialHandle) {
        Self::with_ports([MOCK_PORT])
    }

    /// Create a mock exposing the given ports.
    pub fn with_ports<I, S>(ports: I) -> (Self, MockSerialHandle)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = Arc::new(Mutex::new(MockState {
            ports: ports.into_iter().map(Into::into).collect(),
            plugged: true,
            fail_writes: false,
            open_count: 0,
            next_id: 0,
            current: None,
        }));
        let (written_tx, written_rx) = mpsc::unbounded_channel();

        let serial = Self {
            state: Arc::clone(&state),
            written_tx,
        };
        let handle = MockSerialHandle { state, written_rx };

        (serial, handle)
    }
}

impl SerialBackend for MockSerial {
    fn open(&self, config: &LinkConfig) -> Result<(LinkReader, LinkWriter)> {
        let mut state = lock(&self.state);

        if !state.plugged {
            return Err(LinkError::open_failed(&config.port_name, "device not present"));
        }
        if !state.ports.contains(&config.port_name) {
            return Err(LinkError::open_failed(
                &config.port_name,
                "No such file or directory",
            ));
        }
        if state.current.is_some() {
            return Err(LinkError::open_failed(&config.port_name, "port is busy"));
        }

        let (input, input_rx) = std_mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let id = state.next_id;
        state.next_id += 1;
        state.open_count += 1;
        state.current = Some(OpenLink {
            id,
            port: config.port_name.clone(),
            input,
            alive: Arc::clone(&alive),
        });

        let lease = Arc::new(PortLease {
            id,
            state: Arc::clone(&self.state),
        });
        let reader = MockReader {
            input: input_rx,
            pending: Vec::new(),
            timeout: config.read_timeout(),
            _lease: Arc::clone(&lease),
        };
        let writer = MockWriter {
            state: Arc::clone(&self.state),
            alive,
            written_tx: self.written_tx.clone(),
            _lease: lease,
        };

        Ok((Box::new(reader), Box::new(writer)))
    }

    fn available_ports(&self) -> Result<Vec<String>> {
        let state = lock(&self.state);
        if state.plugged {
            Ok(state.ports.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

struct MockReader {
    input: std_mpsc::Receiver<DeviceInput>,
    pending: Vec<u8>,
    timeout: Duration,
    _lease: Arc<PortLease>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.input.recv_timeout(self.timeout) {
                Ok(DeviceInput::Data(data)) => self.pending = data,
                Ok(DeviceInput::Unplug) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "device disconnected",
                    ));
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct MockWriter {
    state: Shared,
    alive: Arc<AtomicBool>,
    written_tx: mpsc::UnboundedSender<Vec<u8>>,
    _lease: Arc<PortLease>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            ));
        }
        if lock(&self.state).fail_writes {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        // The receiving handle may be gone in tests that never inspect writes.
        let _ = self.written_tx.send(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Device-side controller for a [`MockSerial`].
#[derive(Debug)]
pub struct MockSerialHandle {
    state: Shared,
    written_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockSerialHandle {
    /// Send one line to the host. A `\n` terminator is appended.
    ///
    /// Returns `false` if no link is open.
    pub fn send_line(&self, line: &str) -> bool {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.send_bytes(&bytes)
    }

    /// Send raw bytes to the host.
    ///
    /// Returns `false` if no link is open.
    pub fn send_bytes(&self, bytes: &[u8]) -> bool {
        let state = lock(&self.state);
        match &state.current {
            Some(link) => link.input.send(DeviceInput::Data(bytes.to_vec())).is_ok(),
            None => false,
        }
    }

    /// Pull the cable: the open link fails and the port cannot be reopened
    /// until [`plug`](Self::plug) is called.
    pub fn unplug(&self) {
        let mut state = lock(&self.state);
        state.plugged = false;
        if let Some(link) = state.current.take() {
            link.alive.store(false, Ordering::Release);
            let _ = link.input.send(DeviceInput::Unplug);
        }
    }

    /// Reconnect the cable.
    pub fn plug(&self) {
        lock(&self.state).plugged = true;
    }

    /// Make subsequent writes fail with a timeout.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Expose an additional port.
    pub fn add_port(&self, port: impl Into<String>) {
        lock(&self.state).ports.push(port.into());
    }

    /// Whether the host currently holds the port open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).current.is_some()
    }

    /// Port the host currently holds open.
    pub fn open_port(&self) -> Option<String> {
        lock(&self.state).current.as_ref().map(|link| link.port.clone())
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Wait for the next write from the host.
    pub async fn next_write(&mut self) -> Option<Vec<u8>> {
        self.written_rx.recv().await
    }

    /// Drain every write received so far without waiting.
    pub fn take_writes(&mut self) -> Vec<Vec<u8>> {
        let mut writes = Vec::new();
        while let Ok(write) = self.written_rx.try_recv() {
            writes.push(write);
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinkConfig {
        LinkConfig::new(MOCK_PORT).read_timeout_ms(20)
    }

    #[test]
    fn test_open_and_read_line() {
        let (serial, handle) = MockSerial::new();
        let (mut reader, _writer) = serial.open(&config()).unwrap();

        assert!(handle.send_line("RFID:AB12CD34"));

        let mut buf = [0u8; 64];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"RFID:AB12CD34\n");
    }

    #[test]
    fn test_read_times_out_without_data() {
        let (serial, _handle) = MockSerial::new();
        let (mut reader, _writer) = serial.open(&config()).unwrap();

        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_small_buffer_reads_in_pieces() {
        let (serial, handle) = MockSerial::new();
        let (mut reader, _writer) = serial.open(&config()).unwrap();
        handle.send_bytes(b"ABCDEF");

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ABCD");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"EF");
    }

    #[tokio::test]
    async fn test_writes_are_captured() {
        let (serial, mut handle) = MockSerial::new();
        let (_reader, mut writer) = serial.open(&config()).unwrap();

        writer.write_all(b"A\n").unwrap();
        assert_eq!(handle.next_write().await.unwrap(), b"A\n");
    }

    #[test]
    fn test_unplug_breaks_link_and_blocks_reopen() {
        let (serial, handle) = MockSerial::new();
        let (mut reader, mut writer) = serial.open(&config()).unwrap();

        handle.unplug();
        assert!(!handle.is_open());

        let mut buf = [0u8; 8];
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert_eq!(
            writer.write(b"A\n").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert!(serial.open(&config()).is_err());
        assert!(serial.available_ports().unwrap().is_empty());

        handle.plug();
        assert!(serial.open(&config()).is_ok());
        assert_eq!(handle.open_count(), 2);
    }

    #[test]
    fn test_port_held_until_both_halves_drop() {
        let (serial, handle) = MockSerial::new();
        let (reader, writer) = serial.open(&config()).unwrap();
        assert_eq!(handle.open_port().as_deref(), Some(MOCK_PORT));

        drop(writer);
        assert!(handle.is_open());
        assert!(serial.open(&config()).is_err());

        drop(reader);
        assert!(!handle.is_open());
        assert!(!handle.send_line("RFID:AB12CD34"));
        assert!(serial.open(&config()).is_ok());
    }

    #[test]
    fn test_dropping_reader_alone_keeps_port_busy() {
        let (serial, handle) = MockSerial::new();
        let (reader, _writer) = serial.open(&config()).unwrap();

        drop(reader);
        assert!(handle.is_open());
        assert!(serial.open(&config()).is_err());
    }

    #[test]
    fn test_busy_and_unknown_ports_fail() {
        let (serial, _handle) = MockSerial::new();
        let _link = serial.open(&config()).unwrap();

        assert!(serial.open(&config()).is_err());
        assert!(serial.open(&LinkConfig::new("/dev/ttyNOPE")).is_err());
    }

    #[test]
    fn test_failing_writes() {
        let (serial, handle) = MockSerial::new();
        let (_reader, mut writer) = serial.open(&config()).unwrap();

        handle.fail_writes(true);
        assert_eq!(
            writer.write(b"N\n").unwrap_err().kind(),
            io::ErrorKind::TimedOut
        );
    }
}
