//! Connection supervisor.
//!
//! The supervisor is the only owner of the serial link. It runs as a single
//! actor task; every state change (explicit connect, disconnect, reconnect
//! timer tick, reader exit) is a branch of one `select!` loop and is handled
//! to completion before the next one starts.
//!
//! # Architecture
//!
//! ```text
//!  SupervisorHandle ──commands──►┌──────────────────────┐
//!  (clone per caller)            │  supervisor actor    │──watch──► LinkState
//!                                │                      │
//!  reconnect interval ──tick────►│  link: Option<..>    │──spawn_blocking──► open / write
//!                                │                      │
//!  reader thread ──exit(gen)────►└──────────────────────┘
//!        │
//!        └──LinkChunk{gen, bytes}──► bounded frame queue ──► dispatcher
//! ```
//!
//! Each opened link gets a new generation number. Reader exit notifications
//! and byte chunks carry it, so anything left over from a link that has
//! already been closed is recognizable and ignored.
//!
//! Closing a link joins its reader thread before anything else happens, so
//! the port handle is released before the next `open` and at most one
//! physical connection exists at a time.
//!
//! # Reconnect policy
//!
//! The reconnect timer runs only while the link is `Disconnected` or
//! `Faulted`, auto-reconnect is enabled in the last-known configuration, and
//! the operator has not explicitly disconnected. Attempts repeat at the
//! configured interval with no backoff and no ceiling.

use crate::error::{LinkError, Result};
use crate::traits::{LinkReader, LinkWriter, SerialBackend};
use bytes::{Bytes, BytesMut};
use gatelink_core::{AckByte, LinkConfig, LinkState};
use gatelink_protocol::LineCodec;
use std::io::{ErrorKind, Read, Write};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::codec::Encoder;
use tracing::{debug, error, info, trace, warn};

const READ_BUFFER_SIZE: usize = 256;
const COMMAND_QUEUE_CAPACITY: usize = 32;
/// Reader pause while the frame queue is full.
const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(10);
/// Added to the read timeout when waiting for a reader thread to finish.
const READER_JOIN_SLACK: Duration = Duration::from_millis(250);

/// Raw bytes read from one open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChunk {
    /// Generation of the link the bytes came from.
    pub generation: u64,
    pub bytes: Bytes,
}

enum ConnectTarget {
    Port(String),
    Config(LinkConfig),
}

enum Command {
    Connect {
        target: ConnectTarget,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        ack: AckByte,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct LinkExit {
    generation: u64,
    error: Option<String>,
}

struct ActiveLink {
    generation: u64,
    config: LinkConfig,
    writer: Arc<Mutex<LinkWriter>>,
    stop: Arc<AtomicBool>,
    reader: thread::JoinHandle<()>,
}

impl ActiveLink {
    /// Stop the reader and wait until it has dropped its half of the port.
    ///
    /// The reader notices `stop` within one read timeout; the wait is bounded
    /// by that plus some slack.
    async fn close(self) {
        self.stop.store(true, Ordering::Release);
        drop(self.writer);

        let bound = self.config.read_timeout() + READER_JOIN_SLACK;
        let port = self.config.port_name;
        let generation = self.generation;
        let reader = self.reader;
        let join = tokio::task::spawn_blocking(move || reader.join());

        match tokio::time::timeout(bound, join).await {
            Ok(Ok(Ok(()))) => trace!(port = %port, generation, "Reader stopped"),
            Ok(Ok(Err(_))) => error!(port = %port, "Reader thread panicked"),
            Ok(Err(e)) => error!(port = %port, error = %e, "Failed to join reader thread"),
            Err(_) => warn!(
                port = %port,
                wait_ms = bound.as_millis() as u64,
                "Reader thread did not stop in time"
            ),
        }
    }
}

/// Entry point for starting a supervisor.
pub struct ConnectionSupervisor {
    backend: Arc<dyn SerialBackend>,
    base_config: LinkConfig,
    config: Option<LinkConfig>,
    reconnect_allowed: bool,
    reconnect: Option<Interval>,
    link: Option<ActiveLink>,
    generation: u64,
    codec: LineCodec,
    state_tx: watch::Sender<LinkState>,
    frame_tx: mpsc::Sender<LinkChunk>,
    exit_tx: mpsc::UnboundedSender<LinkExit>,
}

impl ConnectionSupervisor {
    /// Start a supervisor in the `Disconnected` state.
    ///
    /// `base_config` supplies the line settings for [`SupervisorHandle::connect`],
    /// which only names a port. Bytes read from the link are delivered on the
    /// returned receiver, which holds at most `frame_capacity` chunks.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(
        backend: Arc<dyn SerialBackend>,
        base_config: LinkConfig,
        frame_capacity: usize,
    ) -> (SupervisorHandle, mpsc::Receiver<LinkChunk>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel(frame_capacity.max(1));
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);

        let actor = Self {
            backend: Arc::clone(&backend),
            base_config,
            config: None,
            reconnect_allowed: true,
            reconnect: None,
            link: None,
            generation: 0,
            codec: LineCodec::new(),
            state_tx,
            frame_tx,
            exit_tx,
        };
        let task = tokio::spawn(actor.run(command_rx, exit_rx));

        let handle = SupervisorHandle {
            commands: command_tx,
            state: state_rx,
            backend,
            task: Arc::new(Mutex::new(Some(task))),
        };
        (handle, frame_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut exits: mpsc::UnboundedReceiver<LinkExit>,
    ) {
        debug!("Connection supervisor started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                Some(exit) = exits.recv() => self.on_link_exit(exit).await,
                _ = next_tick(&mut self.reconnect) => self.try_reconnect().await,
            }
        }

        debug!("Connection supervisor stopped");
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect { target, reply } => {
                let result = self.connect(target).await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::Send { ack, reply } => {
                let result = self.send(ack).await;
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn connect(&mut self, target: ConnectTarget) -> Result<()> {
        let config = match target {
            ConnectTarget::Port(port) => {
                if let Some(link) = &self.link
                    && link.config.port_name == port
                {
                    info!(port = %port, "Port is already open");
                    self.reconnect_allowed = true;
                    return Ok(());
                }
                self.config
                    .as_ref()
                    .unwrap_or(&self.base_config)
                    .with_port(port)
            }
            ConnectTarget::Config(config) => {
                if let Some(link) = &self.link
                    && link.config == config
                {
                    info!(port = %config.port_name, "Port is already open");
                    self.reconnect_allowed = true;
                    return Ok(());
                }
                config
            }
        };

        if let Err(e) = config.validate() {
            error!(port = %config.port_name, error = %e, "Rejected link configuration");
            return Err(e.into());
        }
        self.close_link().await;
        self.config = Some(config.clone());
        self.reconnect_allowed = true;
        self.open(config).await
    }

    async fn disconnect(&mut self) {
        self.reconnect_allowed = false;
        self.reconnect = None;
        if let Some(link) = self.link.take() {
            info!(port = %link.config.port_name, "Serial link closed");
            link.close().await;
        }
        self.set_state(LinkState::Disconnected);
    }

    async fn stop(&mut self) {
        self.reconnect_allowed = false;
        self.reconnect = None;
        self.close_link().await;
        self.set_state(LinkState::Disconnected);
    }

    async fn open(&mut self, config: LinkConfig) -> Result<()> {
        self.reconnect = None;
        self.set_state(LinkState::Connecting);

        let backend = Arc::clone(&self.backend);
        let open_config = config.clone();
        let opened = tokio::task::spawn_blocking(move || backend.open(&open_config))
            .await
            .map_err(|e| LinkError::open_failed(&config.port_name, e.to_string()))
            .and_then(|result| result);

        let (reader, writer) = match opened {
            Ok(halves) => halves,
            Err(e) => {
                error!(port = %config.port_name, error = %e, "Failed to connect to port");
                self.set_state(LinkState::Faulted);
                self.arm_reconnect();
                return Err(e);
            }
        };

        self.generation += 1;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = match spawn_reader(
            self.generation,
            &config.port_name,
            reader,
            Arc::clone(&stop),
            self.frame_tx.clone(),
            self.exit_tx.clone(),
        ) {
            Ok(reader) => reader,
            Err(e) => {
                error!(port = %config.port_name, error = %e, "Failed to start reader thread");
                self.set_state(LinkState::Faulted);
                self.arm_reconnect();
                return Err(LinkError::open_failed(&config.port_name, e.to_string()));
            }
        };

        info!(
            port = %config.port_name,
            baud = config.baud_rate,
            generation = self.generation,
            "Connected to port"
        );
        self.link = Some(ActiveLink {
            generation: self.generation,
            config,
            writer: Arc::new(Mutex::new(writer)),
            stop,
            reader,
        });
        self.set_state(LinkState::Connected);
        Ok(())
    }

    async fn send(&mut self, ack: AckByte) -> Result<()> {
        let Some(link) = &self.link else {
            warn!(ack = %ack, "Cannot send data: serial link is not open");
            return Err(LinkError::NotConnected);
        };

        let mut frame = BytesMut::with_capacity(2);
        self.codec
            .encode(ack, &mut frame)
            .map_err(|e| LinkError::write_failed(e.to_string()))?;

        let writer = Arc::clone(&link.writer);
        let timeout = link.config.write_timeout();
        let write = tokio::task::spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| LinkError::write_failed("writer lock poisoned"))?;
            writer
                .write_all(&frame)
                .and_then(|()| writer.flush())
                .map_err(|e| LinkError::write_failed(e.to_string()))
        });

        let result = match tokio::time::timeout(timeout, write).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(LinkError::write_failed(e.to_string())),
            Err(_) => Err(LinkError::timeout(timeout.as_millis() as u64)),
        };

        match &result {
            Ok(()) => info!(ack = %ack, "Data sent"),
            Err(e) => error!(ack = %ack, error = %e, "Error sending data"),
        }
        result
    }

    async fn on_link_exit(&mut self, exit: LinkExit) {
        let current = self
            .link
            .as_ref()
            .is_some_and(|link| link.generation == exit.generation);
        if !current {
            trace!(generation = exit.generation, "Ignoring exit of a closed link");
            return;
        }

        if let Some(link) = self.link.take() {
            warn!(
                port = %link.config.port_name,
                error = exit.error.as_deref().unwrap_or("reader stopped"),
                "Serial link lost"
            );
            link.close().await;
        }
        self.set_state(LinkState::Disconnected);
        self.arm_reconnect();
    }

    async fn try_reconnect(&mut self) {
        if self.link.is_some() {
            self.reconnect = None;
            return;
        }
        let Some(config) = self.config.clone() else {
            self.reconnect = None;
            return;
        };

        info!(port = %config.port_name, "Attempting to reconnect");
        // Failure is already logged and re-arms the timer.
        let _ = self.open(config).await;
    }

    async fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            debug!(port = %link.config.port_name, "Closing serial link");
            link.close().await;
        }
    }

    fn arm_reconnect(&mut self) {
        let Some(config) = &self.config else {
            return;
        };
        if !self.reconnect_allowed || !config.auto_reconnect {
            return;
        }

        let period = config.reconnect_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.reconnect = Some(interval);
    }

    fn set_state(&self, state: LinkState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = %current, to = %state, "Link state changed");
            *current = state;
            true
        });
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn spawn_reader(
    generation: u64,
    port: &str,
    mut reader: LinkReader,
    stop: Arc<AtomicBool>,
    frames: mpsc::Sender<LinkChunk>,
    exits: mpsc::UnboundedSender<LinkExit>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("gatelink-reader-{generation}"))
        .spawn({
            let port = port.to_string();
            move || {
                let mut buf = [0u8; READ_BUFFER_SIZE];
                let error = loop {
                    if stop.load(Ordering::Acquire) {
                        break None;
                    }
                    match reader.read(&mut buf) {
                        Ok(0) => break Some("end of stream".to_string()),
                        Ok(n) => {
                            trace!(port = %port, bytes = n, "Raw data received");
                            let chunk = LinkChunk {
                                generation,
                                bytes: Bytes::copy_from_slice(&buf[..n]),
                            };
                            if !forward(&frames, chunk, &stop) {
                                break None;
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                            ) =>
                        {
                            continue;
                        }
                        Err(e) => break Some(e.to_string()),
                    }
                };
                let _ = exits.send(LinkExit { generation, error });
            }
        })
}

/// Queue a chunk, waiting while the queue is full.
///
/// Returns `false` when the link is being closed or the consumer is gone.
/// `stop` is checked between attempts so a full queue cannot keep the port
/// open past a close.
fn forward(frames: &mpsc::Sender<LinkChunk>, mut chunk: LinkChunk, stop: &AtomicBool) -> bool {
    loop {
        match frames.try_send(chunk) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return false,
            Err(TrySendError::Full(returned)) => {
                if stop.load(Ordering::Acquire) {
                    return false;
                }
                chunk = returned;
                thread::sleep(FULL_QUEUE_BACKOFF);
            }
        }
    }
}

/// Cloneable handle to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<LinkState>,
    backend: Arc<dyn SerialBackend>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SupervisorHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.ok()?;
        response.await.ok()
    }

    /// Open `port_name` with the base line settings.
    ///
    /// Closes any other open link first; a no-op when the same port is
    /// already open. Returns `false` if the port could not be opened.
    pub async fn connect(&self, port_name: impl Into<String>) -> bool {
        let target = ConnectTarget::Port(port_name.into());
        self.connect_target(target).await
    }

    /// Open a link with a full configuration.
    pub async fn connect_with(&self, config: LinkConfig) -> bool {
        self.connect_target(ConnectTarget::Config(config)).await
    }

    async fn connect_target(&self, target: ConnectTarget) -> bool {
        match self
            .request(|reply| Command::Connect { target, reply })
            .await
        {
            Some(Ok(())) => true,
            Some(Err(_)) => false,
            None => {
                warn!("Connect requested but the supervisor is not running");
                false
            }
        }
    }

    /// Close the link if open and stop reconnecting until the next connect.
    pub async fn disconnect(&self) {
        self.request(|reply| Command::Disconnect { reply }).await;
    }

    /// Write an acknowledgement if the link is open.
    ///
    /// # Errors
    /// `NotConnected` when no link is open, or the write failure. Both are
    /// already logged by the supervisor.
    pub async fn send(&self, ack: AckByte) -> Result<()> {
        self.request(|reply| Command::Send { ack, reply })
            .await
            .unwrap_or(Err(LinkError::SupervisorGone))
    }

    /// Enumerate host-visible serial endpoints. Does not touch the link.
    pub async fn list_available_ports(&self) -> Result<Vec<String>> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.available_ports())
            .await
            .map_err(|e| LinkError::enumeration(e.to_string()))?
    }

    /// `true` while the link is open.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Wait until the link reaches `state` or `timeout` elapses.
    pub async fn wait_for_state(&self, state: LinkState, timeout: Duration) -> bool {
        let mut rx = self.subscribe_state();
        tokio::time::timeout(timeout, rx.wait_for(|current| *current == state))
            .await
            .is_ok_and(|seen| seen.is_ok())
    }

    /// Stop the reconnect timer, close the link and end the actor.
    ///
    /// Safe to call more than once and from any clone.
    pub async fn shutdown(&self) {
        self.request(|reply| Command::Shutdown { reply }).await;

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "Connection supervisor task failed");
        }
    }
}
