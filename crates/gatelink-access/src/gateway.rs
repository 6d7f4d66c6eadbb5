use crate::dispatcher::{DispatchEvent, LinkEventDispatcher};
use crate::engine::{AccessDecisionEngine, LogFailure};
use crate::error::{GatewayError, Result};
use gatelink_core::LinkConfig;
use gatelink_link::{ConnectionSupervisor, SerialBackend, SupervisorHandle};
use gatelink_storage::{AccessLogRepository, TokenRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Gateway wiring settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Link settings. An empty port name starts the gateway disconnected.
    pub link: LinkConfig,

    /// Link chunks buffered between the reader and the dispatcher.
    pub frame_queue_capacity: usize,

    /// Dispatch events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            frame_queue_capacity: 64,
            event_capacity: 256,
        }
    }
}

impl GatewayConfig {
    pub fn new(link: LinkConfig) -> Self {
        Self {
            link,
            ..Default::default()
        }
    }
}

/// Running access gateway: supervisor, dispatcher and decision engine.
pub struct Gateway<T, L> {
    link: SupervisorHandle,
    events: broadcast::Sender<DispatchEvent>,
    cancel: CancellationToken,
    dispatcher: JoinHandle<AccessDecisionEngine<T, L>>,
}

impl<T, L> Gateway<T, L>
where
    T: TokenRepository + 'static,
    L: AccessLogRepository + 'static,
{
    /// Start the gateway and, if a port is configured, try to open it.
    ///
    /// A port that cannot be opened yet is not an error: the supervisor keeps
    /// retrying when auto-reconnect is on.
    ///
    /// # Errors
    /// `InvalidConfig` when the link settings are unusable.
    pub async fn start(
        backend: Arc<dyn SerialBackend>,
        config: GatewayConfig,
        tokens: T,
        logs: L,
    ) -> Result<Self> {
        config.link.validate()?;

        let (link, frames) = ConnectionSupervisor::spawn(
            backend,
            config.link.clone(),
            config.frame_queue_capacity,
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let cancel = CancellationToken::new();

        let engine = AccessDecisionEngine::new(tokens, logs);
        let dispatcher = LinkEventDispatcher::new(engine, link.clone(), frames, events.clone());
        let dispatcher = tokio::spawn(dispatcher.run(cancel.clone()));

        let gateway = Self {
            link,
            events,
            cancel,
            dispatcher,
        };

        if !config.link.port_name.is_empty() {
            let port = config.link.port_name.clone();
            if gateway.link.connect_with(config.link).await {
                info!(port = %port, "Gateway started");
            } else {
                warn!(port = %port, "Gateway started without an open link");
            }
        } else {
            info!("Gateway started with no port configured");
        }

        Ok(gateway)
    }

    /// Link control: connect, disconnect, port enumeration and state.
    pub fn link(&self) -> &SupervisorHandle {
        &self.link
    }

    /// Subscribe to dispatch events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Stop taking frames, close the link, then wait up to `grace` for
    /// pending access log writes.
    ///
    /// Returns the log writes that failed or were abandoned.
    ///
    /// # Errors
    /// `Dispatcher` if the dispatcher task panicked; its pending writes are
    /// lost.
    pub async fn shutdown(self, grace: Duration) -> Result<Vec<LogFailure>> {
        info!("Gateway shutting down");

        self.cancel.cancel();
        self.link.shutdown().await;

        let mut engine = self
            .dispatcher
            .await
            .map_err(|e| GatewayError::Dispatcher(e.to_string()))?;

        let failures = engine.drain(grace).await;
        if failures.is_empty() {
            info!("Gateway stopped");
        } else {
            warn!(failed_logs = failures.len(), "Gateway stopped with unwritten access logs");
        }
        Ok(failures)
    }
}
