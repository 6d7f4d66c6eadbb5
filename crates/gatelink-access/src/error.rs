use gatelink_link::LinkError;
use thiserror::Error;

/// Errors raised while starting or stopping the gateway.
///
/// Per-frame failures never surface here; they are logged and published as
/// [`DispatchEvent`](crate::DispatchEvent)s.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The link configuration was rejected before starting.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] gatelink_core::Error),

    /// Link-level failure.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// The dispatcher task panicked or was aborted.
    #[error("Dispatcher task failed: {0}")]
    Dispatcher(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
