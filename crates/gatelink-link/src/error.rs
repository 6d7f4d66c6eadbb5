//! Error types for serial link operations.

/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised at the serial driver boundary.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The port could not be opened.
    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    /// No link is open.
    #[error("Serial link is not open")]
    NotConnected,

    /// Writing to the device failed.
    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Port enumeration failed.
    #[error("Failed to enumerate ports: {message}")]
    Enumeration { message: String },

    /// Link configuration rejected.
    #[error("Configuration error: {0}")]
    Configuration(#[from] gatelink_core::Error),

    /// The supervisor task has stopped.
    #[error("Connection supervisor is not running")]
    SupervisorGone,
}

impl LinkError {
    /// Create a new open failure.
    pub fn open_failed(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create a new write failure.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new enumeration error.
    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::Enumeration {
            message: message.into(),
        }
    }
}
