use thiserror::Error;

/// Errors raised by the line codec.
///
/// Malformed or unrecognized frames are not errors; they parse into an
/// invalid [`ParsedMessage`](crate::ParsedMessage).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A line exceeded the maximum frame length and was discarded.
    #[error("Frame exceeds maximum length of {max} bytes")]
    FrameTooLong { max: usize },

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
