//! Frame parser.
//!
//! [`parse`] is a total function: every input, however malformed, produces a
//! [`ParsedMessage`]. Callers decide what to do with invalid messages; the
//! parser never fails.
//!
//! # Examples
//!
//! ```
//! use gatelink_protocol::{parse, MessageKind};
//!
//! let msg = parse("RFID: AB12CD34 ");
//! assert!(msg.is_valid);
//! assert_eq!(msg.kind, MessageKind::Rfid);
//! assert_eq!(msg.value, "AB12CD34");
//!
//! let msg = parse("TEMP:21.5");
//! assert!(!msg.is_valid);
//! assert_eq!(msg.error.as_deref(), Some("unrecognized data format"));
//! ```

use gatelink_core::constants::{
    ERR_EMPTY_FRAME, ERR_INVALID_RFID_CODE, ERR_UNRECOGNIZED_FRAME, MIN_RFID_CODE_LENGTH,
    RFID_PREFIX,
};
use std::fmt;

/// Kind of frame received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `RFID:<code>` card read.
    Rfid,
    /// Anything else.
    Unknown,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfid => write!(f, "RFID"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of parsing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub kind: MessageKind,

    /// Payload after the prefix, trimmed. Kept even when invalid so the
    /// rejection can be logged.
    pub value: String,

    pub is_valid: bool,

    /// Diagnostic for invalid messages.
    pub error: Option<String>,
}

impl ParsedMessage {
    fn invalid(kind: MessageKind, value: String, error: &str) -> Self {
        Self {
            kind,
            value,
            is_valid: false,
            error: Some(error.to_string()),
        }
    }

    /// The RFID code, if this is a valid card read.
    pub fn rfid_code(&self) -> Option<&str> {
        (self.is_valid && self.kind == MessageKind::Rfid).then_some(self.value.as_str())
    }
}

/// Parse a single frame.
pub fn parse(raw: &str) -> ParsedMessage {
    if raw.trim().is_empty() {
        return ParsedMessage::invalid(MessageKind::Unknown, String::new(), ERR_EMPTY_FRAME);
    }

    let Some(rest) = raw.strip_prefix(RFID_PREFIX) else {
        return ParsedMessage::invalid(MessageKind::Unknown, String::new(), ERR_UNRECOGNIZED_FRAME);
    };

    let code = rest.trim();
    if is_valid_rfid_code(code) {
        ParsedMessage {
            kind: MessageKind::Rfid,
            value: code.to_string(),
            is_valid: true,
            error: None,
        }
    } else {
        ParsedMessage::invalid(MessageKind::Rfid, code.to_string(), ERR_INVALID_RFID_CODE)
    }
}

/// Check an RFID code: non-empty, at least [`MIN_RFID_CODE_LENGTH`]
/// characters, letters and digits only.
pub fn is_valid_rfid_code(code: &str) -> bool {
    !code.is_empty()
        && code.chars().count() >= MIN_RFID_CODE_LENGTH
        && code.chars().all(char::is_alphanumeric)
}
