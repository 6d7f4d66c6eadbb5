//! Core constants for the gatelink serial protocol.
//!
//! The access controller talks to the host over a newline-delimited ASCII
//! protocol:
//!
//! ```text
//! device -> host:  RFID:<code>\n
//! host -> device:  A\n   (granted)
//!                  N\n   (denied)
//! ```
//!
//! Any other line coming from the device is accepted without error and
//! produces no response.
//!
//! # Usage
//!
//! ```
//! use gatelink_core::constants::*;
//!
//! assert_eq!(RFID_PREFIX, "RFID:");
//! assert_eq!(MIN_RFID_CODE_LENGTH, 8);
//! ```

// ============================================================================
// Wire Protocol
// ============================================================================

/// Prefix of every card-read frame sent by the device.
pub const RFID_PREFIX: &str = "RFID:";

/// Minimum length of an RFID code after trimming.
pub const MIN_RFID_CODE_LENGTH: usize = 8;

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Acknowledgement sent when access is granted.
pub const ACK_GRANTED: char = 'A';

/// Acknowledgement sent when access is denied.
pub const ACK_DENIED: char = 'N';

/// Maximum accepted frame length in bytes (excluding the terminator).
///
/// Card frames are a handful of bytes; anything longer than this is line
/// noise or a misconfigured baud rate and is discarded up to the next
/// terminator.
pub const MAX_FRAME_LENGTH: usize = 1024;

// ============================================================================
// Parser Diagnostics
// ============================================================================

/// Error reported for empty or whitespace-only frames.
pub const ERR_EMPTY_FRAME: &str = "empty or null data received";

/// Error reported for frames that do not start with a known prefix.
pub const ERR_UNRECOGNIZED_FRAME: &str = "unrecognized data format";

/// Error reported for `RFID:` frames whose code fails validation.
pub const ERR_INVALID_RFID_CODE: &str = "invalid RFID code format";

// ============================================================================
// Link Defaults
// ============================================================================

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default number of data bits per character.
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Default read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Default write timeout in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 500;

/// Read timeout used when the configured value is zero.
pub const FALLBACK_READ_TIMEOUT_MS: u64 = 1000;

/// Write timeout used when the configured value is zero.
pub const FALLBACK_WRITE_TIMEOUT_MS: u64 = 500;

/// Default interval between reconnect attempts in milliseconds.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Capacity of the raw-byte queue between the link reader and the dispatcher.
pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 64;

/// Grace period for in-flight log writes at shutdown, in milliseconds.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 3000;
