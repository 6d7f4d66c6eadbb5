//! Wire protocol between the access controller and the host.
//!
//! - [`parser`]: turns one text line into a [`ParsedMessage`].
//! - [`codec`]: splits the raw byte stream into lines and encodes
//!   acknowledgements.

pub mod codec;
pub mod error;
pub mod parser;

pub use codec::LineCodec;
pub use error::{ProtocolError, Result};
pub use parser::{MessageKind, ParsedMessage, is_valid_rfid_code, parse};
