//! Newline-delimited framing for the serial link.
//!
//! Decoding splits the incoming byte stream on `\n`, drops a trailing `\r`,
//! trims surrounding whitespace and converts to text (invalid UTF-8 is
//! replaced, not rejected). Lines longer than the configured maximum are
//! discarded up to the next terminator and reported once as
//! [`ProtocolError::FrameTooLong`]; the codec stays usable afterwards.
//!
//! Encoding writes an [`AckByte`] followed by `\n`.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};
use gatelink_core::AckByte;
use gatelink_core::constants::{LINE_TERMINATOR, MAX_FRAME_LENGTH};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn to_text(line: &[u8]) -> String {
        String::from_utf8_lossy(line).trim().to_string()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        loop {
            let newline = src.iter().position(|b| *b == LINE_TERMINATOR);

            match (self.discarding, newline) {
                (true, Some(pos)) => {
                    // Tail of an oversized line; already reported.
                    src.advance(pos + 1);
                    self.discarding = false;
                }
                (true, None) => {
                    src.clear();
                    return Ok(None);
                }
                (false, Some(pos)) => {
                    let line = src.split_to(pos + 1);
                    if pos > self.max_length {
                        return Err(ProtocolError::FrameTooLong {
                            max: self.max_length,
                        });
                    }
                    return Ok(Some(Self::to_text(&line[..pos])));
                }
                (false, None) if src.len() > self.max_length => {
                    src.clear();
                    self.discarding = true;
                    return Err(ProtocolError::FrameTooLong {
                        max: self.max_length,
                    });
                }
                (false, None) => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() || self.discarding => {
                src.clear();
                Ok(None)
            }
            None => {
                let rest = src.split();
                Ok(Some(Self::to_text(&rest)))
            }
        }
    }
}

impl Encoder<AckByte> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, ack: AckByte, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(2);
        dst.put_u8(ack.as_byte());
        dst.put_u8(LINE_TERMINATOR);
        Ok(())
    }
}
