//! CRLF line framing.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::IrcError;

/// Room for IRCv3 message tags on top of the classic 512-byte line.
pub const DEFAULT_MAX_LINE: usize = 8191 + 512;

/// Reads `\n`-terminated lines (a preceding `\r` is dropped) and writes
/// lines terminated with `\r\n`.
///
/// Invalid UTF-8 is replaced rather than rejected; servers relay whatever
/// encoding clients send.
pub struct IrcLineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
}

impl IrcLineCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = IrcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, IrcError> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(IrcError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;
        if line.len() > self.max_len {
            return Err(IrcError::LineTooLong {
                actual: line.len(),
                limit: self.max_len,
            });
        }
        let text = String::from_utf8_lossy(&line);
        Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl Encoder<String> for IrcLineCodec {
    type Error = IrcError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), IrcError> {
        let line = line.trim_end_matches(['\r', '\n']);
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
