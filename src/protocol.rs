//! WebSocket protocol implementation
//!
//! This module turns the raw frame stream into messages:
//! - Message fragmentation and reassembly
//! - Control frame handling (ping/pong/close)
//! - Opcode dispatch

use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use crate::Config;
use crate::error::{Error, Result};
use crate::frame::{Frame, OpCode, read_frame};
use crate::utf8;

/// WebSocket message (complete, possibly assembled from fragments)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text message (UTF-8 validated)
    Text(String),
    /// Binary message
    Binary(Bytes),
}

impl Message {
    /// Create a text message from a string
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message
    #[inline]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Message::Binary(data.into())
    }

    /// Check if this is a text message
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Check if this is a binary message
    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Get message as text (returns None for binary messages)
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Get message as bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(b) => b,
        }
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to binary data
    pub fn into_bytes(self) -> Bytes {
        match self {
            Message::Text(s) => Bytes::from(s),
            Message::Binary(b) => b,
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(v: Vec<u8>) -> Self {
        Message::Binary(Bytes::from(v))
    }
}

impl From<Bytes> for Message {
    fn from(b: Bytes) -> Self {
        Message::Binary(b)
    }
}

/// Result of decoding one frame, or one reassembled frame sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete text or binary message
    Message(Message),
    /// A bare continuation frame with no message to attach to
    Continuation {
        /// FIN bit of the frame
        fin: bool,
        /// Frame payload
        payload: Bytes,
    },
    /// The peer sent a close frame
    Close,
    /// The peer sent a ping; a pong has already been written
    Ping,
    /// Pong or reserved opcode, left for the caller to inspect
    Other {
        /// Raw opcode
        opcode: OpCode,
        /// Frame payload
        payload: Bytes,
    },
}

impl Decoded {
    /// Take the message out, if this is one
    pub fn into_message(self) -> Option<Message> {
        match self {
            Decoded::Message(msg) => Some(msg),
            _ => None,
        }
    }
}

/// WebSocket protocol handler
///
/// Stateless between calls: every [`decode`](Protocol::decode) reads exactly the
/// frames of one message (plus any control frames interleaved with them).
#[derive(Debug, Clone)]
pub struct Protocol {
    max_frame_size: usize,
    max_message_size: usize,
    max_fragments: usize,
    strict_opcodes: bool,
}

impl Protocol {
    /// Create a protocol handler with the limits from `config`
    pub fn new(config: &Config) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            max_message_size: config.max_message_size,
            max_fragments: config.max_fragments.max(1),
            strict_opcodes: config.strict_opcodes,
        }
    }

    /// Decode the next message from a blocking stream
    ///
    /// With `allow_fragmentation`, a non-final first frame is followed by its
    /// continuation frames until one carries FIN; the payloads are concatenated
    /// and dispatched on the first frame's opcode. Pings are answered with an
    /// empty pong on `stream` before this returns.
    pub fn decode<S: Read + Write>(
        &self,
        stream: &mut S,
        allow_fragmentation: bool,
    ) -> Result<Decoded> {
        let first = read_frame(stream, self.max_frame_size)?;
        let opcode = first.header.opcode;
        let fin = first.header.fin;

        if !fin && opcode.is_control() {
            return Err(Error::Protocol("control frame must not be fragmented"));
        }

        let payload = if !fin && allow_fragmentation {
            match self.reassemble(stream, first.payload)? {
                Some(payload) => payload,
                None => return Ok(Decoded::Close),
            }
        } else {
            if first.payload.len() > self.max_message_size {
                return Err(Error::MessageTooLarge);
            }
            first.payload
        };

        self.dispatch(stream, opcode, fin, payload)
    }

    /// Read continuation frames until FIN, returning `None` if a close frame
    /// arrives first
    fn reassemble<S: Read + Write>(&self, stream: &mut S, first: Bytes) -> Result<Option<Bytes>> {
        if first.len() > self.max_message_size {
            return Err(Error::MessageTooLarge);
        }

        let mut buf = BytesMut::from(&first[..]);
        let mut fragments = 1usize;

        loop {
            let frame = read_frame(stream, self.max_frame_size)?;

            match frame.header.opcode {
                OpCode::Continuation => {
                    fragments += 1;
                    if fragments > self.max_fragments {
                        return Err(Error::TooManyFragments);
                    }
                    if buf.len() + frame.payload.len() > self.max_message_size {
                        return Err(Error::MessageTooLarge);
                    }

                    buf.extend_from_slice(&frame.payload);

                    if frame.header.fin {
                        tracing::debug!(fragments, len = buf.len(), "message reassembled");
                        return Ok(Some(buf.freeze()));
                    }
                }
                OpCode::Ping => self.write_pong(stream)?,
                OpCode::Pong => {}
                OpCode::Close => {
                    tracing::debug!(fragments, "close frame during reassembly");
                    return Ok(None);
                }
                _ => return Err(Error::Protocol("expected continuation frame")),
            }
        }
    }

    /// Map a (possibly reassembled) payload to its decoded form
    fn dispatch<S: Write>(
        &self,
        stream: &mut S,
        opcode: OpCode,
        fin: bool,
        payload: Bytes,
    ) -> Result<Decoded> {
        match opcode {
            OpCode::Continuation => Ok(Decoded::Continuation { fin, payload }),
            OpCode::Text => {
                let text = utf8::into_string(Vec::from(payload)).ok_or(Error::InvalidUtf8)?;
                Ok(Decoded::Message(Message::Text(text)))
            }
            OpCode::Binary => Ok(Decoded::Message(Message::Binary(payload))),
            OpCode::Close => Ok(Decoded::Close),
            OpCode::Ping => {
                self.write_pong(stream)?;
                Ok(Decoded::Ping)
            }
            OpCode::Reserved(_) if self.strict_opcodes => {
                Err(Error::Protocol("reserved opcode"))
            }
            other => {
                tracing::debug!(
                    opcode = other.as_u8(),
                    len = payload.len(),
                    "passthrough frame"
                );
                Ok(Decoded::Other {
                    opcode: other,
                    payload,
                })
            }
        }
    }

    /// Write an empty pong frame
    fn write_pong<S: Write>(&self, stream: &mut S) -> Result<()> {
        let mut buf = BytesMut::with_capacity(2);
        Frame::pong().encode(&mut buf);
        stream.write_all(&buf)?;
        stream.flush()?;
        tracing::trace!("pong sent");
        Ok(())
    }
}
