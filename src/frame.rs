//! WebSocket frame parsing and serialization
//!
//! This module implements the RFC 6455 base framing layout:
//! - FIN/opcode byte, MASK/length byte
//! - 16-bit and 64-bit big-endian extended payload lengths
//! - Optional 4-byte masking key
//!
//! Decoding reads from any blocking [`Read`]; encoding appends to a `BytesMut`.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mask::apply_mask;
use crate::{MEDIUM_MESSAGE_THRESHOLD, SMALL_MESSAGE_THRESHOLD};

/// WebSocket opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Continuation frame
    Continuation,
    /// Text frame
    Text,
    /// Binary frame
    Binary,
    /// Connection close
    Close,
    /// Ping
    Ping,
    /// Pong
    Pong,
    /// Any opcode RFC 6455 leaves reserved
    Reserved(u8),
}

impl OpCode {
    /// Parse opcode from the low nibble of a byte
    #[inline]
    pub fn from_u8(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    /// Wire value of this opcode
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(n) => n & 0x0F,
        }
    }

    /// Check if this is a control frame
    #[inline]
    pub fn is_control(&self) -> bool {
        self.as_u8() >= 0x8
    }

    /// Check if this is a data frame
    #[inline]
    pub fn is_data(&self) -> bool {
        self.as_u8() <= 0x2
    }
}

/// A parsed WebSocket frame header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag
    pub fin: bool,
    /// Frame opcode
    pub opcode: OpCode,
    /// Mask flag (set on client->server frames)
    pub masked: bool,
    /// Payload length
    pub payload_len: u64,
    /// Masking key, present iff `masked`
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Get the total header size in bytes
    #[inline]
    pub fn header_size(&self) -> usize {
        let mut size = 2;

        if self.payload_len > MEDIUM_MESSAGE_THRESHOLD as u64 {
            size += 8;
        } else if self.payload_len > SMALL_MESSAGE_THRESHOLD as u64 {
            size += 2;
        }

        if self.masked {
            size += 4;
        }

        size
    }

    /// Width in bytes of the extended length field (0, 2 or 8)
    #[inline]
    pub fn extended_len_size(&self) -> usize {
        if self.payload_len > MEDIUM_MESSAGE_THRESHOLD as u64 {
            8
        } else if self.payload_len > SMALL_MESSAGE_THRESHOLD as u64 {
            2
        } else {
            0
        }
    }

    /// Encode the frame header into a buffer
    #[inline]
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut b0 = self.opcode.as_u8();
        if self.fin {
            b0 |= 0x80;
        }
        buf.put_u8(b0);

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };

        if self.payload_len <= SMALL_MESSAGE_THRESHOLD as u64 {
            buf.put_u8(mask_bit | self.payload_len as u8);
        } else if self.payload_len <= MEDIUM_MESSAGE_THRESHOLD as u64 {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(self.payload_len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(self.payload_len);
        }

        if let Some(mask) = self.mask {
            buf.put_slice(&mask);
        }
    }

    /// Read a frame header from a blocking stream
    ///
    /// RSV bits are ignored. Blocks until the whole header has arrived.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;

        let fin = head[0] & 0x80 != 0;
        let opcode = OpCode::from_u8(head[0]);
        let masked = head[1] & 0x80 != 0;
        let len_byte = head[1] & 0x7F;

        let payload_len = match len_byte {
            126 => {
                let mut ext = [0u8; 2];
                reader.read_exact(&mut ext)?;
                u16::from_be_bytes(ext) as u64
            }
            127 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                u64::from_be_bytes(ext)
            }
            n => n as u64,
        };

        let mask = if masked {
            let mut key = [0u8; 4];
            reader.read_exact(&mut key)?;
            Some(key)
        } else {
            None
        };

        Ok(FrameHeader {
            fin,
            opcode,
            masked,
            payload_len,
            mask,
        })
    }
}

/// A complete WebSocket frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,
    /// Frame payload (already unmasked)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new unmasked frame
    pub fn new(opcode: OpCode, payload: Bytes, fin: bool) -> Self {
        Self {
            header: FrameHeader {
                fin,
                opcode,
                masked: false,
                payload_len: payload.len() as u64,
                mask: None,
            },
            payload,
        }
    }

    /// Create a text frame
    #[inline]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Text, data.into(), true)
    }

    /// Create an empty pong frame
    #[inline]
    pub fn pong() -> Self {
        Self::new(OpCode::Pong, Bytes::new(), true)
    }

    /// Create an empty close frame
    #[inline]
    pub fn close_empty() -> Self {
        Self::new(OpCode::Close, Bytes::new(), true)
    }

    /// Frame opcode
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Check if this is the final fragment
    #[inline]
    pub fn is_final(&self) -> bool {
        self.header.fin
    }

    /// Serialize this frame (unmasked) into a buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_frame(buf, self.header.opcode, &self.payload, self.header.fin, None);
    }
}

/// Read one complete frame from a blocking stream
///
/// The payload is unmasked before it is returned. Frames whose declared length
/// exceeds `max_frame_size` are rejected before any payload is read.
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<Frame> {
    let header = FrameHeader::read_from(reader)?;

    if header.payload_len > max_frame_size as u64 {
        return Err(Error::FrameTooLarge);
    }
    let len = usize::try_from(header.payload_len).map_err(|_| Error::FrameTooLarge)?;

    // Grow with the data actually received rather than trusting the length field
    let mut payload = Vec::with_capacity(len.min(crate::RECV_BUFFER_SIZE));
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        return Err(Error::ConnectionClosed);
    }

    if let Some(mask) = header.mask {
        apply_mask(&mut payload, mask);
    }

    tracing::trace!(
        opcode = ?header.opcode,
        fin = header.fin,
        len,
        masked = header.masked,
        "frame read"
    );

    Ok(Frame {
        header,
        payload: Bytes::from(payload),
    })
}

/// Encode a frame into a buffer
///
/// Server frames pass `mask: None`. With a mask, the payload is copied and masked.
#[inline]
pub fn encode_frame(
    buf: &mut BytesMut,
    opcode: OpCode,
    payload: &[u8],
    fin: bool,
    mask: Option<[u8; 4]>,
) {
    let header = FrameHeader {
        fin,
        opcode,
        masked: mask.is_some(),
        payload_len: payload.len() as u64,
        mask,
    };

    buf.reserve(header.header_size() + payload.len());
    header.encode(buf);

    if let Some(m) = mask {
        let start = buf.len();
        buf.put_slice(payload);
        apply_mask(&mut buf[start..], m);
    } else {
        buf.put_slice(payload);
    }
}

/// Encode a final, unmasked text frame
#[inline]
pub fn encode_text(buf: &mut BytesMut, text: &[u8]) {
    encode_frame(buf, OpCode::Text, text, true, None);
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn read_all(bytes: &[u8]) -> Result<Frame> {
        read_frame(&mut Cursor::new(bytes.to_vec()), 16 * 1024 * 1024)
    }

    #[test]
    fn test_opcode() {
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(OpCode::Close.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(OpCode::Text.is_data());
        assert!(OpCode::Binary.is_data());
        assert!(OpCode::Continuation.is_data());
        assert_eq!(OpCode::from_u8(0x3), OpCode::Reserved(0x3));
        assert_eq!(OpCode::from_u8(0x8A), OpCode::Pong);
        assert_eq!(OpCode::Reserved(0xB).as_u8(), 0xB);
    }

    #[test]
    fn test_parse_small_unmasked() {
        let frame = read_all(&[0x81, 0x05, b'h', b'e', b'l', b'l', b'o']).unwrap();
        assert!(frame.header.fin);
        assert_eq!(frame.header.opcode, OpCode::Text);
        assert!(!frame.header.masked);
        assert_eq!(frame.header.mask, None);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn test_parse_masked() {
        let mask = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut buf = BytesMut::new();
        buf.put_u8(0x82); // FIN + Binary
        buf.put_u8(0x84); // Masked + length 4
        buf.put_slice(&mask);
        buf.put_slice(&[0x01, 0x02, 0x03, 0x04]);

        let frame = read_all(&buf).unwrap();
        assert!(frame.header.masked);
        assert_eq!(frame.header.mask, Some(mask));
        assert_eq!(
            frame.payload.as_ref(),
            &[0x01 ^ 0xAA, 0x02 ^ 0xBB, 0x03 ^ 0xCC, 0x04 ^ 0xDD]
        );
    }

    #[test]
    fn test_parse_medium_length() {
        let payload = vec![0x42u8; 200];

        let mut buf = BytesMut::new();
        buf.put_u8(0x82);
        buf.put_u8(126);
        buf.put_u16(200);
        buf.put_slice(&payload);

        let frame = read_all(&buf).unwrap();
        assert_eq!(frame.header.opcode, OpCode::Binary);
        assert_eq!(frame.header.payload_len, 200);
        assert_eq!(frame.payload.len(), 200);
    }

    #[test]
    fn test_non_final_and_rsv_ignored() {
        // FIN=0, RSV1..3 set, text
        let frame = read_all(&[0x71, 0x02, b'A', b'B']).unwrap();
        assert!(!frame.is_final());
        assert_eq!(frame.opcode(), OpCode::Text);
        assert_eq!(frame.payload.as_ref(), b"AB");
    }

    #[test]
    fn test_encode_frame() {
        let mut buf = BytesMut::new();
        encode_text(&mut buf, b"hello");

        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 0x05);
        assert_eq!(&buf[2..], b"hello");
    }

    #[test]
    fn test_encode_frame_masked() {
        let mask = [0x01, 0x02, 0x03, 0x04];
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, OpCode::Text, b"test", true, Some(mask));

        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 0x84);
        assert_eq!(&buf[2..6], &mask);

        let mut payload = buf[6..].to_vec();
        apply_mask(&mut payload, mask);
        assert_eq!(&payload, b"test");
    }

    #[test]
    fn test_length_field_widths() {
        let cases = [
            (125usize, 125u8, 0usize),
            (126, 126, 2),
            (65535, 126, 2),
            (65536, 127, 8),
        ];
        for (size, len_byte, ext) in cases {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut buf = BytesMut::new();
            encode_text(&mut buf, &payload);

            assert_eq!(buf[0], 0x81);
            assert_eq!(buf[1], len_byte, "size {}", size);
            assert_eq!(buf.len(), 2 + ext + size);
            match ext {
                2 => assert_eq!(u16::from_be_bytes([buf[2], buf[3]]) as usize, size),
                8 => {
                    let mut be = [0u8; 8];
                    be.copy_from_slice(&buf[2..10]);
                    assert_eq!(u64::from_be_bytes(be) as usize, size);
                }
                _ => {}
            }

            let frame = read_all(&buf).unwrap();
            assert_eq!(frame.header.extended_len_size(), ext);
            assert_eq!(frame.header.header_size(), 2 + ext);
            assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn test_large_length_is_true_64_bit() {
        let header = FrameHeader {
            fin: true,
            opcode: OpCode::Binary,
            masked: false,
            payload_len: 0x0000_0001_0000_0002,
            mask: None,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x82, 127, 0, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn test_frame_too_large() {
        let result = read_frame(&mut Cursor::new(vec![0x81, 126, 0x01, 0x00]), 100);
        assert!(matches!(result, Err(Error::FrameTooLarge)));
    }

    #[test]
    fn test_truncated_payload() {
        let result = read_all(&[0x81, 0x05, b'h', b'e']);
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_truncated_header() {
        let result = read_all(&[0x81]);
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_frame_encode_pong() {
        let mut buf = BytesMut::new();
        Frame::pong().encode(&mut buf);
        assert_eq!(&buf[..], &[0x8A, 0x00]);

        buf.clear();
        Frame::close_empty().encode(&mut buf);
        assert_eq!(&buf[..], &[0x88, 0x00]);
    }
}
