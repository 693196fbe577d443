//! WebSocket handshake implementation
//!
//! Server side of the HTTP upgrade: read the request head line by line, pick out
//! the `Sec-WebSocket-Key` line and answer with `101 Switching Protocols`.
//!
//! Only the key line decides acceptance; the rest of the head is not validated.
//! A request without one is rejected without any response; the caller is
//! expected to drop the connection.

use std::io::{BufRead, Read, Write};

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::WS_GUID;
use crate::error::{Error, Result};

/// Maximum number of request headers passed to the parser
const MAX_HEADERS: usize = 64;

/// Line prefix carrying the client nonce (matched case-sensitively)
const KEY_PREFIX: &[u8] = b"Sec-WebSocket-Key: ";

/// Outcome of a server-side negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// The upgrade response has been written
    Accepted {
        /// Path from the request line
        path: String,
        /// The `Sec-WebSocket-Accept` value sent back
        accept_key: String,
    },
    /// No usable key; nothing was written
    Rejected,
}

impl Negotiation {
    /// Returns true if the upgrade went through
    pub fn is_accepted(&self) -> bool {
        matches!(self, Negotiation::Accepted { .. })
    }
}

/// Parsed upgrade request
#[derive(Debug)]
pub struct HandshakeRequest<'a> {
    /// The request path
    pub path: &'a str,
    /// The Sec-WebSocket-Key header
    pub key: &'a str,
}

/// Read the request head up to and including the blank line
///
/// Lines end in LF (normally CRLF). Fails with `InvalidHttp` once more than
/// `max_size` bytes have been read without finding the blank line, and with
/// `ConnectionClosed` if the stream ends first.
pub fn read_request_head<R: BufRead>(reader: &mut R, max_size: usize) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(max_size.min(1024));

    loop {
        let remaining = max_size.saturating_sub(head.len());
        if remaining == 0 {
            return Err(Error::InvalidHttp("request too large"));
        }

        let start = head.len();
        let n = reader
            .by_ref()
            .take(remaining as u64)
            .read_until(b'\n', &mut head)?;

        let line = &head[start..];
        if !line.ends_with(b"\n") {
            if n > 0 && head.len() >= max_size {
                return Err(Error::InvalidHttp("request too large"));
            }
            return Err(Error::ConnectionClosed);
        }

        if line == b"\r\n" || line == b"\n" {
            return Ok(head);
        }
    }
}

/// Extract the WebSocket key and request path from a request head
///
/// The key is the run of non-whitespace directly after `Sec-WebSocket-Key: `
/// on the first line that carries one. Returns `None` when no such line
/// exists. The path comes from the request line when it parses and is `/`
/// otherwise.
pub fn parse_request(buf: &[u8]) -> Option<HandshakeRequest<'_>> {
    let key = find_key(buf)?;

    // httparse fills in the request line before it looks at any header, so the
    // path survives header errors further down
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let _ = req.parse(buf);

    Some(HandshakeRequest {
        path: req.path.unwrap_or("/"),
        key,
    })
}

fn find_key(buf: &[u8]) -> Option<&str> {
    buf.split(|&b| b == b'\n').find_map(|line| {
        let rest = line.strip_prefix(KEY_PREFIX)?;
        let end = rest
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let token = std::str::from_utf8(&rest[..end]).ok()?;
        (!token.is_empty()).then_some(token)
    })
}

/// Generate the Sec-WebSocket-Accept key
///
/// This computes: Base64(SHA-1(key + GUID))
#[inline]
pub fn generate_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Build a WebSocket upgrade response
pub fn build_response(accept_key: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(160);

    buf.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.put_slice(b"Upgrade: websocket\r\n");
    buf.put_slice(b"Connection: Upgrade\r\n");
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept_key.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Perform the server-side handshake on a blocking stream
///
/// On `Rejected` nothing has been written and the caller should close the
/// connection. I/O failures and oversized requests are returned as errors.
pub fn negotiate<S: BufRead + Write>(stream: &mut S, max_size: usize) -> Result<Negotiation> {
    let head = read_request_head(stream, max_size)?;

    let Some(req) = parse_request(&head) else {
        tracing::debug!(
            len = head.len(),
            "upgrade request without usable Sec-WebSocket-Key"
        );
        return Ok(Negotiation::Rejected);
    };

    let accept_key = generate_accept_key(req.key);
    let response = build_response(&accept_key);
    stream.write_all(&response)?;
    stream.flush()?;

    tracing::debug!(path = req.path, "websocket upgrade accepted");

    Ok(Negotiation::Accepted {
        path: req.path.to_string(),
        accept_key,
    })
}
