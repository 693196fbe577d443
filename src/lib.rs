//! # plainws: minimal blocking WebSocket server
//!
//! A small, synchronous, server-side implementation of the RFC 6455 wire
//! protocol. One [`Session`] owns one connected byte stream: it runs the HTTP
//! upgrade handshake, then decodes (and defragments) incoming frames and hands
//! each text or binary message to a caller-supplied handler.
//!
//! ## Example
//!
//! ```no_run
//! use plainws::{Config, Message, Server};
//!
//! let server = Server::bind(8080, Config::default())?;
//! server.accept(|session, msg| match msg {
//!     Message::Text(text) => {
//!         let _ = session.send(&text);
//!     }
//!     Message::Binary(data) => println!("binary: {} bytes", data.len()),
//! })?;
//! # Ok::<(), plainws::Error>(())
//! ```
//!
//! Everything blocks the calling thread. There are no timeouts, no TLS and no
//! extensions; serving several clients at once means running one session per
//! thread.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod utf8;

pub use error::{Error, Result};
pub use frame::{Frame, FrameHeader, OpCode};
pub use handshake::Negotiation;
pub use protocol::{Decoded, Message};
pub use server::Server;
pub use session::{ConnectionState, Session};
pub use stream::Transport;

/// Default receive buffer size
pub const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Maximum WebSocket frame header size (2 + 8 + 4 = 14 bytes)
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Largest payload encoded with the 7-bit length field
pub const SMALL_MESSAGE_THRESHOLD: usize = 125;

/// Largest payload encoded with the 16-bit extended length field
pub const MEDIUM_MESSAGE_THRESHOLD: usize = 65535;

/// WebSocket GUID for handshake
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Configuration for WebSocket sessions
///
/// # Example
///
/// ```
/// use plainws::Config;
///
/// let config = Config::builder()
///     .max_frame_size(1024 * 1024)
///     .max_fragments(64)
///     .strict_opcodes(true)
///     .build();
/// assert_eq!(config.max_fragments, 64);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum size of the HTTP upgrade request head (default: 8KB)
    pub max_handshake_size: usize,
    /// Maximum single frame payload (default: 16MB)
    pub max_frame_size: usize,
    /// Maximum reassembled message size (default: 64MB)
    pub max_message_size: usize,
    /// Maximum number of frames in one fragmented message (default: 1024)
    pub max_fragments: usize,
    /// Treat reserved opcodes as a protocol violation instead of passing
    /// them through (default: false)
    pub strict_opcodes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_handshake_size: 8 * 1024,
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragments: 1024,
            strict_opcodes: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for WebSocket configuration
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set maximum handshake request size
    pub fn max_handshake_size(mut self, size: usize) -> Self {
        self.config.max_handshake_size = size;
        self
    }

    /// Set maximum payload length for both frames and messages
    pub fn max_payload_length(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self.config.max_frame_size = size;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set maximum number of frames per fragmented message
    pub fn max_fragments(mut self, count: usize) -> Self {
        self.config.max_fragments = count;
        self
    }

    /// Reject reserved opcodes
    pub fn strict_opcodes(mut self, enabled: bool) -> Self {
        self.config.strict_opcodes = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::Config;
    pub use crate::error::{Error, Result};
    pub use crate::frame::{Frame, OpCode};
    pub use crate::protocol::Message;
    pub use crate::server::Server;
    pub use crate::session::Session;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.max_handshake_size, 8192);
        assert_eq!(config.max_fragments, 1024);
        assert!(!config.strict_opcodes);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .max_payload_length(4096)
            .max_handshake_size(1024)
            .max_fragments(3)
            .strict_opcodes(true)
            .build();
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.max_handshake_size, 1024);
        assert_eq!(config.max_fragments, 3);
        assert!(config.strict_opcodes);
    }
}
