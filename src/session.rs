//! One live WebSocket connection
//!
//! A [`Session`] exclusively owns its transport. It moves through
//! `Idle → Handshaking → Open → Closed`; `Closed` is terminal and is entered on
//! a rejected handshake, a close frame from the peer, an explicit
//! [`close`](Session::close), or any transport or protocol error.

use bytes::BytesMut;

use crate::Config;
use crate::error::{Error, Result};
use crate::frame::{Frame, encode_text};
use crate::handshake::{self, Negotiation};
use crate::protocol::{Decoded, Message, Protocol};
use crate::stream::{BufferedStream, Transport};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport attached, handshake not started
    Idle,
    /// Reading the upgrade request
    Handshaking,
    /// Upgrade done, frames flowing
    Open,
    /// Transport closed
    Closed,
}

/// A server-side WebSocket session over a blocking transport
pub struct Session<S: Transport> {
    stream: BufferedStream<S>,
    state: ConnectionState,
    config: Config,
    protocol: Protocol,
    write_buf: BytesMut,
}

impl<S: Transport> Session<S> {
    /// Attach a session to a freshly accepted transport
    pub fn new(stream: S, config: Config) -> Self {
        let protocol = Protocol::new(&config);
        Self {
            stream: BufferedStream::new(stream),
            state: ConnectionState::Idle,
            config,
            protocol,
            write_buf: BytesMut::with_capacity(256),
        }
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the session is open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Unwrap the transport
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Run the upgrade handshake
    ///
    /// Returns `Ok(true)` once the session is open. A request without a usable
    /// `Sec-WebSocket-Key` closes the transport and returns `Ok(false)`.
    pub fn handshake(&mut self) -> Result<bool> {
        if self.state != ConnectionState::Idle {
            return Err(Error::InvalidState("handshake already attempted"));
        }
        self.state = ConnectionState::Handshaking;

        match handshake::negotiate(&mut self.stream, self.config.max_handshake_size) {
            Ok(Negotiation::Accepted { path, .. }) => {
                tracing::info!(path = %path, "websocket session open");
                self.state = ConnectionState::Open;
                Ok(true)
            }
            Ok(Negotiation::Rejected) => {
                tracing::warn!("handshake rejected, closing connection");
                self.shutdown();
                Ok(false)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Handshake, then deliver every text and binary message to `handler`
    ///
    /// Returns `Ok(())` when the peer sends a close frame, when the handler
    /// closes the session, or when the handshake is rejected. The handler gets
    /// the session back so it can [`send`](Session::send) replies.
    pub fn accept<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&mut Self, Message),
    {
        if !self.handshake()? {
            return Ok(());
        }

        while let Some(msg) = self.next_message()? {
            handler(self, msg);
        }

        Ok(())
    }

    /// Block until the next text or binary message
    ///
    /// Pings are answered, and pongs, stray continuation frames and reserved
    /// opcodes are dropped. Returns `Ok(None)` once the session is closed.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.state {
                ConnectionState::Open => {}
                ConnectionState::Closed => return Ok(None),
                ConnectionState::Idle | ConnectionState::Handshaking => {
                    return Err(Error::InvalidState("handshake not completed"));
                }
            }

            let decoded = match self.protocol.decode(&mut self.stream, true) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            };

            match decoded {
                Decoded::Message(msg) => return Ok(Some(msg)),
                Decoded::Close => {
                    tracing::info!("close frame received");
                    self.reply_close();
                    self.shutdown();
                    return Ok(None);
                }
                Decoded::Ping => tracing::debug!("ping answered"),
                Decoded::Continuation { fin, payload } => {
                    tracing::debug!(
                        fin,
                        len = payload.len(),
                        "dropping stray continuation frame"
                    );
                }
                Decoded::Other { opcode, payload } => {
                    tracing::debug!(?opcode, len = payload.len(), "dropping frame");
                }
            }
        }
    }

    /// Send `text` as a single text frame
    pub fn send(&mut self, text: &str) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(Error::InvalidState("session is not open"));
        }

        self.write_buf.clear();
        encode_text(&mut self.write_buf, text.as_bytes());

        if let Err(e) = self.write_out() {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Close the transport
    ///
    /// Closing an already closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;

        match self.stream.shutdown() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_out(&mut self) -> Result<()> {
        use std::io::Write;

        self.stream.write_all(&self.write_buf)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Answer a close frame with an empty one; the peer may already be gone
    fn reply_close(&mut self) {
        self.write_buf.clear();
        Frame::close_empty().encode(&mut self.write_buf);
        if let Err(e) = self.write_out() {
            tracing::debug!(error = %e, "close reply not delivered");
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "transport shutdown failed");
        }
    }

    fn fail(&mut self, error: &Error) {
        if error.is_transport() {
            tracing::warn!(error = %error, "transport failure, closing session");
        } else {
            tracing::warn!(error = %error, "protocol failure, closing session");
        }
        self.shutdown();
    }
}
