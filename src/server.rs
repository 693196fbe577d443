//! Blocking WebSocket server
//!
//! [`Server`] binds a TCP port and runs one [`Session`] per accepted connection,
//! to completion, before accepting the next one.
//!
//! # Example
//!
//! ```no_run
//! use plainws::{Config, Message, Server};
//!
//! let server = Server::bind(9001, Config::default())?;
//! server.serve(|session, msg| {
//!     if let Message::Text(text) = msg {
//!         let _ = session.send(&text);
//!     }
//! });
//! # Ok::<(), plainws::Error>(())
//! ```

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::Config;
use crate::error::Result;
use crate::protocol::Message;
use crate::session::Session;

/// WebSocket server over a TCP listener
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: Config,
}

impl Server {
    /// Listen on `port` on all IPv4 interfaces
    pub fn bind(port: u16, config: Config) -> Result<Self> {
        Self::bind_addr((Ipv4Addr::UNSPECIFIED, port), config)
    }

    /// Listen on an explicit address
    pub fn bind_addr<A: ToSocketAddrs>(addr: A, config: Config) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!(addr = ?listener.local_addr().ok(), "websocket server listening");
        Ok(Self { listener, config })
    }

    /// Wrap an already bound listener
    pub fn from_listener(listener: TcpListener, config: Config) -> Self {
        Self { listener, config }
    }

    /// The bound address (useful after binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accept one connection and run its session to completion
    ///
    /// A rejected handshake returns `Ok(())` with the connection closed.
    pub fn accept<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(&mut Session<TcpStream>, Message),
    {
        let (stream, peer) = self.listener.accept()?;
        stream.set_nodelay(true).ok();
        tracing::info!(%peer, "connection accepted");

        let mut session = Session::new(stream, self.config.clone());
        let result = session.accept(handler);
        tracing::info!(%peer, "connection finished");
        result
    }

    /// Serve connections one after another, forever
    ///
    /// Per-connection failures are logged and do not stop the loop.
    pub fn serve<F>(&self, mut handler: F) -> !
    where
        F: FnMut(&mut Session<TcpStream>, Message),
    {
        loop {
            if let Err(e) = self.accept(&mut handler) {
                tracing::warn!(error = %e, "connection ended with error");
            }
        }
    }
}
