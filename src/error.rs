//! Error types for the WebSocket library

use std::fmt;
use std::io;

/// Result type alias for WebSocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// WebSocket error types
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying transport
    Io(io::Error),
    /// Invalid UTF-8 in text message
    InvalidUtf8,
    /// Protocol violation
    Protocol(&'static str),
    /// Transport ended (EOF or broken pipe)
    ConnectionClosed,
    /// Connection reset by peer
    ConnectionReset,
    /// Reassembled message too large
    MessageTooLarge,
    /// Single frame too large
    FrameTooLarge,
    /// Too many continuation frames in one message
    TooManyFragments,
    /// Invalid HTTP request head
    InvalidHttp(&'static str),
    /// Operation not allowed in the current session state
    InvalidState(&'static str),
}

impl Error {
    /// Returns true for failures of the underlying byte stream
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::ConnectionReset
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidUtf8 => write!(f, "Invalid UTF-8 in text message"),
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::ConnectionReset => write!(f, "Connection reset by peer"),
            Error::MessageTooLarge => write!(f, "Message too large"),
            Error::FrameTooLarge => write!(f, "Frame too large"),
            Error::TooManyFragments => write!(f, "Too many fragments"),
            Error::InvalidHttp(msg) => write!(f, "Invalid HTTP: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => Error::ConnectionReset,
            io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::ConnectionReset => {
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")
            }
            Error::ConnectionClosed => {
                io::Error::new(io::ErrorKind::BrokenPipe, "connection closed")
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_connection_closed() {
        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(err.is_transport());
    }

    #[test]
    fn test_reset_maps_to_connection_reset() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionReset, "rst").into();
        assert!(matches!(err, Error::ConnectionReset));
    }

    #[test]
    fn test_protocol_error_is_not_transport() {
        assert!(!Error::Protocol("bad").is_transport());
        assert_eq!(
            Error::Protocol("bad").to_string(),
            "Protocol error: bad"
        );
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = Error::FrameTooLarge.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    }
}
