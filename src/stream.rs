//! Byte-stream transport abstraction
//!
//! The protocol engine only needs blocking read, write and close on a connected,
//! ordered, reliable byte stream. [`Transport`] captures that; it is implemented
//! for `TcpStream` and for mutable references to any transport.
//!
//! [`BufferedStream`] puts a read buffer in front of a transport so the handshake
//! can read line by line. Bytes the client sends right after its request head
//! stay in the buffer and are picked up by the frame decoder.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::RECV_BUFFER_SIZE;

/// A connected, bidirectional byte stream
pub trait Transport: Read + Write {
    /// Close both directions of the stream
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}

/// A transport with a read buffer; writes go straight through
pub struct BufferedStream<S: Transport> {
    inner: BufReader<S>,
}

impl<S: Transport> BufferedStream<S> {
    /// Wrap a transport
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::with_capacity(RECV_BUFFER_SIZE, stream),
        }
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport
    ///
    /// Reading from it directly skips whatever is already buffered.
    pub fn get_mut(&mut self) -> &mut S {
        self.inner.get_mut()
    }

    /// Bytes received but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        self.inner.buffer()
    }

    /// Unwrap the transport, discarding buffered input
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Close the underlying transport
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.inner.get_mut().shutdown()
    }
}

impl<S: Transport> Read for BufferedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<S: Transport> BufRead for BufferedStream<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl<S: Transport> Write for BufferedStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.get_mut().flush()
    }
}

/// In-memory transport for unit tests
#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Cursor, Read, Write};

    use super::Transport;

    /// Replays scripted input and records everything written
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        input: Cursor<Vec<u8>>,
        pub(crate) output: Vec<u8>,
        pub(crate) shutdown_calls: usize,
        pub(crate) fail_writes: bool,
    }

    impl MockTransport {
        pub(crate) fn new(input: impl Into<Vec<u8>>) -> Self {
            Self {
                input: Cursor::new(input.into()),
                ..Default::default()
            }
        }

        pub(crate) fn is_shut_down(&self) -> bool {
            self.shutdown_calls > 0
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn shutdown(&mut self) -> io::Result<()> {
            self.shutdown_calls += 1;
            Ok(())
        }
    }
}
