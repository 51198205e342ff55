// ============================================
// File: crates/cirrus-transport/src/tcp.rs
// ============================================
//! # TCP Connection
//!
//! ## Creation Reason
//! The protocol exchanges fixed-size records whose lengths both peers
//! compute in advance, so the only primitives needed are "send exactly
//! these bytes" and "receive exactly N bytes". Partial transfers are
//! protocol violations, never retried.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::trace;

use crate::error::{Result, TransportError};

/// A blocking, exact-length framed view over a TCP stream.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Connects to a peer.
    ///
    /// # Errors
    /// Returns `Connect` if no address resolves or the TCP handshake
    /// fails.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let addrs: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(TransportError::Connect)?
            .collect();
        let stream = addrs
            .iter()
            .find_map(|a| TcpStream::connect(a).ok())
            .ok_or_else(|| {
                TransportError::Connect(ErrorKind::ConnectionRefused.into())
            })?;
        stream.set_nodelay(true).map_err(TransportError::Connect)?;
        Ok(Self { stream })
    }

    /// Wraps an accepted stream (server side).
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self { stream }
    }

    /// Returns the peer address, when still available.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Sends the whole buffer, blocking until every byte is written.
    ///
    /// # Errors
    /// Returns `SendFailure` if the stream breaks mid-write.
    pub fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.stream
            .write_all(buf)
            .map_err(TransportError::SendFailure)?;
        self.stream.flush().map_err(TransportError::SendFailure)?;
        trace!(bytes = buf.len(), "sent");
        Ok(())
    }

    /// Receives exactly `len` bytes, blocking until they all arrived.
    ///
    /// # Errors
    /// - `Closed` when the peer shut the stream down at the message
    ///   boundary (zero bytes of the message arrived)
    /// - `ReceiveFailure` on a short read mid-message or any I/O error
    pub fn receive(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(if filled == 0 {
                        TransportError::Closed
                    } else {
                        TransportError::ReceiveFailure(ErrorKind::UnexpectedEof.into())
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::ReceiveFailure(e)),
            }
        }
        trace!(bytes = len, "received");
        Ok(buf)
    }

    /// Shuts down both directions; errors are ignored because the
    /// session is over either way.
    pub fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn exact_length_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut conn = Connection::from_stream(stream);
            let got = conn.receive(5).unwrap();
            conn.send(&got).unwrap();
        });

        let mut conn = Connection::connect(addr).unwrap();
        conn.send(b"hello").unwrap();
        assert_eq!(conn.receive(5).unwrap(), b"hello");
        server.join().unwrap();
    }

    #[test]
    fn close_at_boundary_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut conn = Connection::connect(addr).unwrap();
        server.join().unwrap();
        let err = conn.receive(8).unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn short_read_is_receive_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut conn = Connection::from_stream(stream);
            conn.send(b"abc").unwrap();
            // Close mid-message.
        });

        let mut conn = Connection::connect(addr).unwrap();
        server.join().unwrap();
        let err = conn.receive(8).unwrap_err();
        assert!(matches!(err, TransportError::ReceiveFailure(_)));
    }
}
