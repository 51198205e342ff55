// ============================================
// File: crates/cirrus-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! Every variant here means the byte stream broke mid-protocol and the
//! session cannot continue; the caller tears down and, on the client,
//! reports before disconnecting.

use std::io;

use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors of the blocking TCP transport. All are session-fatal.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Establishing the TCP connection failed.
    #[error("connection failed: {0}")]
    Connect(#[source] io::Error),

    /// Writing the full buffer to the stream failed.
    #[error("send failed: {0}")]
    SendFailure(#[source] io::Error),

    /// Reading the exact expected byte count failed mid-message.
    #[error("receive failed: {0}")]
    ReceiveFailure(#[source] io::Error),

    /// The peer closed the connection at a message boundary.
    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    /// True when the peer simply went away rather than violating the
    /// protocol mid-message.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
