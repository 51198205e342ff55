// ============================================
// File: crates/cirrus-transport/src/lib.rs
// ============================================
//! # Cirrus Transport - Blocking TCP
//!
//! ## Creation Reason
//! Wraps the reliable, ordered byte stream the protocol core assumes.
//! All I/O is synchronous and blocking: the server runs one OS thread
//! per connection, the client is single-threaded, and a `send`/`receive`
//! call returns only when the full byte count has moved or the peer is
//! gone.
//!
//! ## Main Functionality
//! - [`Connection`]: exact-length send/receive over a TCP stream
//! - [`TransportError`]: the transport error kinds of the protocol
//!   (`SendFailure`, `ReceiveFailure`, `Closed`), all session-fatal
//!
//! ## ⚠️ Important Note for Next Developer
//! - Short reads are protocol violations, not retryable conditions; the
//!   record layer's framing depends on exact lengths
//! - There is no application-level timeout; peer disappearance surfaces
//!   as `Closed` or `ReceiveFailure` on the next read

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod tcp;

pub use error::TransportError;
pub use tcp::Connection;
