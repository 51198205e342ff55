// ============================================
// File: crates/cirrus-server/src/lib.rs
// ============================================
//! # Cirrus Server Library
//!
//! ## Creation Reason
//! Server side of the Cirrus secure cloud storage protocol: the accept
//! loop, the per-connection worker with its operation state machines,
//! the server half of the handshake and the per-user storage service.
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Server                           │
//! │                                                         │
//! │   accept loop (main thread)                             │
//! │        │ one OS thread per accepted connection          │
//! │        ▼                                                │
//! │   ConnectionHandler ──► HandshakeService (M1..M5)       │
//! │        │                                                │
//! │        ├─► Session (seal/open, counter, rekey)          │
//! │        └─► Storage  (per-user directory, chunks)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers share nothing mutable beyond the filesystem: each user's
//! directory is touched only by that user's worker thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod services;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
