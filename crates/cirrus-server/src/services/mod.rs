// ============================================
// File: crates/cirrus-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! - [`handshake`]: the server half of the five-message handshake
//! - [`storage`]: per-user directories and chunked file access

pub mod handshake;
pub mod storage;

pub use handshake::HandshakeService;
pub use storage::Storage;
