// ============================================
// File: crates/cirrus-core/src/lib.rs
// ============================================
//! # Cirrus Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the protocol definitions and cryptographic operations for the
//! Cirrus secure cloud storage system. This crate is the security backbone
//! of the entire system: a skipped tag check, a reused counter or an
//! ambiguous frame here invalidates every guarantee above it.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`IdentityKeyPair`, `EphemeralKeyPair`, `SessionKey`)
//! - AES-128-GCM authenticated encryption ([`crypto::aead`])
//! - Session key derivation ([`crypto::kdf`])
//! - X.509 certificate verification ([`crypto::certs`])
//! - Handshake transcript signing ([`crypto::handshake`])
//!
//! ### Protocol Module ([`protocol`])
//! - Message codes and typed messages
//! - Binary codec for the fixed wire layouts
//! - Envelope record format
//!
//! ### Session Module ([`session`])
//! - The record layer state: seal/open with counter-bound AAD,
//!   replay rejection and the rekey trigger
//!
//! ## Security Guarantees
//! - **Confidentiality**: AES-128-GCM on every post-handshake record
//! - **Integrity**: 128-bit GCM tag over ciphertext and counter AAD
//! - **Authenticity**: RSA signatures over the DH transcript, server
//!   identity bound to an X.509 certificate
//! - **Replay Protection**: one shared monotonic counter per session,
//!   enforced on every record
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto implementations
//! - NEVER implement custom crypto primitives
//! - ALL session keys MUST be zeroized on drop
//! - The wire layouts are fixed; both peers break if one field moves

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;
pub mod session;

pub use crypto::{EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKey};
pub use error::{CoreError, Result};
pub use protocol::MessageCode;
pub use session::Session;
