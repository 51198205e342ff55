// ============================================
// File: crates/cirrus-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations of the Cirrus protocol using
//! audited RustCrypto implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: key types (RSA identity, X25519 ephemeral, session key)
//! - [`aead`]: AES-128-GCM authenticated encryption
//! - [`kdf`]: session key derivation (SHA-256 truncation)
//! - [`certs`]: X.509 certificate verification against a trusted CA
//! - [`handshake`]: handshake transcript construction and signing
//!
//! ## Cryptographic Design
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                        │
//! │  Client                                       Server      │
//! │    │  username, X25519 ephemeral ──────────────► │        │
//! │    │ ◄────────────────────────────── ACK / NACK  │        │
//! │    │ ◄── X25519 ephemeral, {sig}K, certificate   │        │
//! │    │  {sig}K ──────────────────────────────────► │        │
//! │    │ ◄──────────────────────────────── ACK/NACK  │        │
//! │    │                                             │        │
//! │    │   X25519 exchange → SHA-256 → 128-bit key   │        │
//! └───────────────────────────────────────────────────────────┘
//! ┌───────────────────────────────────────────────────────────┐
//! │                    Record Phase                           │
//! │  Session Key + Counter AAD ──► AES-128-GCM ──► Envelope   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own primitives; everything here is RustCrypto
//! - a (key, IV) pair must never encrypt twice; IVs are random per call
//! - signatures inside M3/M4 are encrypted under the fresh session key

pub mod aead;
pub mod certs;
pub mod handshake;
pub mod kdf;
pub mod keys;

pub use certs::TrustStore;
pub use keys::{EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKey};

// ============================================
// Constants
// ============================================

/// Size of the AES-128-GCM key in bytes.
pub const AES_KEY_SIZE: usize = 16;

/// Size of the GCM IV (nonce) in bytes.
pub const GCM_IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const GCM_TAG_SIZE: usize = 16;

/// Size of the counter AAD field in bytes.
pub const AAD_SIZE: usize = 4;

/// Size of an X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an RSA-2048 PKCS#1 v1.5 signature in bytes. GCM preserves
/// length, so this is also the size of the encrypted signature carried in
/// the M3/M4 handshake messages.
pub const RSA_SIGNATURE_SIZE: usize = 256;

/// RSA modulus size used for long-term identity keys.
pub const RSA_KEY_BITS: usize = 2048;
