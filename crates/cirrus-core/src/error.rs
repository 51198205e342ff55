// ============================================
// File: crates/cirrus-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the error taxonomy for protocol and cryptographic operations.
//! The classification here drives session teardown: everything the record
//! layer or the handshake reports is session-fatal, while application
//! failures (missing file, name collision) never reach this type; they
//! travel as typed reply codes inside the session.
//!
//! ## Error Categories
//! 1. **Crypto**: encryption/decryption, signing, key handling failures
//! 2. **Protocol**: counter mismatch, wrong message code, malformed frames
//! 3. **Auth**: handshake could not complete, no session established
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material, IVs, tags or signatures in error messages
//! - `WrongCounter` and `Decryption` are indistinguishable to the peer by
//!   design; do not add detail that would distinguish tampering modes

use thiserror::Error;

use cirrus_common::CommonError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for protocol and cryptographic operations.
///
/// # Security Note
/// Error messages are informative for operators without revealing
/// sensitive material.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================
    /// Encryption operation failed.
    #[error("encryption failed: {context}")]
    Encryption {
        /// What was being encrypted.
        context: String,
    },

    /// Decryption failed: tag mismatch or tampered ciphertext/IV/AAD.
    #[error("decryption failed: authentication error")]
    Decryption,

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Signature creation failed.
    #[error("failed to create signature: {reason}")]
    SignatureCreation {
        /// Why signing failed.
        reason: String,
    },

    /// Key loading, parsing or generation failed.
    #[error("key handling failed: {context}")]
    KeyHandling {
        /// What key operation failed.
        context: String,
    },

    /// Certificate parsing or chain verification failed.
    #[error("certificate verification failed: {reason}")]
    CertificateVerification {
        /// Why the certificate was rejected.
        reason: String,
    },

    // ========================================
    // Protocol Errors
    // ========================================
    /// The counter in a received record does not equal the expected value.
    /// Replayed, dropped, duplicated or injected records land here.
    #[error("wrong counter: expected {expected}, received {received}")]
    WrongCounter {
        /// Counter the receiver expected.
        expected: u32,
        /// Counter carried by the record.
        received: u32,
    },

    /// The peer sent a message code the state machine did not expect.
    #[error("wrong message code: expected {expected}, got 0x{got:02x}")]
    WrongMessageCode {
        /// Human-readable description of the expected code(s).
        expected: String,
        /// The code byte actually received.
        got: u8,
    },

    /// Unknown message code byte.
    #[error("unknown message code: 0x{0:02x}")]
    UnknownMessageCode(u8),

    /// A buffer was shorter than the fixed layout requires.
    #[error("message too short: expected {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// A message or field exceeds the maximum allowed size.
    #[error("message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size.
        max: usize,
        /// Actual size received.
        actual: usize,
    },

    /// The session counter is exhausted; both peers must re-run the
    /// handshake before the next record.
    #[error("session counter exhausted: rekey required")]
    RekeyRequired,

    // ========================================
    // Auth Errors
    // ========================================
    /// The handshake failed: certificate, signature or key agreement.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// The server has no public key for the requested username.
    #[error("username not found")]
    UsernameNotFound,

    // ========================================
    // Wrapped Errors
    // ========================================
    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates a `KeyHandling` error.
    pub fn key_handling(context: impl Into<String>) -> Self {
        Self::KeyHandling {
            context: context.into(),
        }
    }

    /// Creates a `CertificateVerification` error.
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::CertificateVerification {
            reason: reason.into(),
        }
    }

    /// Creates a `WrongCounter` error.
    #[must_use]
    pub const fn wrong_counter(expected: u32, received: u32) -> Self {
        Self::WrongCounter { expected, received }
    }

    /// Creates a `WrongMessageCode` error.
    pub fn wrong_message_code(expected: impl Into<String>, got: u8) -> Self {
        Self::WrongMessageCode {
            expected: expected.into(),
            got,
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error invalidates the current session.
    ///
    /// Every variant of this type is session-fatal; application-level
    /// failures are encoded as reply codes and never become a `CoreError`.
    /// The single exception is [`CoreError::RekeyRequired`], which demands
    /// a fresh handshake rather than a disconnect.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::RekeyRequired)
    }

    /// Returns `true` if this error may indicate an active attack and
    /// warrants a warning-level log entry.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Decryption
                | Self::WrongCounter { .. }
                | Self::WrongMessageCode { .. }
                | Self::SignatureVerification
                | Self::CertificateVerification { .. }
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_counters() {
        let err = CoreError::wrong_counter(7, 3);
        let msg = err.to_string();
        assert!(msg.contains('7') && msg.contains('3'));
    }

    #[test]
    fn classification() {
        assert!(CoreError::Decryption.is_session_fatal());
        assert!(CoreError::Decryption.is_suspicious());
        assert!(CoreError::wrong_counter(1, 2).is_suspicious());
        assert!(!CoreError::RekeyRequired.is_session_fatal());
        assert!(!CoreError::UsernameNotFound.is_suspicious());
    }
}
