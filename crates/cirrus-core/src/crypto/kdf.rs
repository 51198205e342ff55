// ============================================
// File: crates/cirrus-core/src/crypto/kdf.rs
// ============================================
//! # Session Key Derivation
//!
//! ## Creation Reason
//! Turns the X25519 shared secret into the 128-bit AES session key. Both
//! peers run the identical derivation, so any disagreement surfaces as a
//! decryption failure on the very first encrypted handshake field.
//!
//! ## Derivation
//! ```text
//! session_key = SHA-256(shared_secret)[0..16]
//! ```
//! The intermediate digest is zeroized before returning.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::{keys::SessionKey, AES_KEY_SIZE};

/// Derives the session key from the Diffie-Hellman shared secret.
#[must_use]
pub fn derive_session_key(shared_secret: &[u8; 32]) -> SessionKey {
    let mut digest: [u8; 32] = Sha256::digest(shared_secret).into();

    let mut key = [0u8; AES_KEY_SIZE];
    key.copy_from_slice(&digest[..AES_KEY_SIZE]);
    digest.zeroize();

    SessionKey::from_bytes(key)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let secret = [0x42u8; 32];
        assert_eq!(derive_session_key(&secret), derive_session_key(&secret));
    }

    #[test]
    fn different_secrets_different_keys() {
        assert_ne!(
            derive_session_key(&[0x01u8; 32]),
            derive_session_key(&[0x02u8; 32])
        );
    }

    #[test]
    fn matches_sha256_truncation() {
        let secret = [0x07u8; 32];
        let digest = Sha256::digest(secret);
        let key = derive_session_key(&secret);
        assert_eq!(key.as_bytes()[..], digest[..AES_KEY_SIZE]);
    }
}
