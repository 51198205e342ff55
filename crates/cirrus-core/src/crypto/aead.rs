// ============================================
// File: crates/cirrus-core/src/crypto/aead.rs
// ============================================
//! # AEAD Primitive
//!
//! ## Creation Reason
//! Provides authenticated encryption with associated data for the record
//! layer and the handshake: AES-128-GCM with a 128-bit key, a 96-bit
//! random IV and a 128-bit tag.
//!
//! ## Main Functionality
//! - [`encrypt`]: fresh random IV per call, returns `(iv, ciphertext, tag)`
//! - [`decrypt`]: constant-time tag verification before any plaintext is
//!   released
//!
//! ## Output Layout
//! GCM is length-preserving: the ciphertext has exactly the plaintext
//! length, and the tag travels separately so the envelope can lay it out
//! as `iv ‖ aad ‖ tag ‖ ciphertext`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never reuse a (key, IV) pair; catastrophic for GCM
//! - The AAD is authenticated but not encrypted; the record layer binds
//!   the session counter through it

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes128Gcm;
use rand::rngs::OsRng;
use rand::RngCore;

use super::{AES_KEY_SIZE, GCM_IV_SIZE, GCM_TAG_SIZE};
use crate::error::{CoreError, Result};

/// Encrypts `plaintext` under `key`, binding `aad` into the tag.
///
/// A fresh random 96-bit IV is generated for every call.
///
/// # Returns
/// `(iv, ciphertext, tag)` where `ciphertext.len() == plaintext.len()`.
///
/// # Errors
/// Returns `Encryption` if the primitive fails (malformed key length or
/// internal cipher failure).
pub fn encrypt(
    key: &[u8; AES_KEY_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; GCM_IV_SIZE], Vec<u8>, [u8; GCM_TAG_SIZE])> {
    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|_| CoreError::encryption("failed to initialize cipher"))?;

    let mut iv = [0u8; GCM_IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    let nonce = aes_gcm::Nonce::from_slice(&iv);

    // RustCrypto appends the tag to the ciphertext; split it off so the
    // envelope can carry it as a separate field.
    let mut sealed = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CoreError::encryption("AES-128-GCM encryption failed"))?;

    let tag_offset = sealed.len() - GCM_TAG_SIZE;
    let mut tag = [0u8; GCM_TAG_SIZE];
    tag.copy_from_slice(&sealed[tag_offset..]);
    sealed.truncate(tag_offset);

    Ok((iv, sealed, tag))
}

/// Decrypts and authenticates a ciphertext produced by [`encrypt`].
///
/// The tag is verified in constant time before any plaintext is exposed;
/// on failure no partial plaintext escapes.
///
/// # Errors
/// Returns `Decryption` on tag mismatch or any tampering of the
/// ciphertext, IV or AAD.
pub fn decrypt(
    key: &[u8; AES_KEY_SIZE],
    iv: &[u8; GCM_IV_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
    tag: &[u8; GCM_TAG_SIZE],
) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| CoreError::Decryption)?;
    let nonce = aes_gcm::Nonce::from_slice(iv);

    let mut sealed = Vec::with_capacity(ciphertext.len() + GCM_TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(nonce, Payload { msg: &sealed, aad })
        .map_err(|_| CoreError::Decryption)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; AES_KEY_SIZE] = [0x42; AES_KEY_SIZE];

    #[test]
    fn roundtrip() {
        let plaintext = b"list request payload";
        let aad = 7u32.to_le_bytes();

        let (iv, ciphertext, tag) = encrypt(&KEY, plaintext, &aad).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());

        let decrypted = decrypt(&KEY, &iv, &ciphertext, &aad, &tag).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn fresh_iv_per_call() {
        let (iv1, ct1, _) = encrypt(&KEY, b"same", b"").unwrap();
        let (iv2, ct2, _) = encrypt(&KEY, b"same", b"").unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_fails() {
        let (iv, ct, tag) = encrypt(&KEY, b"secret", b"").unwrap();
        let other = [0x43; AES_KEY_SIZE];
        assert!(matches!(
            decrypt(&other, &iv, &ct, b"", &tag),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn tampered_aad_fails() {
        let aad = 3u32.to_le_bytes();
        let (iv, ct, tag) = encrypt(&KEY, b"payload", &aad).unwrap();
        let wrong_aad = 4u32.to_le_bytes();
        assert!(matches!(
            decrypt(&KEY, &iv, &ct, &wrong_aad, &tag),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn tampered_ciphertext_and_tag_fail() {
        let (iv, mut ct, mut tag) = encrypt(&KEY, b"payload bytes", b"aad").unwrap();

        ct[0] ^= 0x01;
        assert!(decrypt(&KEY, &iv, &ct, b"aad", &tag).is_err());
        ct[0] ^= 0x01;

        tag[GCM_TAG_SIZE - 1] ^= 0x80;
        assert!(decrypt(&KEY, &iv, &ct, b"aad", &tag).is_err());
    }

    #[test]
    fn tampered_iv_fails() {
        let (mut iv, ct, tag) = encrypt(&KEY, b"payload", b"").unwrap();
        iv[0] ^= 0xFF;
        assert!(decrypt(&KEY, &iv, &ct, b"", &tag).is_err());
    }

    #[test]
    fn empty_plaintext() {
        let (iv, ct, tag) = encrypt(&KEY, b"", b"aad").unwrap();
        assert!(ct.is_empty());
        let decrypted = decrypt(&KEY, &iv, &ct, b"aad", &tag).unwrap();
        assert!(decrypted.is_empty());
    }
}
