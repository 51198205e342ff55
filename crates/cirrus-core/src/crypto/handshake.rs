// ============================================
// File: crates/cirrus-core/src/crypto/handshake.rs
// ============================================
//! # Handshake Cryptography
//!
//! ## Creation Reason
//! Provides the cryptographic building blocks of the five-message
//! handshake. The client and server drivers live next to their sockets
//! (in `cirrus-client` and `cirrus-server`); everything here is pure
//! computation so both sides provably run the same rules.
//!
//! ## Handshake Flow
//! ```text
//! Client                                          Server
//!   │  M1: username ‖ g^a ─────────────────────────► │
//!   │ ◄───────────────────────── M2: ACK | NACK      │
//!   │ ◄── M3: g^b ‖ {Sig_S(g^a‖g^b)}K ‖ cert         │
//!   │  M4: {Sig_C(g^a‖g^b)}K ──────────────────────► │
//!   │ ◄───────────── M5: envelope(ACK | NACK)        │
//!   │                                                │
//!   │        K = SHA-256(X25519(a, g^b))[0..16]      │
//! ```
//!
//! ## Counter Schedule
//! The AAD counters inside M3, M4 and the M5 envelope are fixed by the
//! protocol: 0, 1, 2. After M5 both sides reset the shared session
//! counter to 0. The constants below are the single source of truth.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The transcript is ALWAYS `g^a ‖ g^b` (client key first) on both
//!   sides; swapping the order breaks signature verification, not
//!   confidentiality, so a test must pin it
//! - Decrypted signatures are zeroized by the callers after verification

use zeroize::Zeroize;

use super::keys::{IdentityKeyPair, IdentityPublicKey, SessionKey};
use super::{aead, GCM_IV_SIZE, GCM_TAG_SIZE, RSA_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Counter Schedule
// ============================================

/// AAD counter inside M3 (server → client).
pub const M3_COUNTER: u32 = 0;

/// AAD counter inside M4 (client → server).
pub const M4_COUNTER: u32 = 1;

/// Envelope counter of M5 (server → client).
pub const M5_COUNTER: u32 = 2;

// ============================================
// Transcript
// ============================================

/// Builds the signed handshake transcript: the client's ephemeral public
/// key followed by the server's, in that order on both sides.
#[must_use]
pub fn transcript(
    client_ephemeral: &[u8; X25519_PUBLIC_KEY_SIZE],
    server_ephemeral: &[u8; X25519_PUBLIC_KEY_SIZE],
) -> [u8; 2 * X25519_PUBLIC_KEY_SIZE] {
    let mut out = [0u8; 2 * X25519_PUBLIC_KEY_SIZE];
    out[..X25519_PUBLIC_KEY_SIZE].copy_from_slice(client_ephemeral);
    out[X25519_PUBLIC_KEY_SIZE..].copy_from_slice(server_ephemeral);
    out
}

/// Signs the handshake transcript with a long-term identity key.
#[must_use]
pub fn sign_transcript(identity: &IdentityKeyPair, transcript: &[u8]) -> Vec<u8> {
    identity.sign(transcript)
}

/// Verifies a peer's transcript signature.
///
/// # Errors
/// Returns `SignatureVerification` if the signature does not match.
pub fn verify_transcript(
    peer: &IdentityPublicKey,
    transcript: &[u8],
    signature: &[u8],
) -> Result<()> {
    peer.verify(transcript, signature)
}

// ============================================
// Signature Encryption (M3 / M4 inner AEAD)
// ============================================

/// Encrypts a transcript signature under the fresh session key, binding
/// the handshake counter into the AAD.
///
/// # Errors
/// Returns `Encryption` on primitive failure or `SignatureCreation` if
/// the signature has an unexpected length.
pub fn encrypt_signature(
    key: &SessionKey,
    counter: u32,
    signature: &[u8],
) -> Result<([u8; GCM_IV_SIZE], [u8; 4], Vec<u8>, [u8; GCM_TAG_SIZE])> {
    if signature.len() != RSA_SIGNATURE_SIZE {
        return Err(CoreError::SignatureCreation {
            reason: format!(
                "signature is {} bytes, expected {RSA_SIGNATURE_SIZE}",
                signature.len()
            ),
        });
    }
    let aad = counter.to_le_bytes();
    let (iv, ciphertext, tag) = aead::encrypt(key.as_bytes(), signature, &aad)?;
    Ok((iv, aad, ciphertext, tag))
}

/// Decrypts an encrypted transcript signature, verifying that the AAD
/// carries the expected handshake counter.
///
/// The caller must zeroize the returned signature after verification.
///
/// # Errors
/// Returns `Decryption` on tag failure and `WrongCounter` if the AAD
/// does not match the handshake schedule.
pub fn decrypt_signature(
    key: &SessionKey,
    expected_counter: u32,
    iv: &[u8; GCM_IV_SIZE],
    aad: &[u8; 4],
    ciphertext: &[u8],
    tag: &[u8; GCM_TAG_SIZE],
) -> Result<Vec<u8>> {
    let mut signature = aead::decrypt(key.as_bytes(), iv, ciphertext, aad, tag)?;

    let received = u32::from_le_bytes(*aad);
    if received != expected_counter {
        signature.zeroize();
        return Err(CoreError::wrong_counter(expected_counter, received));
    }
    Ok(signature)
}

// ============================================
// Tests
// ============================================
