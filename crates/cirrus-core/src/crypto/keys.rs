// ============================================
// File: crates/cirrus-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the key types used throughout the Cirrus protocol with proper
//! security properties (zeroize on drop, no accidental copies, redacted
//! debug output).
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: long-term RSA-2048 signing keys (PKCS#1 v1.5 / SHA-256)
//! - `IdentityPublicKey`: verification half, loadable from PEM or X.509 SPKI
//! - `EphemeralKeyPair`: per-session X25519 key exchange keys
//! - `SessionKey`: derived 128-bit symmetric key
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (long-term)                               │
//! │  ├─ loaded from PEM (client keys are password-encrypted)   │
//! │  ├─ signs the handshake transcript g^a ‖ g^b               │
//! │  └─ server key is bound to an X.509 certificate            │
//! │                                                            │
//! │  EphemeralKeyPair (per-session)                            │
//! │  ├─ generated fresh for each handshake                     │
//! │  ├─ consumed by the X25519 exchange (single use)           │
//! │  └─ private half never leaves this module                  │
//! │                                                            │
//! │  SessionKey (per-session)                                  │
//! │  ├─ SHA-256(shared secret) truncated to 16 bytes           │
//! │  ├─ drives AES-128-GCM for every record                    │
//! │  └─ zeroized at logout, rekey or teardown                  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - private keys must NEVER appear in logs or Debug output
//! - `SessionKey` deliberately has no `Copy`; moves only, `Clone` is for
//!   handing the key to the record layer once per handshake

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::signature::{Keypair, SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AES_KEY_SIZE, RSA_KEY_BITS, RSA_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// IdentityKeyPair (RSA)
// ============================================

/// Long-term RSA identity key pair for signing handshake transcripts.
///
/// Signatures are PKCS#1 v1.5 over SHA-256; with 2048-bit moduli every
/// signature is exactly [`RSA_SIGNATURE_SIZE`] bytes, which the fixed
/// handshake layouts rely on.
pub struct IdentityKeyPair {
    signing_key: SigningKey<Sha256>,
}

impl IdentityKeyPair {
    /// Generates a new random RSA-2048 key pair.
    ///
    /// Key generation is slow; production deployments load PEM files and
    /// only tests and provisioning tools generate keys.
    ///
    /// # Errors
    /// Returns `KeyHandling` if the RNG or prime generation fails.
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|_| CoreError::key_handling("RSA key generation failed"))?;
        Ok(Self::from_private_key(private))
    }

    /// Wraps an existing RSA private key.
    #[must_use]
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        Self {
            signing_key: SigningKey::new(private),
        }
    }

    /// Loads an unencrypted PKCS#8 PEM private key.
    ///
    /// # Errors
    /// Returns `KeyHandling` if the PEM cannot be parsed.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|_| CoreError::key_handling("failed to parse PKCS#8 private key"))?;
        Ok(Self::from_private_key(private))
    }

    /// Loads a password-encrypted PKCS#8 PEM private key (the client-side
    /// key file format).
    ///
    /// # Errors
    /// Returns `KeyHandling` if the PEM is malformed or the password is
    /// wrong; the two cases are deliberately not distinguished.
    pub fn from_pkcs8_encrypted_pem(pem: &str, password: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password)
            .map_err(|_| CoreError::key_handling("failed to decrypt private key"))?;
        Ok(Self::from_private_key(private))
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key())
    }

    /// Signs a message, producing a [`RSA_SIGNATURE_SIZE`]-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_vec()
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material.
        f.debug_struct("IdentityKeyPair").finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public component of an RSA identity key.
///
/// Safe to share; used to verify handshake signatures. On the server side
/// these are loaded from per-user PEM files, on the client side the
/// server's key is extracted from its verified X.509 certificate.
#[derive(Clone)]
pub struct IdentityPublicKey(VerifyingKey<Sha256>);

impl IdentityPublicKey {
    /// Wraps an RSA public key.
    #[must_use]
    pub fn from_public_key(key: RsaPublicKey) -> Self {
        Self(VerifyingKey::new(key))
    }

    /// Loads an SPKI PEM public key (the server's per-user key files).
    ///
    /// # Errors
    /// Returns `KeyHandling` if the PEM cannot be parsed.
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|_| CoreError::key_handling("failed to parse public key PEM"))?;
        Ok(Self::from_public_key(key))
    }

    /// Loads an SPKI DER public key (as found inside a certificate).
    ///
    /// # Errors
    /// Returns `KeyHandling` if the DER cannot be parsed.
    pub fn from_public_key_der(der: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|_| CoreError::key_handling("failed to parse public key DER"))?;
        Ok(Self::from_public_key(key))
    }

    /// Verifies a PKCS#1 v1.5 / SHA-256 signature.
    ///
    /// # Errors
    /// Returns `SignatureVerification` if the signature is malformed or
    /// does not match.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        if signature.len() != RSA_SIGNATURE_SIZE {
            return Err(CoreError::SignatureVerification);
        }
        let signature =
            Signature::try_from(signature).map_err(|_| CoreError::SignatureVerification)?;
        self.0
            .verify(message, &signature)
            .map_err(|_| CoreError::SignatureVerification)
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityPublicKey").finish_non_exhaustive()
    }
}

// ============================================
// EphemeralKeyPair (X25519)
// ============================================

/// Ephemeral X25519 key pair for the handshake's Diffie-Hellman exchange.
///
/// Generated fresh for every handshake. The private half is consumed by
/// [`EphemeralKeyPair::exchange`], so it cannot be reused across sessions.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generates a new random ephemeral key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the public key bytes as sent on the wire.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Performs the key exchange with the peer's public key, consuming
    /// the private half.
    #[must_use]
    pub fn exchange(self, peer_public: &[u8; X25519_PUBLIC_KEY_SIZE]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_public);
        *self.secret.diffie_hellman(&peer).as_bytes()
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.public.as_bytes();
        f.debug_struct("EphemeralKeyPair")
            .field(
                "public",
                &format_args!(
                    "{:02x}{:02x}{:02x}{:02x}...",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ),
            )
            .finish()
    }
}

// ============================================
// SessionKey
// ============================================

/// Symmetric 128-bit session key for the record layer.
///
/// # Security
/// - zeroed on drop
/// - move-only (no `Copy`); `Clone` exists so the handshake can hand the
///   key to the record layer while keeping it for the M5 check
/// - never serialized, never logged; `Debug` prints `[REDACTED]`
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; AES_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; AES_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// The reference must not outlive its immediate cryptographic use.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

#[cfg(test)]
impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_sign_verify() {
        let identity = IdentityKeyPair::generate().unwrap();
        let message = b"transcript bytes";

        let signature = identity.sign(message);
        assert_eq!(signature.len(), RSA_SIGNATURE_SIZE);
        assert!(identity.public_key().verify(message, &signature).is_ok());

        assert!(identity
            .public_key()
            .verify(b"different message", &signature)
            .is_err());
    }

    #[test]
    fn corrupted_signature_rejected() {
        let identity = IdentityKeyPair::generate().unwrap();
        let message = b"transcript bytes";
        let mut signature = identity.sign(message);
        signature[0] ^= 0xFF;
        assert!(matches!(
            identity.public_key().verify(message, &signature),
            Err(CoreError::SignatureVerification)
        ));
    }

    #[test]
    fn wrong_length_signature_rejected() {
        let identity = IdentityKeyPair::generate().unwrap();
        assert!(identity.public_key().verify(b"m", &[0u8; 64]).is_err());
    }

    #[test]
    fn ephemeral_exchange_agrees() {
        let alice = EphemeralKeyPair::generate();
        let bob = EphemeralKeyPair::generate();

        let alice_pub = alice.public_key_bytes();
        let bob_pub = bob.public_key_bytes();

        let alice_shared = alice.exchange(&bob_pub);
        let bob_shared = bob.exchange(&alice_pub);
        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes([0x42; AES_KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SessionKey([REDACTED])");
    }

    #[test]
    fn session_key_zeroized_on_drop() {
        let mut key = SessionKey::from_bytes([0x42; AES_KEY_SIZE]);
        key.zeroize();
        assert_eq!(key.as_bytes(), &[0u8; AES_KEY_SIZE]);
    }
}
