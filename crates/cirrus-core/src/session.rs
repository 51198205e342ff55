// ============================================
// File: crates/cirrus-core/src/session.rs
// ============================================
//! # Session Record Layer
//!
//! ## Creation Reason
//! Holds the per-connection cryptographic state, session key and the
//! shared counter, and implements `seal`/`open`, the only two ways a
//! post-handshake byte ever crosses the trust boundary.
//!
//! ## Counter Discipline
//! Both peers hold one counter per session, starting at 0 after the
//! handshake. Whoever sends a record binds the current counter into the
//! AAD and advances; the receiver requires equality and advances. Any
//! reorder, drop, duplication or injection therefore fails as
//! `WrongCounter` (valid old record) or `Decryption` (anything forged).
//!
//! ## Rekey
//! The counter value `MAX_COUNTER` is never used. `seal`/`open` on an
//! exhausted counter return [`CoreError::RekeyRequired`]; both peers
//! reach that state on the same message boundary and re-run the
//! handshake in lockstep before the next record.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `open` must feed the *received* AAD to the AEAD and only compare
//!   counters afterwards: a forged AAD then fails authentication instead
//!   of leaking which check tripped
//! - the session key is zeroized when the `Session` drops

use crate::crypto::keys::SessionKey;
use crate::crypto::{aead, AAD_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::envelope::Envelope;
use crate::protocol::MAX_COUNTER;

/// Per-connection record-layer state, held symmetrically on both
/// endpoints.
///
/// Created by a successful handshake with the counter at 0; destroyed on
/// logout, fatal error or transport close. The key is zeroized on drop.
pub struct Session {
    key: SessionKey,
    counter: u32,
}

impl Session {
    /// Creates a session with the counter reset to 0, as both peers do
    /// after M5.
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self::with_counter(key, 0)
    }

    /// Creates a session at an explicit counter position. Used by the
    /// handshake (M5 travels at counter 2) and by tests; operations
    /// always start from [`Session::new`].
    #[must_use]
    pub fn with_counter(key: SessionKey, counter: u32) -> Self {
        Self { key, counter }
    }

    /// Current counter value (the one the next record will carry).
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// True when the counter is exhausted and the peers must re-run the
    /// handshake before the next record.
    #[must_use]
    pub const fn needs_rekey(&self) -> bool {
        self.counter == MAX_COUNTER
    }

    /// Encrypts `plaintext` into an envelope carrying the current
    /// counter, then advances the counter.
    ///
    /// # Errors
    /// - `RekeyRequired` if the counter is exhausted
    /// - `Encryption` on primitive failure
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.needs_rekey() {
            return Err(CoreError::RekeyRequired);
        }
        let aad = self.counter.to_le_bytes();
        let (iv, ciphertext, tag) = aead::encrypt(self.key.as_bytes(), plaintext, &aad)?;
        self.counter += 1;
        Ok(Envelope {
            iv,
            aad,
            tag,
            ciphertext,
        }
        .to_bytes())
    }

    /// Parses, authenticates and decrypts a received envelope, requires
    /// its counter to equal the expected value, then advances.
    ///
    /// # Errors
    /// - `RekeyRequired` if the counter is exhausted
    /// - `MessageTooShort` if the buffer is not a whole record
    /// - `Decryption` on tag failure (tampering of any field)
    /// - `WrongCounter` on replayed or reordered records
    pub fn open(&mut self, record: &[u8], plaintext_len: usize) -> Result<Vec<u8>> {
        if self.needs_rekey() {
            return Err(CoreError::RekeyRequired);
        }
        let envelope = Envelope::from_bytes(record, plaintext_len)?;

        debug_assert_eq!(envelope.aad.len(), AAD_SIZE);
        let plaintext = aead::decrypt(
            self.key.as_bytes(),
            &envelope.iv,
            &envelope.ciphertext,
            &envelope.aad,
            &envelope.tag,
        )?;

        let received = envelope.counter();
        if received != self.counter {
            return Err(CoreError::wrong_counter(self.counter, received));
        }
        self.counter += 1;
        Ok(plaintext)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The key never appears; its own Debug is redacted anyway.
        f.debug_struct("Session")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
