// ============================================
// File: crates/cirrus-server/src/services/handshake.rs
// ============================================
//! # Handshake Service (server side)
//!
//! ## Creation Reason
//! Drives the server half of the five-message handshake over a blocking
//! connection, producing an established [`Session`] and the
//! authenticated username.
//!
//! ## Message Flow
//! ```text
//! ◄── M1  username ‖ g^a                 (cleartext)
//! ──► M2  ACK | NACK                     (cleartext; NACK ends it)
//! ──► M3  g^b ‖ {Sig_S(g^a‖g^b)}K ‖ cert (counter 0 inside the AEAD)
//! ◄── M4  {Sig_C(g^a‖g^b)}K              (counter 1)
//! ──► M5  envelope(ACK | NACK)           (counter 2; then reset to 0)
//! ```
//!
//! The client learns nothing beyond `USERNAME_NOT_FOUND` when the lookup
//! fails, and an M5 NACK when its signature does not verify.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The user lookup reads `<public_keys_dir>/<username>_key.pem`; the
//!   username has passed `Name` validation, so it cannot escape that
//!   directory
//! - The decrypted client signature is zeroized right after verification

use std::path::PathBuf;

use tracing::{debug, info, warn};
use zeroize::Zeroize;

use cirrus_common::Name;
use cirrus_core::crypto::handshake::{
    decrypt_signature, encrypt_signature, sign_transcript, transcript, verify_transcript,
    M3_COUNTER, M4_COUNTER, M5_COUNTER,
};
use cirrus_core::crypto::kdf::derive_session_key;
use cirrus_core::crypto::{certs, EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey};
use cirrus_core::protocol::codec::{decode, encode};
use cirrus_core::protocol::messages::{AUTH_M1_SIZE, AUTH_M4_SIZE};
use cirrus_core::protocol::{AuthM1, AuthM3, AuthM4, MessageCode, SimpleMessage};
use cirrus_core::{CoreError, Session};
use cirrus_transport::Connection;

use crate::config::ResourcesConfig;
use crate::error::{Result, ServerError};

// ============================================
// HandshakeService
// ============================================

/// Server-side authenticator: long-term key, certificate and the
/// registered-user public key directory. Read-only after startup and
/// shared by every worker thread.
pub struct HandshakeService {
    identity: IdentityKeyPair,
    certificate_der: Vec<u8>,
    public_keys_dir: PathBuf,
}

impl HandshakeService {
    /// Loads the server credential material.
    ///
    /// # Errors
    /// Returns `Resource` naming the file that failed to load or parse.
    pub fn from_resources(resources: &ResourcesConfig) -> Result<Self> {
        let key_pem = std::fs::read_to_string(&resources.private_key).map_err(|e| {
            ServerError::resource(resources.private_key.display().to_string(), e.to_string())
        })?;
        let identity = IdentityKeyPair::from_pkcs8_pem(&key_pem).map_err(|e| {
            ServerError::resource(resources.private_key.display().to_string(), e.to_string())
        })?;

        let cert_pem = std::fs::read_to_string(&resources.certificate).map_err(|e| {
            ServerError::resource(resources.certificate.display().to_string(), e.to_string())
        })?;
        let certificate_der = certs::certificate_pem_to_der(&cert_pem).map_err(|e| {
            ServerError::resource(resources.certificate.display().to_string(), e.to_string())
        })?;

        Ok(Self {
            identity,
            certificate_der,
            public_keys_dir: resources.public_keys_dir.clone(),
        })
    }

    /// Builds the service from in-memory material (used by tests).
    #[must_use]
    pub fn new(
        identity: IdentityKeyPair,
        certificate_der: Vec<u8>,
        public_keys_dir: PathBuf,
    ) -> Self {
        Self {
            identity,
            certificate_der,
            public_keys_dir,
        }
    }

    /// Looks up a registered user's public key.
    fn lookup_user(&self, username: &Name) -> Option<IdentityPublicKey> {
        let path = self
            .public_keys_dir
            .join(format!("{}_key.pem", username.as_str()));
        let pem = std::fs::read_to_string(&path).ok()?;
        match IdentityPublicKey::from_public_key_pem(&pem) {
            Ok(key) => Some(key),
            Err(_) => {
                warn!(user = %username, "registered public key file is unparseable");
                None
            }
        }
    }

    /// Runs the server half of the handshake.
    ///
    /// # Errors
    /// - `Core(UsernameNotFound)` after an M2 NACK (no session key was
    ///   ever derived)
    /// - `Core(AuthenticationFailure)` after an M5 NACK
    /// - transport, codec and AEAD errors as session-fatal kinds
    pub fn authenticate(&self, conn: &mut Connection) -> Result<(Session, Name)> {
        // M1: username and client ephemeral key, cleartext.
        let m1_buf = conn.receive(AUTH_M1_SIZE)?;
        let m1: AuthM1 = decode(&m1_buf)?;
        debug!(user = %m1.username, "authentication request received");

        // M2: ACK when the user is registered, NACK otherwise.
        let client_public = self.lookup_user(&m1.username);
        let m2_code = if client_public.is_some() {
            MessageCode::Ack
        } else {
            MessageCode::Nack
        };
        conn.send(&encode(&SimpleMessage::new(m2_code)))?;
        let Some(client_public) = client_public else {
            info!(user = %m1.username, "unknown user rejected");
            return Err(CoreError::UsernameNotFound.into());
        };

        // Key agreement: fresh ephemeral pair, shared secret, session key.
        let ephemeral = EphemeralKeyPair::generate();
        let server_ephemeral = ephemeral.public_key_bytes();
        let mut shared = ephemeral.exchange(&m1.ephemeral_key);
        let key = derive_session_key(&shared);
        shared.zeroize();

        // M3: signed transcript encrypted under the fresh key, plus the
        // server certificate.
        let transcript_bytes = transcript(&m1.ephemeral_key, &server_ephemeral);
        let signature = sign_transcript(&self.identity, &transcript_bytes);
        let (iv, aad, encrypted_signature, tag) = encrypt_signature(&key, M3_COUNTER, &signature)?;
        let m3 = AuthM3 {
            ephemeral_key: server_ephemeral,
            iv,
            aad,
            tag,
            encrypted_signature,
            certificate_der: self.certificate_der.clone(),
        };
        conn.send(&encode(&m3))?;

        // M4: the client's encrypted transcript signature.
        let m4_buf = conn.receive(AUTH_M4_SIZE)?;
        let m4: AuthM4 = decode(&m4_buf)?;
        let mut client_signature = decrypt_signature(
            &key,
            M4_COUNTER,
            &m4.iv,
            &m4.aad,
            &m4.encrypted_signature,
            &m4.tag,
        )?;
        let verified =
            verify_transcript(&client_public, &transcript_bytes, &client_signature).is_ok();
        client_signature.zeroize();

        // M5: verdict inside the record layer at counter 2; afterwards
        // both sides reset the shared counter to 0.
        let m5_code = if verified {
            MessageCode::Ack
        } else {
            MessageCode::Nack
        };
        let mut m5_session = Session::with_counter(key.clone(), M5_COUNTER);
        let record = m5_session.seal(&encode(&SimpleMessage::new(m5_code)))?;
        conn.send(&record)?;

        if !verified {
            warn!(user = %m1.username, "client signature verification failed");
            return Err(CoreError::AuthenticationFailure.into());
        }

        info!(user = %m1.username, "authentication succeeded");
        Ok((Session::new(key), m1.username))
    }
}

impl std::fmt::Debug for HandshakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeService")
            .field("public_keys_dir", &self.public_keys_dir)
            .finish_non_exhaustive()
    }
}
