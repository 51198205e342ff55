// ============================================
// File: crates/cirrus-core/src/crypto/certs.rs
// ============================================
//! # X.509 Certificate Verification
//!
//! ## Creation Reason
//! The client authenticates the server through an X.509 certificate
//! carried in the third handshake message. This module validates that
//! certificate against a trusted CA and extracts the server's long-term
//! RSA key from it.
//!
//! ## Main Functionality
//! - [`TrustStore`]: process-wide read-only trust anchor, initialized
//!   before any session runs and injected as a handle (no global state)
//! - Certificate checks: sha256WithRSAEncryption signature over the TBS
//!   bytes, validity window against the system clock
//! - PEM ⇄ DER helpers for the certificate files on disk
//!
//! ## ⚠️ Important Note for Next Developer
//! - The signature must be verified over the re-encoded TBS DER, never
//!   over the whole certificate
//! - A certificate that parses but uses a different signature algorithm
//!   is rejected outright; no algorithm negotiation exists here

use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::debug;
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

use super::keys::IdentityPublicKey;
use crate::error::{CoreError, Result};

/// OID of sha256WithRSAEncryption, the only signature algorithm accepted
/// on certificates.
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

// ============================================
// TrustStore
// ============================================

/// Trust anchor for verifying server certificates.
///
/// Loaded once at startup from the configured CA certificate and shared
/// read-only for the lifetime of the process.
pub struct TrustStore {
    ca_public: IdentityPublicKey,
}

impl TrustStore {
    /// Builds a trust store from a PEM-encoded CA certificate.
    ///
    /// # Errors
    /// Returns `CertificateVerification` if the PEM cannot be parsed or
    /// carries no RSA key.
    pub fn from_ca_pem(pem: &str) -> Result<Self> {
        let ca = Certificate::from_pem(pem)
            .map_err(|_| CoreError::certificate("failed to parse CA certificate PEM"))?;
        Self::from_ca(&ca)
    }

    /// Builds a trust store from a DER-encoded CA certificate.
    ///
    /// # Errors
    /// Returns `CertificateVerification` if the DER cannot be parsed or
    /// carries no RSA key.
    pub fn from_ca_der(der: &[u8]) -> Result<Self> {
        let ca = Certificate::from_der(der)
            .map_err(|_| CoreError::certificate("failed to parse CA certificate DER"))?;
        Self::from_ca(&ca)
    }

    fn from_ca(ca: &Certificate) -> Result<Self> {
        Ok(Self {
            ca_public: subject_public_key(ca)?,
        })
    }

    /// Verifies a peer certificate against the trust anchor and returns
    /// the subject's RSA public key.
    ///
    /// Checks, in order: DER parse, signature algorithm, CA signature over
    /// the TBS bytes, validity window.
    ///
    /// # Errors
    /// Returns `CertificateVerification` describing the first failed
    /// check.
    pub fn verify_peer(&self, cert_der: &[u8]) -> Result<IdentityPublicKey> {
        let cert = Certificate::from_der(cert_der)
            .map_err(|_| CoreError::certificate("failed to parse peer certificate"))?;

        if cert.signature_algorithm.oid != SHA256_WITH_RSA {
            return Err(CoreError::certificate("unsupported signature algorithm"));
        }

        let tbs = cert
            .tbs_certificate
            .to_der()
            .map_err(|_| CoreError::certificate("failed to re-encode TBS certificate"))?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| CoreError::certificate("certificate signature has unused bits"))?;
        self.ca_public
            .verify(&tbs, signature)
            .map_err(|_| CoreError::certificate("certificate not signed by trusted CA"))?;

        let now = SystemTime::now();
        let not_before = cert.tbs_certificate.validity.not_before.to_system_time();
        let not_after = cert.tbs_certificate.validity.not_after.to_system_time();
        if now < not_before {
            return Err(CoreError::certificate("certificate not yet valid"));
        }
        if now > not_after {
            return Err(CoreError::certificate("certificate expired"));
        }

        debug!(
            fingerprint = %hex::encode(Sha256::digest(cert_der)),
            "peer certificate verified"
        );
        subject_public_key(&cert)
    }
}

/// Extracts the subject's RSA public key from a certificate.
fn subject_public_key(cert: &Certificate) -> Result<IdentityPublicKey> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|_| CoreError::certificate("failed to encode subject public key"))?;
    IdentityPublicKey::from_public_key_der(&spki)
        .map_err(|_| CoreError::certificate("subject key is not an RSA key"))
}

/// Converts a PEM-encoded certificate to the DER form sent on the wire.
///
/// # Errors
/// Returns `CertificateVerification` if the PEM cannot be parsed.
pub fn certificate_pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let cert = Certificate::from_pem(pem)
        .map_err(|_| CoreError::certificate("failed to parse certificate PEM"))?;
    cert.to_der()
        .map_err(|_| CoreError::certificate("failed to encode certificate DER"))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::sha2::Sha256;
    use rsa::RsaPrivateKey;
    use x509_cert::builder::{Builder, CertificateBuilder, Profile};
    use x509_cert::name::Name as DistinguishedName;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Validity;

    use super::*;
    use crate::crypto::RSA_KEY_BITS;

    fn new_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_KEY_BITS).unwrap()
    }

    fn spki_for(key: &RsaPrivateKey) -> SubjectPublicKeyInfoOwned {
        let der = key.to_public_key().to_public_key_der().unwrap();
        SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).unwrap()
    }

    fn build_ca(key: &RsaPrivateKey) -> Certificate {
        let signer = SigningKey::<Sha256>::new(key.clone());
        let subject = DistinguishedName::from_str("CN=Cirrus Test CA").unwrap();
        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(1u32),
            Validity::from_now(Duration::from_secs(3600)).unwrap(),
            subject,
            spki_for(key),
            &signer,
        )
        .unwrap();
        builder.build::<rsa::pkcs1v15::Signature>().unwrap()
    }

    fn build_leaf(ca_key: &RsaPrivateKey, leaf_key: &RsaPrivateKey, ttl: Duration) -> Certificate {
        let signer = SigningKey::<Sha256>::new(ca_key.clone());
        let issuer = DistinguishedName::from_str("CN=Cirrus Test CA").unwrap();
        let subject = DistinguishedName::from_str("CN=cirrus-server").unwrap();
        let builder = CertificateBuilder::new(
            Profile::Leaf {
                issuer,
                enable_key_agreement: false,
                enable_key_encipherment: false,
            },
            SerialNumber::from(2u32),
            Validity::from_now(ttl).unwrap(),
            subject,
            spki_for(leaf_key),
            &signer,
        )
        .unwrap();
        builder.build::<rsa::pkcs1v15::Signature>().unwrap()
    }

    #[test]
    fn verifies_ca_signed_certificate() {
        let ca_key = new_key();
        let server_key = new_key();
        let ca = build_ca(&ca_key);
        let leaf = build_leaf(&ca_key, &server_key, Duration::from_secs(3600));

        let store = TrustStore::from_ca_der(&ca.to_der().unwrap()).unwrap();
        let server_public = store.verify_peer(&leaf.to_der().unwrap()).unwrap();

        // The extracted key verifies signatures made by the server key.
        let identity = crate::crypto::IdentityKeyPair::from_private_key(server_key);
        let signature = identity.sign(b"probe");
        assert!(server_public.verify(b"probe", &signature).is_ok());
    }

    #[test]
    fn rejects_certificate_from_unknown_ca() {
        let ca_key = new_key();
        let rogue_ca_key = new_key();
        let server_key = new_key();

        let ca = build_ca(&ca_key);
        let rogue_leaf = build_leaf(&rogue_ca_key, &server_key, Duration::from_secs(3600));

        let store = TrustStore::from_ca_der(&ca.to_der().unwrap()).unwrap();
        let result = store.verify_peer(&rogue_leaf.to_der().unwrap());
        assert!(matches!(
            result,
            Err(CoreError::CertificateVerification { .. })
        ));
    }

    #[test]
    fn rejects_tampered_certificate() {
        let ca_key = new_key();
        let server_key = new_key();
        let ca = build_ca(&ca_key);
        let leaf = build_leaf(&ca_key, &server_key, Duration::from_secs(3600));

        let store = TrustStore::from_ca_der(&ca.to_der().unwrap()).unwrap();
        let mut der = leaf.to_der().unwrap();
        // Flip a byte inside the TBS region.
        der[40] ^= 0x01;
        assert!(store.verify_peer(&der).is_err());
    }

    #[test]
    fn rejects_garbage_der() {
        let ca_key = new_key();
        let ca = build_ca(&ca_key);
        let store = TrustStore::from_ca_der(&ca.to_der().unwrap()).unwrap();
        assert!(store.verify_peer(b"not a certificate").is_err());
    }
}
