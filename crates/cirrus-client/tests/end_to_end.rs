// ============================================
// File: crates/cirrus-client/tests/end_to_end.rs
// ============================================
//! End-to-end tests: a real server on an ephemeral localhost port, real
//! clients, freshly generated RSA keys and a CA-signed server
//! certificate. Covers the happy handshake, the unknown-user rejection,
//! listing, the upload/download round trip, rename, the delete
//! confirmation legs, logout, and the replay/tampering teardowns.

use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::sha2::Sha256;
use rsa::RsaPrivateKey;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::{Decode, EncodePem};
use x509_cert::name::Name as DistinguishedName;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

use cirrus_client::session::DeleteOutcome;
use cirrus_client::{ClientError, ClientSession};
use cirrus_common::Name;
use cirrus_core::crypto::handshake::{
    decrypt_signature, encrypt_signature, sign_transcript, transcript, verify_transcript,
    M3_COUNTER, M4_COUNTER, M5_COUNTER,
};
use cirrus_core::crypto::kdf::derive_session_key;
use cirrus_core::crypto::{EphemeralKeyPair, IdentityKeyPair, TrustStore};
use cirrus_core::protocol::codec::{decode, encode};
use cirrus_core::protocol::envelope::Envelope;
use cirrus_core::protocol::messages::{
    AUTH_M3_PREFIX_SIZE, LIST_M2_SIZE, SIMPLE_MESSAGE_SIZE,
};
use cirrus_core::protocol::{AuthM1, AuthM3, AuthM4, MessageCode, SimpleMessage};
use cirrus_core::{CoreError, Session};
use cirrus_server::{Server, ServerConfig};
use cirrus_transport::Connection;
use zeroize::Zeroize;

// ============================================
// Shared key material (RSA generation is slow; do it once)
// ============================================

struct TestKeys {
    ca_cert_pem: String,
    server_key_pem: String,
    server_cert_pem: String,
    user_key: RsaPrivateKey,
    user_public_pem: String,
}

fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::rngs::OsRng;
        let ca_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let server_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let user_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();

        let ca_cert = build_cert(&ca_key, &ca_key, true);
        let server_cert = build_cert(&ca_key, &server_key, false);

        TestKeys {
            ca_cert_pem: ca_cert.to_pem(LineEnding::LF).unwrap(),
            server_key_pem: server_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            server_cert_pem: server_cert.to_pem(LineEnding::LF).unwrap(),
            user_public_pem: user_key
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
            user_key,
        }
    })
}

fn build_cert(
    ca_key: &RsaPrivateKey,
    subject_key: &RsaPrivateKey,
    is_ca: bool,
) -> x509_cert::Certificate {
    let signer = SigningKey::<Sha256>::new(ca_key.clone());
    let issuer = DistinguishedName::from_str("CN=Cirrus Test CA").unwrap();
    let profile = if is_ca {
        Profile::Root
    } else {
        Profile::Leaf {
            issuer,
            enable_key_agreement: false,
            enable_key_encipherment: false,
        }
    };
    let subject = if is_ca {
        DistinguishedName::from_str("CN=Cirrus Test CA").unwrap()
    } else {
        DistinguishedName::from_str("CN=cirrus-server").unwrap()
    };
    let spki_der = subject_key
        .to_public_key()
        .to_public_key_der()
        .unwrap();
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap();

    CertificateBuilder::new(
        profile,
        SerialNumber::from(if is_ca { 1u32 } else { 2u32 }),
        Validity::from_now(Duration::from_secs(3600)).unwrap(),
        subject,
        spki,
        &signer,
    )
    .unwrap()
    .build::<rsa::pkcs1v15::Signature>()
    .unwrap()
}

// ============================================
// Server fixture
// ============================================

struct Fixture {
    _dir: tempfile::TempDir,
    addr: SocketAddr,
    data_dir: PathBuf,
}

impl Fixture {
    fn start() -> Self {
        let keys = test_keys();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let resources = root.join("resources");
        std::fs::create_dir_all(resources.join("private_keys")).unwrap();
        std::fs::create_dir_all(resources.join("certificates")).unwrap();
        std::fs::create_dir_all(resources.join("public_keys")).unwrap();
        std::fs::write(
            resources.join("private_keys/Server_key.pem"),
            &keys.server_key_pem,
        )
        .unwrap();
        std::fs::write(
            resources.join("certificates/Server_cert.pem"),
            &keys.server_cert_pem,
        )
        .unwrap();
        std::fs::write(
            resources.join("public_keys/alice_key.pem"),
            &keys.user_public_pem,
        )
        .unwrap();

        let data_dir = root.join("data");
        let config = ServerConfig::from_toml(&format!(
            r#"
                [storage]
                data_dir = "{}"

                [resources]
                private_key = "{}"
                certificate = "{}"
                public_keys_dir = "{}"
            "#,
            data_dir.display(),
            resources.join("private_keys/Server_key.pem").display(),
            resources.join("certificates/Server_cert.pem").display(),
            resources.join("public_keys").display(),
        ))
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(config).unwrap();
        thread::spawn(move || {
            let _ = server.serve(listener);
        });

        Self {
            _dir: dir,
            addr,
            data_dir,
        }
    }

    fn connect(&self, username: &str) -> Result<ClientSession, ClientError> {
        let keys = test_keys();
        ClientSession::connect(
            &self.addr.to_string(),
            Name::new(username).unwrap(),
            IdentityKeyPair::from_private_key(keys.user_key.clone()),
            TrustStore::from_ca_pem(&keys.ca_cert_pem).unwrap(),
        )
    }
}

fn write_patterned_file(path: &Path, len: usize) -> Vec<u8> {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(path, &data).unwrap();
    data
}

// ============================================
// Scenarios
// ============================================

#[test]
fn happy_handshake_and_empty_list() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    // Empty directory: ListM2 with size 0, no ListM3.
    assert!(session.list().unwrap().is_empty());
    // Counters stayed in lockstep: the next operation still works.
    assert!(session.list().unwrap().is_empty());
    session.logout().unwrap();
}

#[test]
fn unknown_user_is_rejected_without_a_session() {
    let fixture = Fixture::start();
    let err = fixture.connect("mallory").unwrap_err();
    assert!(matches!(
        err,
        ClientError::Core(CoreError::UsernameNotFound)
    ));
    assert_eq!(err.code(), 17);
}

#[test]
fn upload_then_download_round_trip() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("readme.txt");
    // Three chunks: 1_000_000 + 1_000_000 + 500_000.
    let payload = write_patterned_file(&local, 2_500_000);

    let name = Name::new("readme.txt").unwrap();
    assert_eq!(session.upload(&local, &name).unwrap(), 2_500_000);
    assert_eq!(session.list().unwrap(), vec!["readme.txt".to_string()]);

    let downloads = scratch.path().join("downloads");
    assert_eq!(session.download(&name, &downloads).unwrap(), 2_500_000);
    let downloaded = std::fs::read(downloads.join("readme.txt")).unwrap();
    assert_eq!(downloaded, payload);

    session.logout().unwrap();
}

#[test]
fn empty_file_uploads_with_zero_chunks() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("empty.bin");
    write_patterned_file(&local, 0);

    let name = Name::new("empty.bin").unwrap();
    assert_eq!(session.upload(&local, &name).unwrap(), 0);

    let downloads = scratch.path().join("downloads");
    assert_eq!(session.download(&name, &downloads).unwrap(), 0);
    assert_eq!(std::fs::read(downloads.join("empty.bin")).unwrap(), b"");

    session.logout().unwrap();
}

#[test]
fn duplicate_upload_is_refused_and_session_survives() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("dup.txt");
    write_patterned_file(&local, 1024);
    let name = Name::new("dup.txt").unwrap();

    session.upload(&local, &name).unwrap();
    let err = session.upload(&local, &name).unwrap_err();
    assert!(matches!(err, ClientError::FileAlreadyExists));
    assert_eq!(err.code(), 32);

    // The session is still established.
    assert_eq!(session.list().unwrap().len(), 1);
    session.logout().unwrap();
}

#[test]
fn download_of_missing_file_is_typed_and_nonfatal() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let err = session
        .download(&Name::new("nope.txt").unwrap(), scratch.path())
        .unwrap_err();
    assert!(matches!(err, ClientError::FileNotFound));

    assert!(session.list().unwrap().is_empty());
    session.logout().unwrap();
}

#[test]
fn rename_and_delete_flows() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("a.txt");
    write_patterned_file(&local, 10);

    let old = Name::new("a.txt").unwrap();
    let new = Name::new("b.txt").unwrap();
    session.upload(&local, &old).unwrap();

    // Rename of a missing source is typed.
    assert!(matches!(
        session.rename(&new, &old).unwrap_err(),
        ClientError::FileNotFound
    ));
    session.rename(&old, &new).unwrap();
    assert_eq!(session.list().unwrap(), vec!["b.txt".to_string()]);

    // Declined delete removes nothing.
    assert_eq!(
        session.delete(&new, || false).unwrap(),
        DeleteOutcome::Declined
    );
    assert_eq!(session.list().unwrap().len(), 1);

    // Confirmed delete removes the file.
    assert_eq!(
        session.delete(&new, || true).unwrap(),
        DeleteOutcome::Deleted
    );
    assert!(session.list().unwrap().is_empty());

    // Deleting it again reports FilenameNotFound.
    assert!(matches!(
        session.delete(&new, || true).unwrap_err(),
        ClientError::FileNotFound
    ));

    session.logout().unwrap();
}

#[test]
fn server_files_are_confined_per_user() {
    let fixture = Fixture::start();
    let mut session = fixture.connect("alice").unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("mine.txt");
    write_patterned_file(&local, 64);
    session
        .upload(&local, &Name::new("mine.txt").unwrap())
        .unwrap();
    session.logout().unwrap();

    assert!(fixture.data_dir.join("alice/mine.txt").exists());
}

// ============================================
// Adversarial scenarios (raw protocol driver)
// ============================================

/// Client half of the handshake built from the core primitives alone;
/// returns the established record-layer session.
fn raw_handshake(conn: &mut Connection, username: &str) -> Session {
    let keys = test_keys();
    let identity = IdentityKeyPair::from_private_key(keys.user_key.clone());
    let trust = TrustStore::from_ca_pem(&keys.ca_cert_pem).unwrap();

    let ephemeral = EphemeralKeyPair::generate();
    let client_ephemeral = ephemeral.public_key_bytes();
    conn.send(&encode(&AuthM1 {
        username: Name::new(username).unwrap(),
        ephemeral_key: client_ephemeral,
    }))
    .unwrap();

    let m2: SimpleMessage = decode(&conn.receive(SIMPLE_MESSAGE_SIZE).unwrap()).unwrap();
    assert_eq!(m2.code, MessageCode::Ack);

    let mut m3_buf = conn.receive(AUTH_M3_PREFIX_SIZE).unwrap();
    let len_bytes = conn.receive(4).unwrap();
    let cert_len = u32::from_le_bytes(len_bytes.as_slice().try_into().unwrap()) as usize;
    let cert_buf = conn.receive(cert_len).unwrap();
    m3_buf.extend_from_slice(&len_bytes);
    m3_buf.extend_from_slice(&cert_buf);
    let m3: AuthM3 = decode(&m3_buf).unwrap();

    let mut shared = ephemeral.exchange(&m3.ephemeral_key);
    let key = derive_session_key(&shared);
    shared.zeroize();

    let transcript_bytes = transcript(&client_ephemeral, &m3.ephemeral_key);
    let server_signature = decrypt_signature(
        &key,
        M3_COUNTER,
        &m3.iv,
        &m3.aad,
        &m3.encrypted_signature,
        &m3.tag,
    )
    .unwrap();
    let server_public = trust.verify_peer(&m3.certificate_der).unwrap();
    verify_transcript(&server_public, &transcript_bytes, &server_signature).unwrap();

    let signature = sign_transcript(&identity, &transcript_bytes);
    let (iv, aad, encrypted_signature, tag) =
        encrypt_signature(&key, M4_COUNTER, &signature).unwrap();
    conn.send(&encode(&AuthM4 {
        iv,
        aad,
        tag,
        encrypted_signature,
    }))
    .unwrap();

    let record = conn
        .receive(Envelope::wire_size(SIMPLE_MESSAGE_SIZE))
        .unwrap();
    let mut m5_session = Session::with_counter(key.clone(), M5_COUNTER);
    let m5: SimpleMessage =
        decode(&m5_session.open(&record, SIMPLE_MESSAGE_SIZE).unwrap()).unwrap();
    assert_eq!(m5.code, MessageCode::Ack);

    Session::new(key)
}

/// The server must drop the connection; observe it as a read failure.
fn assert_connection_torn_down(conn: &mut Connection) {
    let result = conn.receive(Envelope::wire_size(LIST_M2_SIZE));
    assert!(result.is_err(), "server kept the session alive");
}

#[test]
fn replayed_record_tears_the_session_down() {
    let fixture = Fixture::start();
    let mut conn = Connection::connect(fixture.addr).unwrap();
    let mut session = raw_handshake(&mut conn, "alice");

    let record = session
        .seal(&encode(&SimpleMessage::new(MessageCode::ListRequest)))
        .unwrap();
    conn.send(&record).unwrap();

    // Consume the legitimate ListM2 reply (empty directory).
    let reply = conn.receive(Envelope::wire_size(LIST_M2_SIZE)).unwrap();
    session.open(&reply, LIST_M2_SIZE).unwrap();

    // Re-inject the captured request: same key, stale counter.
    conn.send(&record).unwrap();
    assert_connection_torn_down(&mut conn);
}

#[test]
fn tampered_tag_tears_the_session_down() {
    let fixture = Fixture::start();
    let mut conn = Connection::connect(fixture.addr).unwrap();
    let mut session = raw_handshake(&mut conn, "alice");

    let mut record = session
        .seal(&encode(&SimpleMessage::new(MessageCode::ListRequest)))
        .unwrap();
    // One bit inside the tag region (bytes 16..32).
    record[20] ^= 0x01;
    conn.send(&record).unwrap();
    assert_connection_torn_down(&mut conn);
}

#[test]
fn wrong_request_code_tears_the_session_down() {
    let fixture = Fixture::start();
    let mut conn = Connection::connect(fixture.addr).unwrap();
    let mut session = raw_handshake(&mut conn, "alice");

    // DownloadAck is not a request code; the dispatch loop must bail.
    let record = session
        .seal(&encode(&SimpleMessage::new(MessageCode::DownloadAck)))
        .unwrap();
    conn.send(&record).unwrap();
    assert_connection_torn_down(&mut conn);
}

// ============================================
// Encrypted key file round trip
// ============================================

#[test]
fn password_encrypted_private_key_round_trip() {
    let keys = test_keys();
    let pem = keys
        .user_key
        .to_pkcs8_encrypted_pem(&mut rand::rngs::OsRng, b"hunter2", LineEnding::LF)
        .unwrap();

    let identity = IdentityKeyPair::from_pkcs8_encrypted_pem(&pem, b"hunter2").unwrap();
    let probe = identity.sign(b"probe");
    assert!(identity.public_key().verify(b"probe", &probe).is_ok());

    assert!(IdentityKeyPair::from_pkcs8_encrypted_pem(&pem, b"wrong").is_err());
}
