//! Integration tests for the crypto module and the vault codec.

use proptest::prelude::*;
use secretvault::crypto::kdf::MIN_ITERATIONS;
use secretvault::crypto::{derive_key, generate_nonce, generate_salt, open, seal, KdfParams};
use secretvault::vault::codec::{VaultCodec, MIN_BLOB_LEN};
use secretvault::vault::VaultDocument;
use secretvault::VaultError;

fn fast_kdf() -> KdfParams {
    KdfParams::new(MIN_ITERATIONS).unwrap()
}

fn codec() -> VaultCodec {
    VaultCodec::new(fast_kdf())
}

/// Helper: build a document from (title, username, password) triples.
fn document(records: &[(&str, &str, &str)]) -> VaultDocument {
    let mut doc = VaultDocument::new();
    for (title, user, pw) in records {
        let json = serde_json::json!({
            "id": format!("id-{title}"),
            "title": title,
            "username": user,
            "password": pw,
            "url": "",
            "notes": "",
            "category": "Default",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-02T12:00:00.123456789Z",
        });
        doc.insert(serde_json::from_value(json).unwrap());
    }
    doc
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

#[test]
fn seal_open_roundtrip() {
    let key = derive_key(b"my-secure-passphrase", &generate_salt(), &fast_kdf());
    let nonce = generate_nonce();
    let plaintext = b"{\"entries\":[]}";

    let sealed = seal(&key, &nonce, plaintext).expect("seal should succeed");
    assert!(sealed.len() > plaintext.len());

    let recovered = open(&key, &nonce, &sealed).expect("open should succeed");
    assert_eq!(recovered.as_slice(), plaintext);
}

#[test]
fn open_with_wrong_key_fails_opaquely() {
    let salt = generate_salt();
    let key = derive_key(b"password-one", &salt, &fast_kdf());
    let wrong = derive_key(b"password-two", &salt, &fast_kdf());
    let nonce = generate_nonce();

    let sealed = seal(&key, &nonce, b"TOP_SECRET=42").unwrap();
    let err = open(&wrong, &nonce, &sealed).unwrap_err();
    assert!(matches!(err, VaultError::WrongPasswordOrCorrupt));
}

#[test]
fn open_truncated_fails() {
    let key = derive_key(b"pw", &generate_salt(), &fast_kdf());
    let nonce = generate_nonce();
    let sealed = seal(&key, &nonce, b"VALUE=abc").unwrap();

    assert!(open(&key, &nonce, &sealed[..sealed.len() - 1]).is_err());
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derive_key_different_salts_different_keys() {
    let a = derive_key(b"same-password", &generate_salt(), &fast_kdf());
    let b = derive_key(b"same-password", &generate_salt(), &fast_kdf());
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn derive_key_different_passwords_different_keys() {
    let salt = generate_salt();
    let a = derive_key(b"password-one", &salt, &fast_kdf());
    let b = derive_key(b"password-two", &salt, &fast_kdf());
    assert_ne!(a.as_bytes(), b.as_bytes());
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[test]
fn codec_roundtrip_preserves_document() {
    let doc = document(&[("GitHub", "me", "x1"), ("Bank", "acct", "p@ss")]);
    let blob = codec().encode(&doc, b"longpassword123").unwrap();
    assert_eq!(codec().decode(&blob, b"longpassword123").unwrap(), doc);
}

#[test]
fn codec_wrong_password_is_crypto_error() {
    let doc = document(&[("GitHub", "me", "x1")]);
    let blob = codec().encode(&doc, b"longpassword123").unwrap();

    let err = codec().decode(&blob, b"longpassword124").unwrap_err();
    assert!(err.is_wrong_password_or_corrupt());
    assert_eq!(err.kind(), secretvault::ErrorKind::Crypto);
}

#[test]
fn codec_blob_does_not_contain_plaintext() {
    let doc = document(&[("GitHub", "me", "hunter2-very-secret")]);
    let blob = codec().encode(&doc, b"longpassword123").unwrap();
    let needle = b"hunter2-very-secret";
    assert!(!blob.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn flipping_any_single_byte_breaks_decode() {
    let doc = document(&[("GitHub", "me", "x1")]);
    let blob = codec().encode(&doc, b"longpassword123").unwrap();

    for i in 0..blob.len() {
        let bit = 1u8 << (i % 8);
        let mut damaged = blob.clone();
        damaged[i] ^= bit;
        assert!(
            codec().decode(&damaged, b"longpassword123").is_err(),
            "flipping bit {} of byte {i} went unnoticed",
            i % 8
        );
    }
}

#[test]
fn empty_and_short_blobs_are_malformed_input() {
    for len in [0, 1, 44, MIN_BLOB_LEN - 1] {
        let err = codec().decode(&vec![0u8; len], b"pw").unwrap_err();
        assert!(matches!(err, VaultError::MalformedInput), "len {len}");
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decode_inverts_encode(
        titles in proptest::collection::vec("[a-zA-Z0-9 ]{1,12}", 0..5),
        secret in "\\PC{0,24}",
        password in "\\PC{1,20}",
    ) {
        let mut doc = VaultDocument::new();
        for (i, title) in titles.iter().enumerate() {
            let json = serde_json::json!({
                "id": format!("{i}"),
                "title": title,
                "password": secret,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
            });
            doc.insert(serde_json::from_value(json).unwrap());
        }

        let blob = codec().encode(&doc, password.as_bytes()).unwrap();
        prop_assert_eq!(codec().decode(&blob, password.as_bytes()).unwrap(), doc);
    }

    #[test]
    fn other_password_never_decodes(
        p1 in "[a-z]{8,16}",
        p2 in "[a-z]{8,16}",
    ) {
        prop_assume!(p1 != p2);
        let blob = codec().encode(&VaultDocument::new(), p1.as_bytes()).unwrap();
        let err = codec().decode(&blob, p2.as_bytes()).unwrap_err();
        prop_assert!(err.is_wrong_password_or_corrupt());
    }
}
