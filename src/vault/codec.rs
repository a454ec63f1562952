//! Encrypted vault blob format.
//!
//! A vault file (and every backup snapshot) has this layout:
//!
//! ```text
//! [salt: 32 bytes][nonce: 12 bytes][AES-256-GCM ciphertext][tag: 16 bytes]
//! ```
//!
//! - **Salt**: fresh per encode; the PBKDF2 salt for this blob's key.
//! - **Nonce**: fresh per encode.
//! - **Ciphertext + tag**: the canonical document JSON, sealed with
//!   empty associated data.
//!
//! There is no password-check record.  A wrong password and a damaged
//! file both surface as the same authentication failure.

use crate::crypto::{self, KdfParams, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::errors::{Result, VaultError};

use super::document::VaultDocument;

/// Salt and nonce precede the sealed payload.
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Anything shorter cannot hold a header and an auth tag.
pub const MIN_BLOB_LEN: usize = HEADER_LEN + TAG_LEN;

/// Encodes and decodes `VaultDocument`s under a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultCodec {
    kdf: KdfParams,
}

impl VaultCodec {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf_params(&self) -> KdfParams {
        self.kdf
    }

    /// Encrypt `document` under `password`.
    ///
    /// Draws a new salt and nonce on every call, so the derived key is
    /// never reused across saves.
    pub fn encode(&self, document: &VaultDocument, password: &[u8]) -> Result<Vec<u8>> {
        let salt = crypto::generate_salt();
        let nonce = crypto::generate_nonce();
        let key = crypto::derive_key(password, &salt, &self.kdf);

        let plaintext = document.to_json()?;
        let sealed = crypto::seal(&key, &nonce, &plaintext)?;

        let mut blob = Vec::with_capacity(HEADER_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    /// Decrypt and parse a blob produced by `encode`.
    ///
    /// All-or-nothing: either a fully validated document or an error.
    pub fn decode(&self, blob: &[u8], password: &[u8]) -> Result<VaultDocument> {
        if blob.len() < MIN_BLOB_LEN {
            return Err(VaultError::MalformedInput);
        }

        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| VaultError::MalformedInput)?;
        let nonce: &[u8; NONCE_LEN] = nonce.try_into().map_err(|_| VaultError::MalformedInput)?;

        let key = crypto::derive_key(password, salt, &self.kdf);
        let plaintext = crypto::open(&key, nonce, sealed)?;

        VaultDocument::from_json(&plaintext)
    }
}
