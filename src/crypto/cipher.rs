//! AES-256-GCM authenticated encryption.
//!
//! Unlike a self-framing cipher helper, `seal` and `open` take the nonce
//! explicitly: the vault codec owns the blob layout and stores the nonce
//! next to the salt.  Associated data is always empty.
//!
//! Layout of `seal`'s output:
//!   [ ciphertext | 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::keys::MasterKey;
use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Generate a fresh random 12-byte nonce.  Call once per `seal`.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt and authenticate `plaintext`.
///
/// Returns ciphertext with the tag appended.
pub fn seal(key: &MasterKey, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))
}

/// Verify and decrypt data produced by `seal`.
///
/// Any failure (wrong key, truncated input, flipped bit) collapses into
/// `WrongPasswordOrCorrupt`; no partial plaintext is ever returned.
pub fn open(
    key: &MasterKey,
    nonce: &[u8; NONCE_LEN],
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < TAG_LEN {
        return Err(VaultError::WrongPasswordOrCorrupt);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::WrongPasswordOrCorrupt)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| VaultError::WrongPasswordOrCorrupt)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_appends_tag() {
        let key = MasterKey::new([0x11; 32]);
        let sealed = seal(&key, &[0u8; NONCE_LEN], b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + TAG_LEN);
    }

    #[test]
    fn open_with_wrong_nonce_fails() {
        let key = MasterKey::new([0x22; 32]);
        let sealed = seal(&key, &[1u8; NONCE_LEN], b"payload").unwrap();
        let err = open(&key, &[2u8; NONCE_LEN], &sealed).unwrap_err();
        assert!(matches!(err, VaultError::WrongPasswordOrCorrupt));
    }

    #[test]
    fn open_rejects_input_shorter_than_tag() {
        let key = MasterKey::new([0x33; 32]);
        assert!(open(&key, &[0u8; NONCE_LEN], &[0u8; TAG_LEN - 1]).is_err());
    }

    #[test]
    fn nonces_are_random() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
