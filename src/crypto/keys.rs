//! In-memory key material.
//!
//! - `MasterKey`: a derived 32-byte AES key, zeroized on drop.
//! - `PasswordVerifier`: HMAC-SHA256 of the session password under a
//!   random per-session key, so the current password can be checked in
//!   constant time without comparing plaintext strings.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::crypto::kdf::KEY_LEN;

/// A wrapper around a 32-byte derived key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to build a cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Verification material for the password held by an unlocked session.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct PasswordVerifier {
    session_key: [u8; 32],
    tag: [u8; 32],
}

impl PasswordVerifier {
    /// Bind a verifier to `password` under a fresh random session key.
    pub fn new(password: &[u8]) -> Self {
        let mut session_key = [0u8; 32];
        rand::rng().fill_bytes(&mut session_key);
        let tag = Self::tag(&session_key, password);
        Self { session_key, tag }
    }

    /// Constant-time check that `candidate` is the bound password.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        let mut other = Self::tag(&self.session_key, candidate);
        let equal: bool = self.tag.ct_eq(&other).into();
        other.zeroize();
        equal
    }

    fn tag(session_key: &[u8; 32], password: &[u8]) -> [u8; 32] {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(session_key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(password);
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }
}

impl std::fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordVerifier([REDACTED])")
    }
}
