//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count is the only tunable.  It is not stored in the
//! vault blob, so the reader must be configured with the same
//! `KdfParams` the writer used (see `VaultConfig::kdf_params`).

use rand::RngCore;
use sha2::Sha256;

use crate::crypto::keys::MasterKey;
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Default iteration count.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Lowest iteration count `KdfParams::new` accepts.
pub const MIN_ITERATIONS: u32 = 1_000;

/// PBKDF2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Build params with an explicit iteration count.
    ///
    /// Rejects counts below `MIN_ITERATIONS` to prevent dangerously
    /// weak settings from slipping in through a config file.
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations < MIN_ITERATIONS {
            return Err(VaultError::KeyDerivationFailed(format!(
                "PBKDF2 iterations must be at least {MIN_ITERATIONS} (got {iterations})"
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Derive a 32-byte key from a password and salt.
///
/// Deterministic: the same password + salt + params always produce the
/// same key.  Infallible once `params` has been validated.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], params: &KdfParams) -> MasterKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut key);
    MasterKey::new(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
