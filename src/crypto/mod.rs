//! Cryptographic primitives for the vault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 password-based key derivation (`kdf`)
//! - AES-256-GCM seal/open with caller-supplied nonces (`cipher`)
//! - Zeroizing key holders and the session password verifier (`keys`)
//! - A random password generator (`password`)

pub mod cipher;
pub mod kdf;
pub mod keys;
pub mod password;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, derive_key, ...};
pub use cipher::{generate_nonce, open, seal, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_key, generate_salt, KdfParams, KEY_LEN, SALT_LEN};
pub use keys::{MasterKey, PasswordVerifier};
pub use password::{generate_password, PasswordPolicy};
