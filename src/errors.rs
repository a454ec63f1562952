use std::path::PathBuf;
use thiserror::Error;

use crate::vault::writer::CommitPhase;

/// All errors that can occur in the vault engine.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Input errors ---
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong password or corrupted data")]
    WrongPasswordOrCorrupt,

    #[error("Decryption failed: wrong password or corrupted data")]
    MalformedInput,

    #[error("Invalid vault content: {0}")]
    MalformedContent(String),

    #[error("Unsupported vault version '{0}'")]
    UnsupportedVersion(String),

    // --- Persistence errors ---
    #[error("Save failed during {phase}: {reason}")]
    Persistence { phase: CommitPhase, reason: String },

    #[error("Save failed, staged vault did not verify: {0}")]
    VerificationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Vault errors ---
    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Entry '{0}' not found")]
    NotFound(String),

    #[error("Vault is locked, unlock it first")]
    NotUnlocked,

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`VaultError`], for callers that only care
/// about how to react (re-prompt, report a save failure, fix their call).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Crypto,
    Persistence,
    NotFound,
    NotUnlocked,
    Vault,
    Config,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PasswordTooShort { .. }
            | Self::MissingField(_)
            | Self::InvalidArgument(_)
            | Self::KeyDerivationFailed(_) => ErrorKind::Input,
            Self::EncryptionFailed(_)
            | Self::WrongPasswordOrCorrupt
            | Self::MalformedInput
            | Self::MalformedContent(_)
            | Self::UnsupportedVersion(_) => ErrorKind::Crypto,
            Self::Persistence { .. }
            | Self::VerificationFailed(_)
            | Self::Io(_)
            | Self::SerializationError(_) => ErrorKind::Persistence,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotUnlocked => ErrorKind::NotUnlocked,
            Self::VaultNotFound(_) | Self::VaultAlreadyExists(_) => ErrorKind::Vault,
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// `true` for the two failures a wrong password can produce.
    ///
    /// They share one message and cannot be told apart.
    pub fn is_wrong_password_or_corrupt(&self) -> bool {
        matches!(self, Self::WrongPasswordOrCorrupt | Self::MalformedInput)
    }
}

/// Convenience type alias for vault results.
pub type Result<T> = std::result::Result<T, VaultError>;
