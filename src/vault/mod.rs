//! Vault module: the encrypted credential store.
//!
//! This module provides:
//! - `SecretRecord`, `NewRecord` and `RecordPatch` (`record`)
//! - The plaintext `VaultDocument` and its JSON form (`document`)
//! - Lenient ISO 8601 timestamp parsing (`timestamp`)
//! - The salt ‖ nonce ‖ ciphertext blob format (`codec`)
//! - Timestamped backup snapshots (`backup`)
//! - The verify-before-replace commit protocol (`writer`)
//! - The `VaultStore` session API (`store`)

pub mod backup;
pub mod codec;
pub mod document;
pub mod record;
pub mod store;
pub mod timestamp;
pub mod writer;

// Re-export the most commonly used items.
pub use backup::BackupRetention;
pub use codec::VaultCodec;
pub use document::{VaultDocument, CURRENT_VERSION};
pub use record::{NewRecord, RecordPatch, SecretRecord, VaultStats, DEFAULT_CATEGORY};
pub use store::{VaultStore, MIN_PASSWORD_LEN};
pub use writer::{BlobIo, CommitPhase, DurableWriter, FsBlobIo};
