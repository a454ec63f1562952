pub mod config;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod vault;

pub use config::VaultConfig;
pub use errors::{ErrorKind, Result, VaultError};
pub use vault::{NewRecord, RecordPatch, SecretRecord, VaultStats, VaultStore};
