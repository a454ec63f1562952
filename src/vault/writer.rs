//! Verified, atomic persistence of the vault file.
//!
//! A commit runs four phases in order:
//!
//! 1. **Staging**: encode the document and write it to
//!    `.<vault file>.tmp` in the same directory as the vault.
//! 2. **Verifying**: read the temp file back and decode it with the
//!    same password.  The result must equal the in-memory document.
//! 3. **BackingUp**: if a vault file already exists, snapshot it.
//! 4. **Committing**: rename the temp file over the vault file.
//!
//! A failure in any phase before `Committing` removes the temp file and
//! leaves the vault file byte-for-byte unchanged.  The rename itself is
//! the only step that touches the vault file.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::backup::BackupRetention;
use super::codec::VaultCodec;
use super::document::VaultDocument;
use crate::config::VaultConfig;
use crate::errors::{Result, VaultError};

/// Step of the commit protocol, carried by `VaultError::Persistence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Staging,
    Verifying,
    BackingUp,
    Committing,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staging => "staging",
            Self::Verifying => "verification",
            Self::BackingUp => "backup",
            Self::Committing => "commit",
        };
        f.write_str(name)
    }
}

/// File operations used by the commit protocol.
///
/// `FsBlobIo` is the real implementation; tests substitute one that
/// fails or corrupts data at a chosen step.
pub trait BlobIo: Send + Sync {
    /// Create or truncate `path` and durably write `bytes`.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Atomically replace `to` with `from`.
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// `BlobIo` over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBlobIo;

impl BlobIo for FsBlobIo {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner-only read/write.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)?;

        // Persist the directory entry too (best-effort).
        #[cfg(unix)]
        {
            let dir = match to.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
                warn!(error = %e, "could not fsync vault directory");
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// SHA-256 of `bytes`, hex encoded.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Owns every read and write of one vault file.
pub struct DurableWriter {
    primary: PathBuf,
    temp: PathBuf,
    codec: VaultCodec,
    backups: BackupRetention,
    io: Arc<dyn BlobIo>,
    last_checksum: Option<String>,
}

impl fmt::Debug for DurableWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableWriter")
            .field("primary", &self.primary)
            .field("temp", &self.temp)
            .field("backups", &self.backups)
            .field("last_checksum", &self.last_checksum)
            .finish_non_exhaustive()
    }
}

impl DurableWriter {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        Self::with_io(config, Arc::new(FsBlobIo))
    }

    /// Build a writer that performs file I/O through `io`.
    pub fn with_io(config: &VaultConfig, io: Arc<dyn BlobIo>) -> Result<Self> {
        config.validate()?;
        let primary = config.vault_path.clone();
        let temp = temp_path_for(&primary);
        Ok(Self {
            codec: VaultCodec::new(config.kdf_params()?),
            backups: BackupRetention::new(config.backup_dir(), &primary, config.backup_keep),
            primary,
            temp,
            io,
            last_checksum: None,
        })
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn backups(&self) -> &BackupRetention {
        &self.backups
    }

    pub fn primary_exists(&self) -> bool {
        self.primary.is_file()
    }

    /// Checksum of the vault file as of the last load or commit.
    pub fn last_checksum(&self) -> Option<&str> {
        self.last_checksum.as_deref()
    }

    /// Read and decode the vault file.
    pub fn load(&mut self, password: &[u8]) -> Result<VaultDocument> {
        if !self.primary_exists() {
            return Err(VaultError::VaultNotFound(self.primary.clone()));
        }
        let blob = self.io.read(&self.primary)?;
        let document = self.codec.decode(&blob, password)?;
        self.last_checksum = Some(checksum(&blob));
        Ok(document)
    }

    /// Take an out-of-band snapshot of the current vault file, if any.
    pub fn snapshot(&self) -> Result<Option<PathBuf>> {
        if !self.primary_exists() {
            return Ok(None);
        }
        self.backups
            .snapshot(&self.primary)
            .map(Some)
            .map_err(|e| persistence(CommitPhase::BackingUp, e))
    }

    /// Durably persist `document` under `password`.
    pub fn commit(&mut self, document: &VaultDocument, password: &[u8]) -> Result<()> {
        debug!(phase = %CommitPhase::Staging, entries = document.len(), "commit started");
        let blob = self
            .codec
            .encode(document, password)
            .map_err(|e| persistence(CommitPhase::Staging, e))?;
        self.io
            .write(&self.temp, &blob)
            .map_err(|e| self.roll_back(CommitPhase::Staging, e))?;

        debug!(phase = %CommitPhase::Verifying, "reading staged vault back");
        self.verify_staged(document, password)?;

        if self.primary_exists() {
            debug!(phase = %CommitPhase::BackingUp, "snapshotting current vault");
            self.backups
                .snapshot(&self.primary)
                .map_err(|e| self.roll_back(CommitPhase::BackingUp, e))?;
        }

        debug!(phase = %CommitPhase::Committing, "replacing vault file");
        self.io
            .replace(&self.temp, &self.primary)
            .map_err(|e| self.roll_back(CommitPhase::Committing, e))?;

        self.last_checksum = Some(checksum(&blob));
        info!(
            entries = document.len(),
            path = %self.primary.display(),
            "vault committed"
        );
        Ok(())
    }

    fn verify_staged(&self, document: &VaultDocument, password: &[u8]) -> Result<()> {
        let staged = self
            .io
            .read(&self.temp)
            .map_err(|e| self.roll_back(CommitPhase::Verifying, e))?;

        let reason = match self.codec.decode(&staged, password) {
            Ok(decoded) if decoded == *document => return Ok(()),
            Ok(decoded) if decoded.len() != document.len() => format!(
                "entry count mismatch: staged {}, expected {}",
                decoded.len(),
                document.len()
            ),
            Ok(_) => "staged content differs from memory".to_string(),
            Err(e) => e.to_string(),
        };

        self.discard_temp();
        warn!(reason = %reason, "staged vault failed verification; vault file untouched");
        Err(VaultError::VerificationFailed(reason))
    }

    /// Remove the temp file and build the error for `phase`.
    fn roll_back(&self, phase: CommitPhase, cause: impl fmt::Display) -> VaultError {
        self.discard_temp();
        warn!(%phase, error = %cause, "commit rolled back; vault file untouched");
        persistence(phase, cause)
    }

    fn discard_temp(&self) {
        match self.io.remove(&self.temp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                temp = %self.temp.display(),
                error = %e,
                "could not remove staged vault file"
            ),
        }
    }
}

fn persistence(phase: CommitPhase, cause: impl fmt::Display) -> VaultError {
    VaultError::Persistence {
        phase,
        reason: cause.to_string(),
    }
}

/// `.<name>.tmp` next to `primary`, so the final rename stays on one
/// filesystem.
fn temp_path_for(primary: &Path) -> PathBuf {
    let parent = primary.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        primary.file_name().unwrap_or_default().to_string_lossy()
    ))
}
