//! The vault session and its record API.
//!
//! `VaultStore` is either locked (no password, no records in memory) or
//! unlocked.  Every mutation is applied in memory first and then
//! persisted through `DurableWriter::commit`.  If the commit fails the
//! change stays in memory, `has_unsaved_changes()` reports it, and the
//! caller may retry with `save()` or discard it with `lock()`.

use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::crypto::PasswordVerifier;
use crate::errors::{Result, VaultError};

use super::document::VaultDocument;
use super::record::{NewRecord, RecordPatch, SecretRecord, VaultStats};
use super::writer::{BlobIo, DurableWriter, FsBlobIo};

/// Minimum master password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Shown instead of the secret value in redacted exports.
const MASK: &str = "********";

/// State held only while the vault is unlocked.
struct Session {
    password: Zeroizing<String>,
    verifier: PasswordVerifier,
    document: VaultDocument,
    dirty: bool,
}

impl Session {
    fn new(password: &str, document: VaultDocument) -> Self {
        Self {
            password: Zeroizing::new(password.to_string()),
            verifier: PasswordVerifier::new(password.as_bytes()),
            document,
            dirty: false,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.document.clear();
    }
}

/// The main vault handle.  Build one with `VaultStore::new`, then
/// `create` or `unlock` it.
pub struct VaultStore {
    config: VaultConfig,
    writer: DurableWriter,
    session: Option<Session>,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn new(config: VaultConfig) -> Result<Self> {
        Self::with_io(config, Arc::new(FsBlobIo))
    }

    /// Like `new`, but vault file I/O goes through `io`.
    pub fn with_io(config: VaultConfig, io: Arc<dyn BlobIo>) -> Result<Self> {
        let writer = DurableWriter::with_io(&config, io)?;
        Ok(Self {
            config,
            writer,
            session: None,
        })
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Returns `true` if the vault file exists.
    pub fn exists(&self) -> bool {
        self.writer.primary_exists()
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    /// Create a brand-new, empty vault and leave it unlocked.
    ///
    /// This is the only operation that writes a vault file where none
    /// existed.  If the first commit fails the store stays locked.
    pub fn create(&mut self, password: &str) -> Result<()> {
        if self.exists() {
            return Err(VaultError::VaultAlreadyExists(
                self.config.vault_path.clone(),
            ));
        }
        check_password_len(password)?;

        self.session = Some(Session::new(password, VaultDocument::new()));
        if let Err(e) = self.persist() {
            self.session = None;
            return Err(e);
        }

        info!(path = %self.config.vault_path.display(), "vault created");
        Ok(())
    }

    /// Decrypt the vault file and start a session.
    ///
    /// Returns `Ok(false)` for a wrong password (or a file damaged in a
    /// way indistinguishable from one); the current state is unchanged.
    /// Other failures, such as a missing file, are errors.
    pub fn unlock(&mut self, password: &str) -> Result<bool> {
        match self.writer.load(password.as_bytes()) {
            Ok(document) => {
                info!(entries = document.len(), "vault unlocked");
                self.session = Some(Session::new(password, document));
                Ok(true)
            }
            Err(e) if e.is_wrong_password_or_corrupt() => {
                debug!("unlock rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// End the session and wipe the password and records from memory.
    pub fn lock(&mut self) {
        if let Some(session) = self.session.take() {
            if session.dirty {
                warn!("locking vault with unsaved changes; they are discarded");
            }
            drop(session);
            info!("vault locked");
        }
    }

    // ------------------------------------------------------------------
    // Record operations
    // ------------------------------------------------------------------

    /// Add a record with a fresh id.  Returns the stored record.
    pub fn add_entry(&mut self, fields: NewRecord) -> Result<SecretRecord> {
        if fields.title.trim().is_empty() {
            return Err(VaultError::MissingField("title"));
        }

        let session = self.session_mut()?;
        let mut record = SecretRecord::create(fields, Utc::now());
        // Ids are never reused.
        while session.document.contains(&record.id) {
            record.id = uuid::Uuid::new_v4().to_string();
        }
        session.document.insert(record.clone());
        debug!(id = %record.id, "entry added");

        self.persist()?;
        Ok(record)
    }

    /// Merge `patch` into the record `id`.  Returns the updated record.
    pub fn update_entry(&mut self, id: &str, patch: RecordPatch) -> Result<SecretRecord> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(VaultError::MissingField("title"));
        }

        let session = self.session_mut()?;
        let record = session
            .document
            .get_mut(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        record.apply(patch, Utc::now());
        let updated = record.clone();
        debug!(id, "entry updated");

        self.persist()?;
        Ok(updated)
    }

    /// Remove the record `id`.  Returns `false`, touching neither memory
    /// nor disk, if there is no such record.
    pub fn delete_entry(&mut self, id: &str) -> Result<bool> {
        let session = self.session_mut()?;
        let Some(mut removed) = session.document.remove(id) else {
            return Ok(false);
        };
        zeroize::Zeroize::zeroize(&mut removed.password);
        debug!(id, "entry deleted");

        self.persist()?;
        Ok(true)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<&SecretRecord>> {
        Ok(self.session()?.document.get(id))
    }

    /// All records, ordered by title (case-insensitive), then id.
    pub fn list_entries(&self) -> Result<Vec<&SecretRecord>> {
        let mut list: Vec<&SecretRecord> = self.session()?.document.records().collect();
        sort_for_display(&mut list);
        Ok(list)
    }

    /// Records whose title, username, url, category or notes contain
    /// `query`, ignoring case.  The secret value is never searched.
    pub fn search_entries(&self, query: &str) -> Result<Vec<&SecretRecord>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&SecretRecord> = self
            .session()?
            .document
            .records()
            .filter(|r| r.matches(&needle))
            .collect();
        sort_for_display(&mut hits);
        Ok(hits)
    }

    /// Distinct categories in use, sorted.
    pub fn categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self
            .session()?
            .document
            .records()
            .map(|r| r.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Re-encrypt the whole vault under `new_password`.
    ///
    /// Returns `Ok(false)` if `old_password` is not the session password.
    /// A snapshot of the current file is taken first.  If the commit
    /// fails, the session keeps using the old password.
    pub fn change_master_password(&mut self, old_password: &str, new_password: &str) -> Result<bool> {
        if !self.session()?.verifier.matches(old_password.as_bytes()) {
            debug!("master password change rejected");
            return Ok(false);
        }
        check_password_len(new_password)?;

        self.writer.snapshot()?;

        let session = self.session_mut()?;
        let was_dirty = session.dirty;
        let old = mem::replace(
            &mut session.password,
            Zeroizing::new(new_password.to_string()),
        );
        let old_verifier = mem::replace(
            &mut session.verifier,
            PasswordVerifier::new(new_password.as_bytes()),
        );

        match self.persist() {
            Ok(()) => {
                info!("master password changed");
                Ok(true)
            }
            Err(e) => {
                if let Some(session) = self.session.as_mut() {
                    session.password = old;
                    session.verifier = old_verifier;
                    session.dirty = was_dirty;
                }
                Err(e)
            }
        }
    }

    /// Retry persisting the in-memory state, e.g. after a failed commit.
    pub fn save(&mut self) -> Result<()> {
        self.persist()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.dirty)
    }

    // ------------------------------------------------------------------
    // Export and statistics
    // ------------------------------------------------------------------

    /// Write all records to `dest` as pretty-printed JSON.
    ///
    /// Secret values are replaced with `********` unless
    /// `include_secrets` is set.  `dest` may not name the vault file, its
    /// staging file or anything in the backup directory, by any alias.
    /// Returns the number of records written.
    pub fn export_plain(&self, dest: &Path, include_secrets: bool) -> Result<usize> {
        let session = self.session()?;

        let target = resolve_path(dest);
        if target == resolve_path(self.writer.primary_path())
            || target == resolve_path(self.writer.temp_path())
        {
            return Err(VaultError::InvalidArgument(
                "refusing to export over the vault file".into(),
            ));
        }
        if target.starts_with(resolve_path(self.writer.backups().dir())) {
            return Err(VaultError::InvalidArgument(
                "refusing to export into the backup directory".into(),
            ));
        }

        let mut records: Vec<SecretRecord> = session.document.records().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        if !include_secrets {
            for record in &mut records {
                zeroize::Zeroize::zeroize(&mut record.password);
                record.password = MASK.to_string();
            }
        }

        let json = Zeroizing::new(
            serde_json::to_vec_pretty(&records)
                .map_err(|e| VaultError::SerializationError(format!("export: {e}")))?,
        );
        for record in &mut records {
            zeroize::Zeroize::zeroize(&mut record.password);
        }

        FsBlobIo.write(dest, &json)?;
        if include_secrets {
            warn!(path = %dest.display(), "exported vault with plaintext secrets");
        }
        Ok(records.len())
    }

    /// Record count, per-category counts and the number of backups.
    pub fn stats(&self) -> Result<VaultStats> {
        let session = self.session()?;
        let mut per_category = BTreeMap::new();
        for record in session.document.records() {
            *per_category.entry(record.category.clone()).or_insert(0) += 1;
        }
        Ok(VaultStats {
            count: session.document.len(),
            per_category,
            backup_count: self.writer.backups().count(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// SHA-256 (hex) of the vault file as of the last unlock or commit.
    pub fn last_checksum(&self) -> Option<&str> {
        self.writer.last_checksum()
    }

    /// The unlocked document, for read-only inspection.
    pub fn document(&self) -> Result<&VaultDocument> {
        Ok(&self.session()?.document)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(VaultError::NotUnlocked)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(VaultError::NotUnlocked)
    }

    /// Stamp the document and run the commit protocol.
    fn persist(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(VaultError::NotUnlocked)?;
        session.document.touch(Utc::now());
        session.dirty = true;
        self.writer
            .commit(&session.document, session.password.as_bytes())?;
        session.dirty = false;
        Ok(())
    }
}

fn check_password_len(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Absolute form of `path` with symlinks and `..` resolved as far as the
/// path exists; the missing tail is resolved lexically, the same way
/// creating it would.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => {
                resolved.push(other);
                if let Ok(real) = fs::canonicalize(&resolved) {
                    resolved = real;
                }
            }
        }
    }
    resolved
}

fn sort_for_display(records: &mut [&SecretRecord]) {
    records.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}
