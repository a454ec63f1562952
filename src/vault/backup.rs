//! Timestamped backup snapshots with bounded retention.
//!
//! Snapshots are whole-file copies of the primary vault, stored as
//! `<backup_dir>/<stem>_backup_<YYYYmmdd_HHMMSS_micros>.dat`.  After each
//! snapshot only the newest `keep` files are retained.  Pruning is
//! best-effort: a file that cannot be removed is logged and skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tracing::{debug, warn};

const SNAPSHOT_EXT: &str = ".dat";

#[derive(Debug, Clone)]
pub struct BackupRetention {
    dir: PathBuf,
    prefix: String,
    keep: usize,
}

impl BackupRetention {
    /// Snapshots of `vault_path` go to `dir`; at most `keep` are retained.
    pub fn new(dir: impl Into<PathBuf>, vault_path: &Path, keep: usize) -> Self {
        let stem = vault_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string());
        Self {
            dir: dir.into(),
            prefix: format!("{stem}_backup_"),
            keep: keep.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Copy `source` into a new snapshot, then prune old ones.
    ///
    /// Only the copy can fail; pruning never does.
    pub fn snapshot(&self, source: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let target = self.next_snapshot_path();
        fs::copy(source, &target)?;
        debug!(snapshot = %target.display(), "backup snapshot written");

        self.prune();
        Ok(target)
    }

    /// Delete all but the newest `keep` snapshots.  Returns how many
    /// were removed.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        for stale in self.list().into_iter().skip(self.keep) {
            match fs::remove_file(&stale) {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    snapshot = %stale.display(),
                    error = %e,
                    "could not remove old backup snapshot"
                ),
            }
        }
        if removed > 0 {
            debug!(removed, keep = self.keep, "pruned backup snapshots");
        }
        removed
    }

    /// Snapshots for this vault, newest first.
    ///
    /// Ordered by modification time, then by name (the embedded
    /// timestamp) when times tie.
    pub fn list(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut snapshots: Vec<(SystemTime, PathBuf)> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| self.is_snapshot_name(&entry.file_name().to_string_lossy()))
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, entry.path()))
            })
            .collect();

        snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        snapshots.into_iter().map(|(_, path)| path).collect()
    }

    pub fn count(&self) -> usize {
        self.list().len()
    }

    fn is_snapshot_name(&self, name: &str) -> bool {
        name.starts_with(&self.prefix) && name.ends_with(SNAPSHOT_EXT)
    }

    fn next_snapshot_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let base = format!("{}{stamp}", self.prefix);

        let mut candidate = self.dir.join(format!("{base}{SNAPSHOT_EXT}"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{base}_{n}{SNAPSHOT_EXT}"));
            n += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(keep: usize) -> (TempDir, PathBuf, BackupRetention) {
        let dir = TempDir::new().unwrap();
        let vault = dir.path().join("vault.dat");
        fs::write(&vault, b"blob").unwrap();
        let retention = BackupRetention::new(dir.path().join("backups"), &vault, keep);
        (dir, vault, retention)
    }

    #[test]
    fn snapshot_copies_bytes() {
        let (_dir, vault, retention) = setup(10);
        let snap = retention.snapshot(&vault).unwrap();
        assert_eq!(fs::read(snap).unwrap(), b"blob");
        assert_eq!(retention.count(), 1);
    }

    #[test]
    fn snapshot_names_embed_stem_and_timestamp() {
        let (_dir, vault, retention) = setup(10);
        let snap = retention.snapshot(&vault).unwrap();
        let name = snap.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("vault_backup_20"), "{name}");
        assert!(name.ends_with(".dat"));
    }

    #[test]
    fn keeps_only_newest() {
        let (_dir, vault, retention) = setup(3);
        let mut made = Vec::new();
        for i in 0..6 {
            fs::write(&vault, format!("v{i}")).unwrap();
            made.push(retention.snapshot(&vault).unwrap());
        }

        let kept = retention.list();
        assert_eq!(kept.len(), 3);
        let newest: Vec<_> = made.iter().rev().take(3).cloned().collect();
        assert_eq!(kept, newest);
        assert_eq!(fs::read(&kept[0]).unwrap(), b"v5");
    }

    #[test]
    fn ignores_unrelated_files() {
        let (_dir, vault, retention) = setup(1);
        fs::create_dir_all(retention.dir()).unwrap();
        let other = retention.dir().join("notes.txt");
        fs::write(&other, b"keep me").unwrap();
        let foreign = retention.dir().join("other_backup_20240101_000000_000000.dat");
        fs::write(&foreign, b"other vault").unwrap();

        retention.snapshot(&vault).unwrap();
        retention.snapshot(&vault).unwrap();

        assert!(other.exists());
        assert!(foreign.exists());
        assert_eq!(retention.count(), 1);
    }

    #[test]
    fn list_on_missing_dir_is_empty() {
        let (_dir, _vault, retention) = setup(10);
        assert!(retention.list().is_empty());
        assert_eq!(retention.prune(), 0);
    }
}
