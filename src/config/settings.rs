use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{KdfParams, DEFAULT_ITERATIONS};
use crate::errors::{Result, VaultError};

/// Engine configuration, constructed once and passed into `VaultStore`.
///
/// Every field except the vault location has a sensible default, and
/// `VaultConfig::load` works without any config file at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Primary vault file.
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,

    /// Directory for backup snapshots (default: `backups/` next to the
    /// vault file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Number of snapshots to retain (default: 10).
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,

    /// PBKDF2 iteration count (default: 600 000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_path() -> PathBuf {
    PathBuf::from("vault.dat")
}

fn default_backup_keep() -> usize {
    10
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            backup_dir: None,
            backup_keep: default_backup_keep(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

impl VaultConfig {
    /// Name of the config file looked up by `load`.
    pub const FILE_NAME: &'static str = "secretvault.toml";

    /// Defaults for a vault stored at `vault_path`.
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
            ..Self::default()
        }
    }

    /// Load settings from `<dir>/secretvault.toml`.
    ///
    /// If the file does not exist, defaults are returned.  Relative
    /// paths in the file are resolved against `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str::<VaultConfig>(&contents).map_err(|e| {
                VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
            })?
        } else {
            Self::default()
        };

        if config.vault_path.is_relative() {
            config.vault_path = dir.join(&config.vault_path);
        }
        if let Some(backup_dir) = config.backup_dir.as_mut() {
            if backup_dir.is_relative() {
                *backup_dir = dir.join(&*backup_dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.backup_keep == 0 {
            return Err(VaultError::ConfigError(
                "backup_keep must be at least 1".into(),
            ));
        }
        if self.vault_path.file_name().is_none() {
            return Err(VaultError::ConfigError(format!(
                "vault_path '{}' does not name a file",
                self.vault_path.display()
            )));
        }
        self.kdf_params()
            .map_err(|e| VaultError::ConfigError(e.to_string()))?;
        Ok(())
    }

    /// Directory holding backup snapshots.
    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .vault_path
                .parent()
                .unwrap_or(Path::new("."))
                .join("backups"),
        }
    }

    /// Convert the iteration setting into crypto-layer params.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(self.kdf_iterations)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let c = VaultConfig::default();
        assert_eq!(c.vault_path, PathBuf::from("vault.dat"));
        assert_eq!(c.backup_dir, None);
        assert_eq!(c.backup_keep, 10);
        assert_eq!(c.kdf_iterations, 600_000);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let config = VaultConfig::load(tmp.path()).unwrap();
        assert_eq!(config.vault_path, tmp.path().join("vault.dat"));
        assert_eq!(config.backup_keep, 10);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let toml = r#"
vault_path = "secrets/main.dat"
backup_dir = "snapshots"
backup_keep = 3
kdf_iterations = 200000
"#;
        fs::write(tmp.path().join(VaultConfig::FILE_NAME), toml).unwrap();

        let config = VaultConfig::load(tmp.path()).unwrap();
        assert_eq!(config.vault_path, tmp.path().join("secrets/main.dat"));
        assert_eq!(config.backup_dir(), tmp.path().join("snapshots"));
        assert_eq!(config.backup_keep, 3);
        assert_eq!(config.kdf_iterations, 200_000);
    }

    #[test]
    fn load_keeps_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("elsewhere.dat");
        let toml = format!("vault_path = {:?}\n", abs.to_string_lossy());
        fs::write(tmp.path().join(VaultConfig::FILE_NAME), toml).unwrap();

        let config = VaultConfig::load(tmp.path()).unwrap();
        assert_eq!(config.vault_path, abs);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(VaultConfig::FILE_NAME), "not valid {{toml").unwrap();
        assert!(VaultConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_zero_retention() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(VaultConfig::FILE_NAME), "backup_keep = 0\n").unwrap();
        assert!(VaultConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_weak_kdf() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(VaultConfig::FILE_NAME), "kdf_iterations = 10\n").unwrap();
        assert!(VaultConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn backup_dir_defaults_to_sibling_directory() {
        let c = VaultConfig::new("/home/user/.vault/main.dat");
        assert_eq!(c.backup_dir(), PathBuf::from("/home/user/.vault/backups"));
    }
}
