//! The plaintext vault document and its canonical JSON form.
//!
//! ```text
//! { "version": "1.0", "updated_at": "<RFC 3339>", "entries": [ SecretRecord, ... ] }
//! ```
//!
//! In memory the records are keyed by id.  On disk they are a list,
//! written sorted by id so the same document always serializes to the
//! same bytes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::record::SecretRecord;
use super::timestamp;
use crate::errors::{Result, VaultError};

/// Document format version written by this crate.
pub const CURRENT_VERSION: &str = "1.0";

/// The full decrypted contents of a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultDocument {
    version: String,
    updated_at: DateTime<Utc>,
    entries: HashMap<String, SecretRecord>,
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    version: &'a str,
    updated_at: DateTime<Utc>,
    entries: Vec<&'a SecretRecord>,
}

#[derive(Deserialize)]
struct DocumentIn {
    #[serde(default = "current_version")]
    version: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    entries: Vec<SecretRecord>,
}

/// Read just the version first so an unknown format is reported as
/// such, not as a schema error.
#[derive(Deserialize)]
struct VersionProbe {
    version: Option<String>,
}

fn current_version() -> String {
    CURRENT_VERSION.to_string()
}

impl Default for VaultDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultDocument {
    /// An empty document at the current version.
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: HashMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SecretRecord> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut SecretRecord> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Records in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &SecretRecord> {
        self.entries.values()
    }

    /// Insert a record, replacing any record with the same id.
    pub fn insert(&mut self, record: SecretRecord) -> Option<SecretRecord> {
        self.entries.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<SecretRecord> {
        self.entries.remove(id)
    }

    /// Stamp the document as changed at `now`.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Serialize to canonical JSON bytes.
    pub fn to_json(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut entries: Vec<&SecretRecord> = self.entries.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let out = DocumentOut {
            version: &self.version,
            updated_at: self.updated_at,
            entries,
        };
        serde_json::to_vec(&out)
            .map(Zeroizing::new)
            .map_err(|e| VaultError::SerializationError(format!("document: {e}")))
    }

    /// Parse and validate JSON bytes.
    ///
    /// A missing version is read as the current one.  Fails closed on an
    /// unknown version, duplicate ids, and records whose `created_at` is
    /// after `updated_at`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::MalformedContent(format!("document JSON: {e}")))?;
        match probe.version.as_deref() {
            None | Some(CURRENT_VERSION) => {}
            Some(other) => return Err(VaultError::UnsupportedVersion(other.to_string())),
        }

        let parsed: DocumentIn = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::MalformedContent(format!("document JSON: {e}")))?;

        let mut entries = HashMap::with_capacity(parsed.entries.len());
        for record in parsed.entries {
            if record.created_at > record.updated_at {
                return Err(VaultError::MalformedContent(format!(
                    "entry '{}' was updated before it was created",
                    record.id
                )));
            }
            if let Some(dup) = entries.insert(record.id.clone(), record) {
                return Err(VaultError::MalformedContent(format!(
                    "duplicate entry id '{}'",
                    dup.id
                )));
            }
        }

        Ok(Self {
            version: parsed.version,
            updated_at: parsed.updated_at,
            entries,
        })
    }

    /// Wipe secret values and drop every record.
    pub(crate) fn clear(&mut self) {
        for record in self.entries.values_mut() {
            record.password.zeroize();
            record.notes.zeroize();
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::record::NewRecord;

    fn doc_with(n: usize) -> VaultDocument {
        let mut doc = VaultDocument::new();
        for i in 0..n {
            doc.insert(SecretRecord::create(
                NewRecord::new(format!("site-{i}")).password(format!("pw-{i}")),
                Utc::now(),
            ));
        }
        doc
    }

    #[test]
    fn json_roundtrip_is_lossless() {
        let doc = doc_with(3);
        let bytes = doc.to_json().unwrap();
        assert_eq!(VaultDocument::from_json(&bytes).unwrap(), doc);
    }

    #[test]
    fn serialization_is_canonical() {
        let doc = doc_with(5);
        assert_eq!(*doc.to_json().unwrap(), *doc.clone().to_json().unwrap());
    }

    #[test]
    fn unknown_version_fails_closed() {
        let json = br#"{"version":"2.0","updated_at":"2024-01-01T00:00:00Z","entries":[]}"#;
        let err = VaultDocument::from_json(json).unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn missing_version_reads_as_current() {
        let json = br#"{"updated_at":"2024-01-01T00:00:00Z","entries":[]}"#;
        let doc = VaultDocument::from_json(json).unwrap();
        assert_eq!(doc.version(), CURRENT_VERSION);
        assert!(doc.is_empty());
    }

    #[test]
    fn naive_timestamps_are_accepted() {
        let json = br#"{"version":"1.0","updated_at":"2024-05-01T12:34:56.123456","entries":[
            {"id":"a","title":"GitHub","username":"me","password":"x1","url":"","notes":"",
             "category":"Default","created_at":"2024-05-01T12:00:00.000001",
             "updated_at":"2024-05-01T12:34:56.123456"}]}"#;
        let doc = VaultDocument::from_json(json).unwrap();
        let rec = doc.get("a").unwrap();
        assert!(rec.created_at < rec.updated_at);
        assert_eq!(doc.updated_at(), rec.updated_at);

        // Written back out with an offset, and still equal on re-read.
        let out = doc.to_json().unwrap();
        let text = std::str::from_utf8(&out).unwrap();
        assert!(!text.contains("\"2024-05-01T12:34:56.123456\""), "{text}");
        assert_eq!(VaultDocument::from_json(&out).unwrap(), doc);
    }

    #[test]
    fn bad_timestamp_is_malformed_content() {
        let json = br#"{"version":"1.0","updated_at":"last tuesday","entries":[]}"#;
        assert!(matches!(
            VaultDocument::from_json(json),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let rec = r#"{"id":"a","title":"t","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let json = format!(
            r#"{{"version":"1.0","updated_at":"2024-01-01T00:00:00Z","entries":[{rec},{rec}]}}"#
        );
        assert!(matches!(
            VaultDocument::from_json(json.as_bytes()),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn created_after_updated_rejected() {
        let json = br#"{"version":"1.0","updated_at":"2024-01-01T00:00:00Z","entries":[
            {"id":"a","title":"t","created_at":"2024-02-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}]}"#;
        assert!(VaultDocument::from_json(json).is_err());
    }

    #[test]
    fn garbage_is_malformed_content() {
        assert!(matches!(
            VaultDocument::from_json(b"\xff\x00not json"),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn clear_empties_document() {
        let mut doc = doc_with(2);
        doc.clear();
        assert!(doc.is_empty());
    }
}
