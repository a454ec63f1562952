//! Credential records stored inside a vault.
//!
//! A `SecretRecord` is created from a `NewRecord` and afterwards only
//! changed through a `RecordPatch`, which has no way to express a new
//! id or creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use super::timestamp;

/// Category assigned when none is given.
pub const DEFAULT_CATEGORY: &str = "Default";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A single credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Opaque unique id, fixed at creation.
    pub id: String,

    /// Site or application name.
    pub title: String,

    #[serde(default)]
    pub username: String,

    /// The secret value itself.
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub notes: String,

    #[serde(default = "default_category")]
    pub category: String,

    /// When this record was first created.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    /// When this record was last changed.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    /// Build a record with a fresh id and both timestamps set to `now`.
    pub(crate) fn create(fields: NewRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: fields.title,
            username: fields.username,
            password: fields.password,
            url: fields.url,
            notes: fields.notes,
            category: fields.category.unwrap_or_else(default_category),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the provided fields and refresh `updated_at`.
    pub(crate) fn apply(&mut self, patch: RecordPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(mut password) = patch.password {
            std::mem::swap(&mut self.password, &mut password);
            password.zeroize();
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        // Never move backwards, even if the clock did.
        self.updated_at = now.max(self.created_at);
    }

    /// Case-insensitive substring match over the searchable fields.
    ///
    /// `needle` must already be lowercased.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        [
            &self.title,
            &self.username,
            &self.url,
            &self.category,
            &self.notes,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Fields for a new record.  Only `title` is required.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    /// `None` means `DEFAULT_CATEGORY`.
    pub category: Option<String>,
}

impl NewRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The updatable fields of a record.  `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.url.is_none()
            && self.notes.is_none()
            && self.category.is_none()
    }
}

/// Per-vault counters returned by `VaultStore::stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub count: usize,
    pub per_category: std::collections::BTreeMap<String, usize>,
    pub backup_count: usize,
}
