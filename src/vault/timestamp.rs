//! Lenient timestamp parsing for vault documents.
//!
//! Timestamps are always written as RFC 3339 with an offset.  On read,
//! an ISO 8601 date-time without an offset is also accepted and taken as
//! local time, which is how older vault files record it.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one as local time.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, NAIVE_FORMAT).ok()?;
    // A wall-clock time skipped by a DST jump has no local reading.
    let utc = match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => naive.and_utc(),
    };
    Some(utc)
}

/// `deserialize_with` helper for `DateTime<Utc>` fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO 8601 timestamp '{text}'")))
}
