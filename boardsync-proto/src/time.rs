//! Wire timestamps.
//!
//! The board server emits ISO-8601 strings, frequently without a UTC
//! offset (`2024-05-01T09:30:00.123456`). Timestamps are therefore kept
//! as the opaque string they arrived as and only parsed when a caller
//! needs to display or compare them.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An ISO-8601 timestamp as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Wraps a raw wire timestamp without validating it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the current UTC time formatted as RFC 3339 with microseconds.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the timestamp is absent (empty string).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the timestamp leniently.
    ///
    /// Accepts RFC 3339 first, then a naive `YYYY-MM-DDTHH:MM:SS[.f]`
    /// string which is interpreted as UTC.
    #[must_use]
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.0) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Formats the timestamp with a chrono format string, falling back to
    /// the raw value when it cannot be parsed.
    #[must_use]
    pub fn format(&self, fmt: &str) -> String {
        self.parse()
            .map_or_else(|| self.0.clone(), |dt| dt.format(fmt).to_string())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
