//! The log entry value type.
//!
//! A [`LogEntry`] is one ingested line plus the UTC instant it arrived. It is
//! immutable once built, so copies can be handed to the ring buffer, every
//! subscriber queue and the file writer without further coordination.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Sub-second digits kept on arrival timestamps.
const TIMESTAMP_PRECISION: u16 = 6;

/// One received log line with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(with = "iso_utc")]
    timestamp: DateTime<Utc>,
    message: String,
}

impl LogEntry {
    /// Creates an entry at the given instant.
    ///
    /// The timestamp is truncated to microseconds, the precision of every
    /// serialized form, so an entry always survives a round-trip unchanged.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(TIMESTAMP_PRECISION),
            message: message.into(),
        }
    }

    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(Utc::now(), message)
    }

    /// Arrival time in UTC.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The raw message line.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// ISO-8601 UTC timestamp, e.g. `2024-05-01T12:00:00.123456Z`.
    #[must_use]
    pub fn iso_timestamp(&self) -> String {
        format_iso(&self.timestamp)
    }

    /// The persisted form: `[<iso timestamp>] <message>`, without a newline.
    #[must_use]
    pub fn to_file_line(&self) -> String {
        format!("[{}] {}", self.iso_timestamp(), self.message)
    }

    /// Parses a line previously produced by [`LogEntry::to_file_line`].
    ///
    /// A single trailing `\n` (or `\r\n`) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Parse`] if the bracketed timestamp is missing or invalid.
    pub fn parse_file_line(line: &str) -> Result<Self> {
        let line = line
            .strip_suffix('\n')
            .map_or(line, |l| l.strip_suffix('\r').unwrap_or(l));

        let rest = line
            .strip_prefix('[')
            .ok_or_else(|| LogError::Parse(format!("missing '[' in line: {line}")))?;
        let (raw_ts, message) = rest
            .split_once("] ")
            .ok_or_else(|| LogError::Parse(format!("missing '] ' in line: {line}")))?;

        let timestamp = parse_iso(raw_ts)?;
        Ok(Self::new(timestamp, message))
    }

    /// Serializes the entry as `{"timestamp": ..., "message": ...}`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn format_iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_iso(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LogError::Parse(format!("invalid timestamp '{raw}': {e}")))
}

mod iso_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_iso(&raw).map_err(serde::de::Error::custom)
    }
}
