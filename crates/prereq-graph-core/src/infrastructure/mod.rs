//! Infrastructure layer
//!
//! SQLite implementations of the domain repository traits.

pub mod concepts;
pub mod curriculum;
pub mod graph;
pub mod hints;

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so stored timestamps sort lexically
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// `?, ?, ?` for an IN list of `count` values
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
