//! Timestamp normalization for backend-emitted `created_at` values.
//!
//! The backend emits naive ISO datetimes, sometimes with a stray leading
//! colon and a microsecond suffix (`:2024-01-01T10:00:00.123456`). All of them
//! are interpreted as UTC.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Strips one leading colon and drops any fractional-seconds suffix, then
/// parses the remainder as a UTC timestamp. An explicit offset after the
/// fraction is still honoured.
pub fn normalize_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let without_colon = trimmed.strip_prefix(':').unwrap_or(trimmed);
    let whole_seconds = drop_fraction(without_colon);
    let naive = whole_seconds.trim_end_matches('Z');

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(&whole_seconds)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn drop_fraction(value: &str) -> Cow<'_, str> {
    match value.split_once('.') {
        Some((whole, rest)) => {
            let suffix = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            Cow::Owned(format!("{whole}{suffix}"))
        }
        None => Cow::Borrowed(value),
    }
}

/// Calendar day (UTC) a timestamp belongs to.
pub fn date_key(raw: &str) -> Option<NaiveDate> {
    normalize_timestamp(raw).map(|ts| ts.date_naive())
}

pub fn parse_date_param(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
