use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
///
/// Every timestamp column holds RFC 3339 UTC text with fixed microsecond
/// precision, all written through this helper, so `<`/`>` on the TEXT values
/// in SQL agrees with chronological order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
