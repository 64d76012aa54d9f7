use chrono::{DateTime, SecondsFormat, Utc};

/// RFC3339 UTC with millisecond precision. Lexicographic order of the
/// output matches chronological order, which the stores rely on.
pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_utc() -> String {
    format_utc(Utc::now())
}
