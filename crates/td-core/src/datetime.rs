//! Timestamp display helpers.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Display format used for incident and report timestamps.
pub const DISPLAY_FORMAT: &str = "%b %d, %Y %I:%M %p";

/// Parses a stored timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Formats a UTC timestamp in the given zone.
pub fn format_in<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format(DISPLAY_FORMAT).to_string()
}

/// Formats a stored timestamp in the local zone. Unparseable input is
/// returned unchanged.
pub fn format_local(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => format_in(ts, &Local),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_naive_is_utc() {
        let naive = parse_timestamp("2025-03-01T08:30:00").unwrap();
        let explicit = parse_timestamp("2025-03-01T08:30:00Z").unwrap();
        assert_eq!(naive, explicit);

        let spaced = parse_timestamp("2025-03-01 08:30:00.123").unwrap();
        assert_eq!(spaced.timestamp(), explicit.timestamp());
    }

    #[test]
    fn test_offset_is_honoured() {
        let ts = parse_timestamp("2025-03-01T16:30:00+08:00").unwrap();
        assert_eq!(ts, parse_timestamp("2025-03-01T08:30:00Z").unwrap());
    }

    #[test]
    fn test_format_in_zone() {
        let ts = parse_timestamp("2025-03-01T08:30:00").unwrap();
        let manila = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(format_in(ts, &manila), "Mar 01, 2025 04:30 PM");
    }

    #[test]
    fn test_unparseable_passthrough() {
        assert_eq!(format_local("yesterday"), "yesterday");
    }
}
