use crate::error::Error;
use std::time::{SystemTime, UNIX_EPOCH};
use time::macros::format_description;
use time::OffsetDateTime;

/// Seconds since the unix epoch
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Contract timestamps are unix seconds
pub fn datetime(secs: u64) -> Option<OffsetDateTime> {
    let secs = i64::try_from(secs).ok()?;
    OffsetDateTime::from_unix_timestamp(secs).ok()
}

/// `2024-05-01 18:30 UTC`, or `Invalid date` for an unrepresentable timestamp
pub fn format_timestamp(secs: u64) -> String {
    match datetime(secs).map(|dt| format_datetime(&dt)) {
        Some(Ok(s)) => s,
        _ => "Invalid date".to_owned(),
    }
}

fn format_datetime(dt: &OffsetDateTime) -> Result<String, Error> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    Ok(dt.format(&format)?)
}

/// A rough duration like `3h 12m`, used for claim countdowns
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00 UTC");
        assert_eq!(format_timestamp(1714588200), "2024-05-01 18:30 UTC");
        assert_eq!(format_timestamp(u64::MAX), "Invalid date");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3 * 3600 + 12 * 60 + 5), "3h 12m");
        assert_eq!(format_duration(125), "2m");
        assert_eq!(format_duration(9), "9s");
    }
}
