//! Time utilities: parsing and formatting ledger timestamps, checkpoint sentinel.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format for every `event_time` column. Lexical order == time order.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// "Beginning of time" used when a source has no checkpoint yet.
pub fn epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

pub fn is_epoch(t: &NaiveDateTime) -> bool {
    *t == epoch()
}

pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FMT).to_string()
}

pub fn parse_timestamp(s: &str) -> AppResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FMT)
        .map_err(|_| AppError::InvalidTimestamp(s.to_string()))
}

/// Parse with an explicit chrono format (cloud payloads use day-first dates).
pub fn parse_with_format(s: &str, fmt: &str) -> AppResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), fmt)
        .map_err(|_| AppError::InvalidTimestamp(format!("{} (expected {})", s, fmt)))
}

pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trips_through_storage_format() {
        let s = format_timestamp(&epoch());
        assert_eq!(s, "1970-01-01 00:00:00");
        assert!(is_epoch(&parse_timestamp(&s).unwrap()));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("2025-13-01 09:00").is_err());
    }

    #[test]
    fn day_first_format() {
        let t = parse_with_format("05-03-2025 09:15:00", "%d-%m-%Y %H:%M:%S").unwrap();
        assert_eq!(format_timestamp(&t), "2025-03-05 09:15:00");
    }
}
