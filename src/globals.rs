use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Workspace-wide parameters, keyed by their `$`-prefixed name.
pub type GlobalParams = BTreeMap<String, String>;

pub const GLOBAL_PREFIX: char = '$';

pub const START_TIME_PARAM: &str = "$startTime";
pub const END_TIME_PARAM: &str = "$endTime";

const DEFAULT_START_TIME: &str = "2024-10-13 00:00:00";
const DEFAULT_END_TIME: &str = "2024-10-14 00:00:00";

/// Offset the log store records its timestamps in (UTC+8).
const LOG_UTC_OFFSET_SECS: i64 = 8 * 3600;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn is_global(name: &str) -> bool {
    name.starts_with(GLOBAL_PREFIX)
}

/// Parameters a fresh workspace starts with.
pub fn default_params() -> GlobalParams {
    GlobalParams::from([
        (START_TIME_PARAM.to_string(), DEFAULT_START_TIME.to_string()),
        (END_TIME_PARAM.to_string(), DEFAULT_END_TIME.to_string()),
    ])
}

/// The time window `[now - 24h, now]` as start/end parameters.
pub fn last_24_hours(now: DateTime<Utc>) -> GlobalParams {
    let end = (now + Duration::seconds(LOG_UTC_OFFSET_SECS)).naive_utc();
    let start = end - Duration::hours(24);

    GlobalParams::from([
        (START_TIME_PARAM.to_string(), start.format(TIME_FORMAT).to_string()),
        (END_TIME_PARAM.to_string(), end.format(TIME_FORMAT).to_string()),
    ])
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_is_global() {
        assert!(is_global("$startTime"));
        assert!(!is_global("startTime"));
        assert!(!is_global(""));
    }

    #[test]
    fn test_default_params() {
        let params = default_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[START_TIME_PARAM], "2024-10-13 00:00:00");
        assert_eq!(params[END_TIME_PARAM], "2024-10-14 00:00:00");
        assert!(params.keys().all(|k| is_global(k)));
    }

    #[test]
    fn test_last_24_hours() {
        let now = Utc.with_ymd_and_hms(2024, 10, 14, 4, 30, 15).unwrap();
        let params = last_24_hours(now);
        assert_eq!(params[START_TIME_PARAM], "2024-10-13 12:30:15");
        assert_eq!(params[END_TIME_PARAM], "2024-10-14 12:30:15");
    }

    #[test]
    fn test_last_24_hours_crosses_date_line() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap();
        let params = last_24_hours(now);
        assert_eq!(params[START_TIME_PARAM], "2024-12-31 04:00:00");
        assert_eq!(params[END_TIME_PARAM], "2025-01-01 04:00:00");
    }
}
