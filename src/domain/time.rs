//! Floor/add/end-of-day helpers on epoch-millisecond timestamps.
//!
//! Every other layer goes through here rather than doing manual arithmetic
//! on timestamps, so alignment bugs have exactly one place to live.

use chrono::{DateTime, TimeZone, Utc};

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_DAY: i64 = 86_400_000;

/// Floors `ts` (epoch ms) down to the most recent `k`-minute boundary.
pub fn floor(ts: i64, k: i64) -> i64 {
    debug_assert!(k > 0, "timeframe must be positive minutes");
    let bucket = k * MS_PER_MINUTE;
    ts - ts.rem_euclid(bucket)
}

/// Adds whole minutes to an epoch-ms timestamp.
pub fn add_minutes(ts: i64, minutes: i64) -> i64 {
    ts + minutes * MS_PER_MINUTE
}

/// Adds whole days to an epoch-ms timestamp.
pub fn add_days(ts: i64, days: i64) -> i64 {
    ts + days * MS_PER_DAY
}

/// Returns `23:59:00.000Z` of the UTC date containing `ts`.
pub fn end_of_day(ts: i64) -> i64 {
    let day_start = ts - ts.rem_euclid(MS_PER_DAY);
    day_start + 23 * 3_600_000 + 59 * MS_PER_MINUTE
}

/// Renders an epoch-ms timestamp as an ISO-8601 UTC string. A presentation
/// concern only — nothing upstream should branch on the string form.
pub fn to_iso(ts: i64) -> String {
    to_datetime(ts).to_rfc3339()
}

/// Converts an epoch-ms timestamp to a `chrono` UTC datetime.
pub fn to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

/// Normalizes a raw timestamp of unknown unit (ISO string, ms, or seconds)
/// into epoch-ms. Seconds are detected by magnitude (< 10^11, per spec §4.D).
pub fn normalize_ts(raw: &RawTimestamp) -> anyhow::Result<i64> {
    match raw {
        RawTimestamp::Iso(s) => {
            let dt = DateTime::parse_from_rfc3339(s)
                .map_err(|e| anyhow::anyhow!("invalid ISO timestamp '{s}': {e}"))?;
            Ok(dt.with_timezone(&Utc).timestamp_millis())
        }
        RawTimestamp::Number(n) => {
            if n.abs() < 100_000_000_000 {
                Ok(n * 1000)
            } else {
                Ok(*n)
            }
        }
    }
}

/// A raw timestamp value as received from an external source, prior to
/// normalization. Never used past the ingest boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Iso(String),
    Number(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_to_boundary() {
        let ts = 1_704_067_200_000i64 + 7 * MS_PER_MINUTE; // 00:07:00
        assert_eq!(floor(ts, 5), 1_704_067_200_000 + 5 * MS_PER_MINUTE);
        assert_eq!(floor(ts, 15), 1_704_067_200_000);
    }

    #[test]
    fn floor_is_idempotent() {
        let ts = 1_704_067_200_000i64 + 37 * MS_PER_MINUTE;
        let once = floor(ts, 15);
        assert_eq!(floor(once, 15), once);
    }

    #[test]
    fn add_minutes_stays_aligned() {
        let ts = floor(1_704_067_200_123, 15);
        let next = add_minutes(ts, 15);
        assert_eq!(floor(next, 15), next);
    }

    #[test]
    fn end_of_day_is_23_59() {
        let base = 1_704_067_200_000i64; // 2024-01-01T00:00:00Z
        let eod = end_of_day(base + 3 * 3_600_000);
        let dt = to_datetime(eod);
        assert_eq!(dt.format("%H:%M:%S%.3f").to_string(), "23:59:00.000");
    }

    #[test]
    fn normalizes_seconds_vs_millis() {
        let seconds = RawTimestamp::Number(1_704_067_200);
        let millis = RawTimestamp::Number(1_704_067_200_000);
        assert_eq!(normalize_ts(&seconds).unwrap(), 1_704_067_200_000);
        assert_eq!(normalize_ts(&millis).unwrap(), 1_704_067_200_000);
    }

    #[test]
    fn normalizes_iso() {
        let iso = RawTimestamp::Iso("2024-01-01T00:00:00Z".to_string());
        assert_eq!(normalize_ts(&iso).unwrap(), 1_704_067_200_000);
    }
}
