//! Epoch-millisecond clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub type EpochMs = i64;

/// One second in milliseconds.
pub const SECOND_MS: EpochMs = 1_000;
/// One minute in milliseconds.
pub const MINUTE_MS: EpochMs = 60 * SECOND_MS;
/// One hour in milliseconds.
pub const HOUR_MS: EpochMs = 60 * MINUTE_MS;
/// One day in milliseconds.
pub const DAY_MS: EpochMs = 24 * HOUR_MS;

/// Returns current unix epoch milliseconds.
pub fn now_ms() -> EpochMs {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as i64
}

/// UTC midnight of the day containing `ms`.
pub fn utc_midnight(ms: EpochMs) -> EpochMs {
    ms - ms.rem_euclid(DAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midnight_truncates_to_day() {
        // 2024-03-10T15:42:00Z
        let t = 1_710_085_320_000;
        assert_eq!(utc_midnight(t), 1_710_028_800_000);
        assert_eq!(utc_midnight(utc_midnight(t)), utc_midnight(t));
    }
}
