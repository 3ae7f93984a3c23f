//! Time sources
//!
//! Expiry windows (OTP challenges, stale PENDING transactions, saga
//! reconciliation) are all evaluated against an injected [`TimeSource`]
//! so that they can be driven deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::core_types::TimestampMs;

/// Source of "now" in Unix milliseconds
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> TimestampMs;
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> TimestampMs {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced time source for simulations and tests
#[derive(Debug)]
pub struct ManualTimeSource {
    now: AtomicI64,
}

impl ManualTimeSource {
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Start at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(SystemTimeSource.now_ms())
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as TimestampMs, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: TimestampMs) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a millisecond timestamp into a chrono UTC datetime (for SQL binds)
pub fn to_datetime(ms: TimestampMs) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        // After Jan 1, 2020
        assert!(SystemTimeSource.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_time_source_advance() {
        let clock = ManualTimeSource::new(1_000);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now_ms(), 6_000);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_to_datetime_roundtrip() {
        let ms = 1_703_494_800_000;
        assert_eq!(to_datetime(ms).timestamp_millis(), ms);
    }
}
