/// Session clock: process start time plus a message counter that only ever goes up.
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};

/// Owned by exactly one scheduler loop, so the counter needs no synchronization.
#[derive(Debug)]
pub struct SessionClock {
    started: Instant,
    start_time: DateTime<Utc>,
    message_index: u64,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            start_time: Utc::now(),
            message_index: 0,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Index the next stamp will carry.
    pub fn message_index(&self) -> u64 {
        self.message_index
    }

    pub fn runtime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Freeze the clock for one message and advance the index.
    pub fn stamp(&mut self) -> Stamp {
        let stamp = Stamp {
            now: Utc::now(),
            index: self.message_index,
            runtime_secs: self.runtime_seconds(),
        };
        self.message_index += 1;
        stamp
    }
}

/// Frozen clock reading for one message. Builders only ever see this, which keeps them pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub now: DateTime<Utc>,
    pub index: u64,
    pub runtime_secs: u64,
}

impl Stamp {
    pub fn time(&self) -> String {
        iso8601(self.now)
    }

    pub fn stale(&self, minutes: u32) -> String {
        iso8601(self.now + TimeDelta::minutes(i64::from(minutes)))
    }
}

/// UTC, whole seconds, trailing `Z`.
pub fn iso8601(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_advances_index() {
        let mut clock = SessionClock::new();
        let a = clock.stamp();
        let b = clock.stamp();
        assert_eq!(a.index, 0);
        assert_eq!(b.index, 1);
        assert_eq!(clock.message_index(), 2);
        assert!(b.now >= a.now);
        assert!(clock.start_time() <= a.now);
    }

    #[test]
    fn test_stamp_formatting() {
        let stamp = Stamp {
            now: Utc.with_ymd_and_hms(2024, 12, 31, 23, 58, 30).unwrap(),
            index: 3,
            runtime_secs: 12,
        };
        assert_eq!(stamp.time(), "2024-12-31T23:58:30Z");
        assert_eq!(stamp.stale(5), "2025-01-01T00:03:30Z");
        assert_eq!(stamp.stale(10), "2025-01-01T00:08:30Z");
    }
}
