use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Wall clock used for event timestamps, receipt ids and provenance stamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant. Lets two captures share a millisecond.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Pin the clock to `ms` since the epoch; out-of-range values pin to the epoch.
    pub fn at_millis(ms: i64) -> Self {
        let at = Utc
            .timestamp_millis_opt(ms)
            .single()
            .unwrap_or_default();
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// RFC 3339, UTC, millisecond precision, `Z` suffix.
pub fn rfc3339_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
