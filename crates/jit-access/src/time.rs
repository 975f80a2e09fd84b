//! Time utilities for JIT access.
//!
//! Deadlines are stored as ticks: 100-nanosecond intervals since
//! `0001-01-01T00:00:00Z` on the proleptic Gregorian calendar, UTC.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Ticks per second.
pub const TICKS_PER_SECOND: i128 = 10_000_000;

/// Tick count of `1970-01-01T00:00:00Z`.
pub const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

/// Last representable tick (`9999-12-31T23:59:59.9999999Z`).
pub const MAX_TICKS: u64 = 3_155_378_975_999_999_999;

/// An absolute UTC instant as a tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(u64);

impl Ticks {
    /// Wrap a raw tick count, rejecting values past [`MAX_TICKS`].
    pub fn new(raw: u64) -> Option<Self> {
        (raw <= MAX_TICKS).then_some(Self(raw))
    }

    /// Raw tick count.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Convert a UTC instant to ticks, truncating below 100 ns.
    ///
    /// Returns `None` for instants before year 1 or after year 9999.
    pub fn from_datetime(dt: DateTime<Utc>) -> Option<Self> {
        // Leap-second representations report nanos >= 1e9.
        let nanos = dt.timestamp_subsec_nanos().min(999_999_999);
        let ticks = UNIX_EPOCH_TICKS as i128
            + dt.timestamp() as i128 * TICKS_PER_SECOND
            + (nanos / 100) as i128;
        if ticks < 0 {
            return None;
        }
        u64::try_from(ticks).ok().and_then(Self::new)
    }

    /// Convert back to a UTC instant.
    pub fn to_datetime(self) -> DateTime<Utc> {
        let rel = self.0 as i128 - UNIX_EPOCH_TICKS as i128;
        let secs = rel.div_euclid(TICKS_PER_SECOND) as i64;
        let nanos = (rel.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        // Every tick in 0..=MAX_TICKS lies inside chrono's range.
        DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The instant one tick earlier, saturating at zero.
    pub fn pred(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl std::fmt::Display for Ticks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format an instant as RFC 3339 with second precision and a `Z` suffix.
pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Source of the current time.
///
/// Injected into the issuer and reclaimer so scans can be evaluated
/// against a controlled instant in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
