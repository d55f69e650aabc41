//! Wall-clock abstraction.
//!
//! The evaluator needs two readings: milliseconds since the Unix epoch and the
//! local hour of day. Both come from a [`Clock`] so that tests can pin them.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::{Local, Timelike, Utc};

/// Milliseconds in one hour.
pub const HOUR_MILLIS: i64 = 60 * 60 * 1000;

/// Milliseconds in one minute.
pub const MINUTE_MILLIS: i64 = 60 * 1000;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Current hour of day in local time, `0..=23`.
    fn current_hour(&self) -> u32;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn current_hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// A clock whose readings are set explicitly.
///
/// The hour of day is tracked separately from the epoch time so tests can
/// place "now" anywhere relative to the active window without reasoning
/// about time zones.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_millis: AtomicI64,
    hour: AtomicU32,
}

impl ManualClock {
    /// Creates a clock reading `now_millis` at local hour `hour`.
    #[must_use]
    pub fn new(now_millis: i64, hour: u32) -> Self {
        Self {
            now_millis: AtomicI64::new(now_millis),
            hour: AtomicU32::new(hour),
        }
    }

    pub fn set_now(&self, now_millis: i64) {
        self.now_millis.store(now_millis, Ordering::SeqCst);
    }

    pub fn set_hour(&self, hour: u32) {
        self.hour.store(hour, Ordering::SeqCst);
    }

    /// Moves the epoch reading forward without touching the hour.
    pub fn advance(&self, millis: i64) {
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }

    fn current_hour(&self) -> u32 {
        self.hour.load(Ordering::SeqCst)
    }
}
