//! Time sources.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time for ledgers.
///
/// Ledgers never read the system clock directly so that tests can drive time explicitly.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Nanoseconds since the Unix epoch, or `None` if `time` is before the epoch or past `i64::MAX` nanos.
pub fn unix_nanos(time: SystemTime) -> Option<i64> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_nanos()).ok()
}

/// Manually driven [`Clock`] for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<SystemTime>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    pub fn set(&self, time: SystemTime) {
        *self.now.lock() = time;
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn rewind(&self, by: std::time::Duration) {
        let mut now = self.now.lock();
        *now -= by;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}
