//! Time management for step tracking
//!
//! Provides clock abstraction for the two times the reconciler cares about:
//! - Wall clock (when was a reading accepted, which local day is it)
//! - Device boot time (has the device restarted since we last looked)
//!
//! Calendar arithmetic is done with `chrono` at a fixed UTC offset so it
//! works without a timezone database.

use core::cell::Cell;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};

use crate::constants::MS_PER_SECOND;

/// Timestamp in milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Source of wall-clock and boot time
pub trait Clock {
    /// Current wall-clock time
    fn now(&self) -> Timestamp;

    /// Wall-clock time at which the device last booted
    fn boot_time(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn boot_time(&self) -> Timestamp {
        (**self).boot_time()
    }
}

/// Fixed time source for testing and replay
///
/// Uses interior mutability so a test can keep a shared reference while the
/// reconciler holds another one.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now: Cell<Timestamp>,
    boot: Cell<Timestamp>,
}

impl FixedClock {
    /// Clock frozen at `now`, booted at the epoch
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Cell::new(now),
            boot: Cell::new(0),
        }
    }

    /// Set the boot time
    pub fn with_boot_time(self, boot: Timestamp) -> Self {
        self.boot.set(boot);
        self
    }

    /// Move the wall clock to `now`
    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    /// Advance the wall clock by `ms`
    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Simulate a device reboot at the current wall-clock time
    pub fn reboot(&self) {
        self.boot.set(self.now.get());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }

    fn boot_time(&self) -> Timestamp {
        self.boot.get()
    }
}

/// System clock (requires std)
///
/// Boot time comes from the `btime` line of `/proc/stat`. Where that is not
/// available the time the clock was created is used instead, which still
/// changes across reboots.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock {
    fallback_boot: Timestamp,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Create a clock, capturing the fallback boot time
    pub fn new() -> Self {
        Self {
            fallback_boot: Self::wall_clock(),
        }
    }

    fn wall_clock() -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default()
    }

    fn proc_boot_time() -> Option<Timestamp> {
        let stat = std::fs::read_to_string("/proc/stat").ok()?;
        let secs = stat
            .lines()
            .find_map(|line| line.strip_prefix("btime "))?
            .trim()
            .parse::<i64>()
            .ok()?;
        secs.checked_mul(MS_PER_SECOND)
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Self::wall_clock()
    }

    fn boot_time(&self) -> Timestamp {
        Self::proc_boot_time().unwrap_or(self.fallback_boot)
    }
}

/// Calendar date of `ts` in the given zone
///
/// Returns `None` for timestamps chrono cannot represent.
pub fn local_date(ts: Timestamp, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ts).map(|utc| utc.with_timezone(&offset).date_naive())
}

/// Milliseconds elapsed since local midnight
pub fn ms_since_local_midnight(ts: Timestamp, offset: FixedOffset) -> Option<i64> {
    let local = DateTime::from_timestamp_millis(ts)?.with_timezone(&offset);
    let time = local.time();
    Some(
        i64::from(time.num_seconds_from_midnight()) * MS_PER_SECOND
            + i64::from(time.nanosecond() / 1_000_000),
    )
}
