//! Reconciler configuration
//!
//! Step totals are scoped to the user's local calendar day. The reconciler
//! has no timezone database, so the day boundary is described by a fixed UTC
//! offset; hosts refresh the configuration when the user changes zone.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use crate::{
    constants::{DEFAULT_MIDNIGHT_WINDOW_MS, DEFAULT_REBOOT_TOLERANCE_MS, MAX_UTC_OFFSET_SECS},
    time::{self, Timestamp},
};

/// Tunables for day rollover and reboot detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconcilerConfig {
    /// Offset of the user's local time from UTC, in seconds east
    utc_offset_secs: i32,

    /// Window after local midnight that always counts as a new day (ms)
    midnight_window_ms: i64,

    /// Boot-time drift tolerated before a reboot is assumed (ms)
    reboot_tolerance_ms: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: 0,
            midnight_window_ms: DEFAULT_MIDNIGHT_WINDOW_MS,
            reboot_tolerance_ms: DEFAULT_REBOOT_TOLERANCE_MS,
        }
    }
}

impl ReconcilerConfig {
    /// Configuration for a user in the given zone
    pub fn new_with_offset(utc_offset_secs: i32) -> Self {
        Self::default().with_utc_offset(utc_offset_secs)
    }

    /// Days follow UTC
    pub fn utc() -> Self {
        Self::default()
    }

    /// Set the local UTC offset, clamped to real-world zones
    pub fn with_utc_offset(mut self, secs: i32) -> Self {
        self.utc_offset_secs = secs.clamp(-MAX_UTC_OFFSET_SECS, MAX_UTC_OFFSET_SECS);
        self
    }

    /// Set the post-midnight window; zero disables it
    pub fn with_midnight_window(mut self, ms: i64) -> Self {
        self.midnight_window_ms = ms.max(0);
        self
    }

    /// Set the reboot detection tolerance
    pub fn with_reboot_tolerance(mut self, ms: i64) -> Self {
        self.reboot_tolerance_ms = ms.max(0);
        self
    }

    /// Local UTC offset in seconds
    pub fn utc_offset_secs(&self) -> i32 {
        self.utc_offset_secs
    }

    /// Post-midnight window in milliseconds
    pub fn midnight_window_ms(&self) -> i64 {
        self.midnight_window_ms
    }

    /// Reboot detection tolerance in milliseconds
    pub fn reboot_tolerance_ms(&self) -> i64 {
        self.reboot_tolerance_ms
    }

    fn offset(&self) -> FixedOffset {
        // Clamped in the builder, so always within chrono's ±24h range
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    /// Local calendar day of `ts`
    pub fn local_day(&self, ts: Timestamp) -> Option<NaiveDate> {
        time::local_date(ts, self.offset())
    }

    /// Whether `ts` falls inside the window after local midnight
    pub fn in_midnight_window(&self, ts: Timestamp) -> bool {
        time::ms_since_local_midnight(ts, self.offset())
            .is_some_and(|elapsed| elapsed < self.midnight_window_ms)
    }

    /// Whether `last` and `now` fall on different local days
    pub fn is_other_day(&self, last: Timestamp, now: Timestamp) -> bool {
        self.local_day(last) != self.local_day(now)
    }

    /// Whether a step counter total must start over
    ///
    /// True on a different local day, or when `now` is within the
    /// post-midnight window. The window catches a counter reading from before
    /// midnight that is only delivered after it.
    pub fn is_new_day(&self, last: Timestamp, now: Timestamp) -> bool {
        self.is_other_day(last, now) || self.in_midnight_window(now)
    }

    /// Whether two boot times belong to different boots
    pub fn is_different_boot(&self, recorded: Timestamp, current: Timestamp) -> bool {
        current.abs_diff(recorded) > self.reboot_tolerance_ms.unsigned_abs()
    }
}
