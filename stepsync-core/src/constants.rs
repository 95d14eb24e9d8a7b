//! Constants for StepSync Core
//!
//! Numeric values used by the reconciler and its configuration. Names carry
//! their units.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: i64 = 1000;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: i32 = 3600;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;

/// Milliseconds per day.
pub const MS_PER_DAY: i64 = 24 * 60 * MS_PER_MINUTE;

// ===== DAY ROLLOVER =====

/// Length of the window after local midnight in which the step count is
/// forced back to zero (milliseconds).
///
/// Covers the whole "00:00" minute. A reading that arrived just before
/// midnight but was only delivered after it is treated as belonging to the
/// new day.
pub const DEFAULT_MIDNIGHT_WINDOW_MS: i64 = MS_PER_MINUTE;

/// Largest UTC offset accepted for the user's local day (seconds).
///
/// Real-world zones span UTC-12:00 to UTC+14:00.
pub const MAX_UTC_OFFSET_SECS: i32 = 14 * SECONDS_PER_HOUR;

// ===== REBOOT DETECTION =====

/// Boot-time drift tolerated before a reboot is assumed (milliseconds).
///
/// Boot time is usually derived as `now - uptime`, so two reads on the same
/// boot can differ by scheduling jitter and wall-clock adjustments.
pub const DEFAULT_REBOOT_TOLERANCE_MS: i64 = 5 * MS_PER_SECOND;

// ===== SENSOR VALUES =====

/// Magnitude a step detector reports for one detected step.
pub const STEP_PULSE_MAGNITUDE: f32 = 1.0;

/// Number of persisted fields.
pub const STATE_FIELD_COUNT: usize = 6;

/// Capacity of the in-memory store map (power of two, at least
/// `STATE_FIELD_COUNT`).
pub const MEMORY_STORE_CAPACITY: usize = 8;
