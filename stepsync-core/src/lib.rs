//! Core step reconciliation engine for StepSync
//!
//! Turns raw readings from a phone or wearable step sensor into a stable,
//! day-scoped step total that survives device reboots, counter resets and
//! process restarts.
//!
//! Two kinds of hardware are supported:
//! - **Step counters** report a lifetime cumulative count that only resets
//!   to zero when the device reboots
//! - **Step detectors** fire a unit pulse for every detected step
//!
//! Key constraints:
//! - Runs without an allocator (`no_std` without the `std` feature)
//! - Every state change is written through to the injected store
//! - Anomalies (rollover, reboot, counter regression) self-heal; the
//!   only thing ever surfaced to the caller is the unsupported-device signal
//!
//! ```no_run
//! use stepsync_core::{Clock, FixedClock, MemoryStore, SensorReading, StepReconciler};
//!
//! let clock = FixedClock::new(1_700_000_000_000);
//! let mut reconciler = StepReconciler::new(MemoryStore::new(), &clock, ());
//!
//! // Feed a reading from the hardware step counter
//! let steps = reconciler.process_cumulative(4_200, clock.now());
//! assert!(steps <= 4_200);
//!
//! // Or let the reconciler pull the time from its clock
//! reconciler.on_reading(SensorReading::Counter(4_250));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod config;
pub mod constants;
pub mod errors;
pub mod reconciler;
pub mod store;
pub mod time;
pub mod traits;

// Public API
pub use config::ReconcilerConfig;
pub use errors::{StepError, StepResult};
pub use reconciler::StepReconciler;
pub use store::{MemoryStore, StepState};
pub use time::{Clock, FixedClock, Timestamp};
#[cfg(feature = "std")]
pub use time::SystemClock;
pub use traits::{
    SensorHub, SensorKind, SensorMode, SensorReading, StateKey, StateValue, StepObserver,
    StepStore,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
