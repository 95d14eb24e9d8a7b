//! Error Types for Step Reconciliation
//!
//! ## Design Philosophy
//!
//! The reconciler itself never fails: every hardware anomaly it knows about
//! (day rollover, reboot, counter regression) is repaired by re-anchoring the
//! step offset. Errors exist for the collaborators around it:
//!
//! 1. **Small Size**: Variants carry only `Copy` data and `&'static str`
//!    reasons so they can be returned from store implementations on devices
//!    without an allocator.
//!
//! 2. **Swallowed at the Core**: Store failures are logged by the reconciler
//!    and never retried; the in-memory state stays authoritative until the
//!    next successful write.
//!
//! ## Error Categories
//!
//! ### Sensor Availability
//! - `CapabilityUnavailable`: neither a step counter nor a step detector exists
//! - `SubscriptionFailed`: the platform refused to register a listener
//!
//! ### Persistence
//! - `Storage`: the backing store could not read or write a field
//! - `TypeMismatch`: a stored value has the wrong shape for its field
//!
//! ## Handling Strategy
//!
//! ```rust
//! use stepsync_core::{StepError, StateKey, StateValue, StepStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! match store.set(StateKey::CurrentAppStep, StateValue::Integer(12)) {
//!     Ok(()) => {}
//!     Err(StepError::Storage { key, reason }) => {
//!         // Backend failure - the value lives on in memory only
//!         let _ = (key, reason);
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror_no_std::Error;

use crate::traits::{SensorKind, StateKey};

/// Result type for step tracking operations
pub type StepResult<T> = Result<T, StepError>;

/// Step tracking errors - kept small and `Copy` for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// Device has neither a step counter nor a step detector
    #[error("Device has no step counter or step detector")]
    CapabilityUnavailable,

    /// Platform refused to register a listener for the sensor
    #[error("Subscription to {kind} sensor refused")]
    SubscriptionFailed {
        /// The sensor that could not be subscribed
        kind: SensorKind,
    },

    /// Persistence backend failed to read or write a field
    #[error("Storage failure on {key}: {reason}")]
    Storage {
        /// Field being read or written
        key: StateKey,
        /// Backend-specific reason
        reason: &'static str,
    },

    /// Stored value does not match the field's type
    #[error("Stored value for {key} has the wrong type")]
    TypeMismatch {
        /// Field whose value was malformed
        key: StateKey,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for StepError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::CapabilityUnavailable =>
                defmt::write!(fmt, "No step sensor"),
            Self::SubscriptionFailed { kind } =>
                defmt::write!(fmt, "Subscription refused: {}", kind.name()),
            Self::Storage { key, reason } =>
                defmt::write!(fmt, "Storage {}: {}", key.name(), reason),
            Self::TypeMismatch { key } =>
                defmt::write!(fmt, "Type mismatch: {}", key.name()),
        }
    }
}
