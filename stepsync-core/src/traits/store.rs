//! Persistence Traits
//!
//! The reconciler keeps six scalars. Each one is stored under its own key
//! and written back synchronously whenever it changes; there is no
//! transactional grouping.
//!
//! ## Implementation Requirements
//!
//! - `set` must be durable when it returns
//! - `get` returns `Ok(None)` for a key that was never written
//! - Neither call may block on anything but the write itself

use core::fmt;

use crate::errors::{StepError, StepResult};

/// Persisted reconciler fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum StateKey {
    /// Corrected step count for the current day
    CurrentAppStep = 0,
    /// Last raw step counter value
    LastSensorStep = 1,
    /// Offset subtracted from the raw counter
    LastOffsetStep = 2,
    /// Wall-clock time of the last accepted reading
    LastSensorTime = 3,
    /// Device boot time as of the last observed reboot
    SystemBootTime = 4,
    /// Reboot seen but offset not yet re-anchored
    SystemRebootStatus = 5,
}

impl StateKey {
    /// All keys, in storage order
    pub const ALL: [StateKey; 6] = [
        StateKey::CurrentAppStep,
        StateKey::LastSensorStep,
        StateKey::LastOffsetStep,
        StateKey::LastSensorTime,
        StateKey::SystemBootTime,
        StateKey::SystemRebootStatus,
    ];

    /// Stable key name used by storage backends
    pub const fn name(&self) -> &'static str {
        match self {
            StateKey::CurrentAppStep => "current_app_step",
            StateKey::LastSensorStep => "last_sensor_step",
            StateKey::LastOffsetStep => "last_offset_step",
            StateKey::LastSensorTime => "last_sensor_time",
            StateKey::SystemBootTime => "system_boot_time",
            StateKey::SystemRebootStatus => "system_reboot_status",
        }
    }

    /// Look a key up by its storage name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }

    /// Whether this key holds a flag rather than an integer
    pub const fn is_flag(&self) -> bool {
        matches!(self, StateKey::SystemRebootStatus)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar stored under a [`StateKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateValue {
    /// Step counts, offsets and timestamps
    Integer(i64),
    /// The reboot flag
    Flag(bool),
}

impl StateValue {
    /// Read as an integer, failing on a flag
    pub fn as_integer(&self, key: StateKey) -> StepResult<i64> {
        match *self {
            StateValue::Integer(value) => Ok(value),
            StateValue::Flag(_) => Err(StepError::TypeMismatch { key }),
        }
    }

    /// Read as a flag, failing on an integer
    pub fn as_flag(&self, key: StateKey) -> StepResult<bool> {
        match *self {
            StateValue::Flag(value) => Ok(value),
            StateValue::Integer(_) => Err(StepError::TypeMismatch { key }),
        }
    }
}

/// Synchronous, durable key-value store for reconciler state
pub trait StepStore {
    /// Read a field; `Ok(None)` if it was never written
    fn get(&self, key: StateKey) -> StepResult<Option<StateValue>>;

    /// Write a field durably
    fn set(&mut self, key: StateKey, value: StateValue) -> StepResult<()>;
}

impl<S: StepStore + ?Sized> StepStore for &mut S {
    fn get(&self, key: StateKey) -> StepResult<Option<StateValue>> {
        (**self).get(key)
    }

    fn set(&mut self, key: StateKey, value: StateValue) -> StepResult<()> {
        (**self).set(key, value)
    }
}
