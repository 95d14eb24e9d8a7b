//! Reconciler state and the in-memory store
//!
//! [`StepState`] is the six persisted scalars as one value. It is loaded
//! once when the reconciler is constructed and written back field by field
//! afterwards.
//!
//! [`MemoryStore`] is a fixed-capacity [`StepStore`] with no heap use. It is
//! the store of choice for tests and for devices that persist state by other
//! means (e.g. snapshotting the whole map into flash on shutdown).

use heapless::FnvIndexMap;

use crate::{
    constants::MEMORY_STORE_CAPACITY,
    errors::{StepError, StepResult},
    time::Timestamp,
    traits::{StateKey, StateValue, StepStore},
};

/// Snapshot of the persisted reconciler fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepState {
    /// Corrected step count for the current day
    pub current_app_step: i64,
    /// Last raw step counter value
    pub last_sensor_step: i64,
    /// `current_app_step == last_sensor_step - last_offset_step` after each
    /// counter reading
    pub last_offset_step: i64,
    /// Wall-clock time of the last accepted reading
    pub last_sensor_time: Timestamp,
    /// Device boot time as of the last observed reboot
    pub system_boot_time: Timestamp,
    /// Reboot seen, offset not yet re-anchored
    pub system_reboot_status: bool,
}

impl StepState {
    /// Load every field from `store`
    ///
    /// Missing fields default to zero / false / the epoch. Unreadable or
    /// mistyped fields are logged and defaulted too: a corrupt store must
    /// not stop step tracking.
    pub fn load<S: StepStore + ?Sized>(store: &S) -> Self {
        let mut state = Self::default();
        for key in StateKey::ALL {
            match store.get(key).and_then(|value| state.apply(key, value)) {
                Ok(()) => {}
                Err(err) => step_warn!("defaulting {}: {}", key, err),
            }
        }
        state
    }

    fn apply(&mut self, key: StateKey, value: Option<StateValue>) -> StepResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        match key {
            StateKey::CurrentAppStep => self.current_app_step = value.as_integer(key)?,
            StateKey::LastSensorStep => self.last_sensor_step = value.as_integer(key)?,
            StateKey::LastOffsetStep => self.last_offset_step = value.as_integer(key)?,
            StateKey::LastSensorTime => self.last_sensor_time = value.as_integer(key)?,
            StateKey::SystemBootTime => self.system_boot_time = value.as_integer(key)?,
            StateKey::SystemRebootStatus => self.system_reboot_status = value.as_flag(key)?,
        }
        Ok(())
    }

    /// Current value of one field
    pub fn value_of(&self, key: StateKey) -> StateValue {
        match key {
            StateKey::CurrentAppStep => StateValue::Integer(self.current_app_step),
            StateKey::LastSensorStep => StateValue::Integer(self.last_sensor_step),
            StateKey::LastOffsetStep => StateValue::Integer(self.last_offset_step),
            StateKey::LastSensorTime => StateValue::Integer(self.last_sensor_time),
            StateKey::SystemBootTime => StateValue::Integer(self.system_boot_time),
            StateKey::SystemRebootStatus => StateValue::Flag(self.system_reboot_status),
        }
    }

    /// Write every field to `store`, stopping at the first failure
    pub fn save<S: StepStore + ?Sized>(&self, store: &mut S) -> StepResult<()> {
        for key in StateKey::ALL {
            store.set(key, self.value_of(key))?;
        }
        Ok(())
    }
}

/// Fixed-capacity in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: FnvIndexMap<StateKey, StateValue, MEMORY_STORE_CAPACITY>,
    writes: usize,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `state`
    pub fn with_state(state: &StepState) -> Self {
        let mut store = Self::new();
        for key in StateKey::ALL {
            // Capacity exceeds the key count, so seeding cannot fail
            let _ = store.values.insert(key, state.value_of(key));
        }
        store
    }

    /// Number of `set` calls since creation
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StepStore for MemoryStore {
    fn get(&self, key: StateKey) -> StepResult<Option<StateValue>> {
        Ok(self.values.get(&key).copied())
    }

    fn set(&mut self, key: StateKey, value: StateValue) -> StepResult<()> {
        self.values
            .insert(key, value)
            .map_err(|_| StepError::Storage { key, reason: "store full" })?;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> StepState {
        StepState {
            current_app_step: 1_234,
            last_sensor_step: 9_000,
            last_offset_step: 7_766,
            last_sensor_time: 1_700_000_000_000,
            system_boot_time: 1_699_990_000_000,
            system_reboot_status: true,
        }
    }

    #[test]
    fn empty_store_loads_defaults() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(StepState::load(&store), StepState::default());
    }

    #[test]
    fn save_then_load() {
        let state = sample_state();
        let mut store = MemoryStore::new();
        state.save(&mut store).unwrap();

        assert_eq!(store.len(), 6);
        assert_eq!(store.writes(), 6);
        assert_eq!(StepState::load(&store), state);
    }

    #[test]
    fn seeded_store_does_not_count_writes() {
        let store = MemoryStore::with_state(&sample_state());
        assert_eq!(store.writes(), 0);
        assert_eq!(StepState::load(&store), sample_state());
    }

    #[test]
    fn mistyped_field_defaults() {
        let mut store = MemoryStore::new();
        store.set(StateKey::CurrentAppStep, StateValue::Flag(true)).unwrap();
        store.set(StateKey::LastOffsetStep, StateValue::Integer(40)).unwrap();

        let state = StepState::load(&store);
        assert_eq!(state.current_app_step, 0);
        assert_eq!(state.last_offset_step, 40);
    }

    #[test]
    fn overwrite_keeps_one_entry() {
        let mut store = MemoryStore::new();
        store.set(StateKey::CurrentAppStep, StateValue::Integer(1)).unwrap();
        store.set(StateKey::CurrentAppStep, StateValue::Integer(2)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(StateKey::CurrentAppStep),
            Ok(Some(StateValue::Integer(2)))
        );
    }
}
