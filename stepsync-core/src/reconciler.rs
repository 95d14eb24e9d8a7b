//! Step Reconciliation State Machine
//!
//! ## Overview
//!
//! Hardware step counters are cheap and noisy. The value they report is a
//! lifetime total since boot, which is not what a user wants to see:
//!
//! ```text
//! raw counter:   ... 8_100  8_140 │ 8_150 ...  (reboot)  12  40 ...
//!                                 │ midnight
//! app steps:     ...   940    980 │     0 ...            990 1_018 ...
//! ```
//!
//! The reconciler keeps an offset so that `app = raw - offset` and moves the
//! offset whenever the raw counter stops meaning what it used to:
//!
//! | Anomaly            | Detected by                          | Repair                         |
//! |--------------------|--------------------------------------|--------------------------------|
//! | Day rollover       | local day of last reading != today   | count = 0, offset = raw        |
//! | Reboot             | sticky reboot flag                   | offset = raw - count           |
//! | Counter regression | raw - offset < count                 | offset = raw - count           |
//! | Negative count     | count < 0 (corrupt persisted state)  | count = 0, offset = 0          |
//!
//! Every field change is written through to the store before the next rule
//! runs, so a process killed mid-reading restarts from a consistent prefix.
//!
//! ## Pulse Mode
//!
//! Step detectors report one pulse per step. The count is simply incremented,
//! and starts over when a pulse lands on a later local day.
//!
//! ## Threading
//!
//! All mutating operations take `&mut self`. A host that shares a reconciler
//! between threads wraps it in its own mutex; the multi-field updates are not
//! atomic with respect to each other.

use crate::{
    config::ReconcilerConfig,
    constants::STEP_PULSE_MAGNITUDE,
    errors::StepError,
    store::StepState,
    time::{Clock, Timestamp},
    traits::{SensorHub, SensorKind, SensorMode, SensorReading, StateKey, StepObserver, StepStore},
};

/// Converts raw step sensor readings into a persisted daily step count
pub struct StepReconciler<S, C, O>
where
    S: StepStore,
    C: Clock,
    O: StepObserver,
{
    store: S,
    clock: C,
    observer: O,
    config: ReconcilerConfig,
    state: StepState,
    mode: SensorMode,
    /// Next counted pulse starts a new day
    pending_day_reset: bool,
}

impl<S, C, O> StepReconciler<S, C, O>
where
    S: StepStore,
    C: Clock,
    O: StepObserver,
{
    /// Create a reconciler with the default configuration
    pub fn new(store: S, clock: C, observer: O) -> Self {
        Self::with_config(store, clock, observer, ReconcilerConfig::default())
    }

    /// Create a reconciler, loading persisted state from `store`
    ///
    /// If the last reading was taken on an earlier local day (the app was
    /// closed across midnight) the count is reset before anything else. The
    /// offset is moved to the last raw counter value so the next counter
    /// reading does not bring yesterday's steps back.
    pub fn with_config(store: S, clock: C, observer: O, config: ReconcilerConfig) -> Self {
        let state = StepState::load(&store);
        let mut reconciler = Self {
            store,
            clock,
            observer,
            config,
            state,
            mode: SensorMode::Idle,
            pending_day_reset: false,
        };

        let now = reconciler.clock.now();
        if reconciler.config.is_new_day(reconciler.state.last_sensor_time, now) {
            reconciler.state.current_app_step = 0;
            reconciler.state.last_offset_step = reconciler.state.last_sensor_step;
            reconciler.state.last_sensor_time = now;
            reconciler.state.system_reboot_status = false;
            reconciler.persist(&[
                StateKey::CurrentAppStep,
                StateKey::LastOffsetStep,
                StateKey::LastSensorTime,
                StateKey::SystemRebootStatus,
            ]);
            step_info!("new day since last run, step count reset");
        }

        reconciler
    }

    /// Pick a sensor and subscribe to it
    ///
    /// The step counter is preferred. With only a step detector the current
    /// count is emitted immediately so a fresh display is not blank until the
    /// next step. With neither, or if the platform refuses the subscription,
    /// the observer is told the device is unsupported.
    ///
    /// Calling `start` while already started does nothing.
    pub fn start<H: SensorHub + ?Sized>(&mut self, hub: &mut H) -> SensorMode {
        if self.mode != SensorMode::Idle {
            step_debug!("start ignored, already in {:?} mode", self.mode);
            return self.mode;
        }

        let mode = if hub.has_capability(SensorKind::StepCounter) {
            SensorMode::Cumulative
        } else if hub.has_capability(SensorKind::StepDetector) {
            SensorMode::Pulse
        } else {
            step_info!("{}", StepError::CapabilityUnavailable);
            self.mode = SensorMode::Unsupported;
            self.observer.on_unsupported();
            return self.mode;
        };

        let Some(kind) = mode.sensor() else {
            return self.mode;
        };
        if !hub.subscribe(kind) {
            step_warn!("{}", StepError::SubscriptionFailed { kind });
            self.mode = SensorMode::Unsupported;
            self.observer.on_unsupported();
            return self.mode;
        }

        step_info!("subscribed to {}", kind);
        self.mode = mode;
        if mode == SensorMode::Pulse {
            self.emit();
        }
        self.mode
    }

    /// Tear down the subscription; later readings are ignored
    pub fn stop<H: SensorHub + ?Sized>(&mut self, hub: &mut H) {
        if self.mode.sensor().is_some() {
            hub.unsubscribe();
            step_info!("unsubscribed from {:?} mode", self.mode);
        }
        self.mode = SensorMode::Idle;
    }

    /// Handle a reading from the subscribed sensor
    ///
    /// Readings are dropped while stopped or when they come from a sensor
    /// other than the one subscribed to. Returns the count after the reading
    /// when it was processed.
    pub fn on_reading(&mut self, reading: SensorReading) -> Option<u64> {
        let now = self.clock.now();
        match (self.mode, reading) {
            (SensorMode::Cumulative, SensorReading::Counter(raw)) => {
                Some(self.process_cumulative(raw, now))
            }
            (SensorMode::Pulse, SensorReading::Detector(magnitude)) => {
                Some(self.process_pulse(magnitude, now))
            }
            (mode, reading) => {
                step_debug!("dropping {} reading in {:?} mode", reading.kind(), mode);
                None
            }
        }
    }

    /// Sensor accuracy changed; logged only
    pub fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: i32) {
        step_debug!("{} accuracy now {}", kind, accuracy);
    }

    /// Apply one step counter reading taken at `now`
    ///
    /// The rules run in a fixed order and the rollover and reboot rules may
    /// both fire on the same reading. Returns the corrected count, which is
    /// also emitted to the observer.
    pub fn process_cumulative(&mut self, raw: i64, now: Timestamp) -> u64 {
        step_debug!("step counter raw={}", raw);

        if self.config.is_new_day(self.state.last_sensor_time, now) {
            self.state.current_app_step = 0;
            self.state.last_offset_step = raw;
            self.state.system_boot_time = self.clock.boot_time();
            self.persist(&[
                StateKey::LastOffsetStep,
                StateKey::CurrentAppStep,
                StateKey::SystemBootTime,
            ]);
            step_info!("day rollover, offset re-anchored at {}", raw);
        }

        if self.state.system_reboot_status {
            self.state.last_offset_step = raw.saturating_sub(self.state.current_app_step);
            self.state.system_reboot_status = false;
            self.state.system_boot_time = self.clock.boot_time();
            self.persist(&[
                StateKey::LastOffsetStep,
                StateKey::SystemBootTime,
                StateKey::SystemRebootStatus,
            ]);
            step_info!(
                "reboot recovered, offset {} keeps count at {}",
                self.state.last_offset_step,
                self.state.current_app_step
            );
        }

        let current = raw.saturating_sub(self.state.last_offset_step);
        if current < self.state.current_app_step {
            step_warn!(
                "step counter went backwards ({} < {}), re-anchoring",
                current,
                self.state.current_app_step
            );
            self.state.last_offset_step = raw.saturating_sub(self.state.current_app_step);
            self.persist(&[StateKey::LastOffsetStep]);
        } else {
            self.state.current_app_step = current;
            self.persist(&[StateKey::CurrentAppStep]);
        }

        self.state.last_sensor_step = raw;
        self.state.last_sensor_time = now;
        self.persist(&[StateKey::LastSensorStep, StateKey::LastSensorTime]);

        if self.state.current_app_step < 0 {
            step_warn!("negative step count {}, clamping", self.state.current_app_step);
            self.state.current_app_step = 0;
            self.state.last_offset_step = 0;
            self.persist(&[StateKey::CurrentAppStep, StateKey::LastOffsetStep]);
        }

        self.emit()
    }

    /// Apply one step detector pulse taken at `now`
    ///
    /// Only a magnitude of exactly 1 is a step; anything else leaves the
    /// count alone. Either way the current count is emitted. A pulse on a
    /// later local day starts the count over; the post-midnight window does
    /// not apply, since every pulse in it is a step taken today.
    pub fn process_pulse(&mut self, magnitude: f32, now: Timestamp) -> u64 {
        if magnitude == STEP_PULSE_MAGNITUDE {
            let other_day = self.config.is_other_day(self.state.last_sensor_time, now);
            if self.pending_day_reset || other_day {
                self.pending_day_reset = false;
                self.state.last_sensor_time = now;
                self.state.current_app_step = 0;
                step_info!("day rollover, pulse count reset");
            }

            self.state.current_app_step = self.state.current_app_step.max(0).saturating_add(1);
            self.state.last_sensor_time = now;
            self.persist(&[StateKey::CurrentAppStep, StateKey::LastSensorTime]);
        } else {
            step_debug!("ignoring pulse of magnitude {}", magnitude);
        }

        self.emit()
    }

    /// Make the next counted pulse start a new day
    ///
    /// Called by whatever detects local midnight on the host.
    pub fn request_day_reset(&mut self) {
        self.pending_day_reset = true;
    }

    /// Compare the device boot time to the recorded one
    ///
    /// On a mismatch the reboot flag is raised and persisted; the offset is
    /// re-anchored by the next step counter reading. Returns whether a
    /// re-anchor is now pending.
    pub fn detect_reboot(&mut self) -> bool {
        let boot = self.clock.boot_time();
        if self.config.is_different_boot(self.state.system_boot_time, boot) {
            step_info!(
                "boot time moved from {} to {}",
                self.state.system_boot_time,
                boot
            );
            self.mark_rebooted();
        }
        self.state.system_reboot_status
    }

    /// Record that the device rebooted
    ///
    /// For hosts that receive an explicit boot-completed notification.
    pub fn mark_rebooted(&mut self) {
        if !self.state.system_reboot_status {
            self.state.system_reboot_status = true;
            self.persist(&[StateKey::SystemRebootStatus]);
        }
    }

    /// Corrected step count for the current day
    pub fn steps(&self) -> u64 {
        u64::try_from(self.state.current_app_step).unwrap_or(0)
    }

    /// Snapshot of the persisted fields
    pub fn state(&self) -> &StepState {
        &self.state
    }

    /// Active input mode
    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    /// Active configuration
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registered observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Take the reconciler apart, e.g. to hand the store to a new instance
    pub fn into_parts(self) -> (S, C, O) {
        (self.store, self.clock, self.observer)
    }

    fn emit(&mut self) -> u64 {
        let steps = self.steps();
        self.observer.on_step(steps);
        steps
    }

    fn persist(&mut self, keys: &[StateKey]) {
        for &key in keys {
            if let Err(err) = self.store.set(key, self.state.value_of(key)) {
                step_warn!("failed to persist {}: {}", key, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{MS_PER_DAY, MS_PER_MINUTE},
        store::MemoryStore,
        time::FixedClock,
        traits::StateValue,
    };

    // 2023-11-14 12:00:00 UTC
    const NOON: Timestamp = 1_699_963_200_000;

    #[derive(Default)]
    struct Recorder {
        steps: heapless::Vec<u64, 32>,
        unsupported: usize,
    }

    impl StepObserver for Recorder {
        fn on_step(&mut self, steps: u64) {
            let _ = self.steps.push(steps);
        }

        fn on_unsupported(&mut self) {
            self.unsupported += 1;
        }
    }

    fn seeded(state: StepState) -> MemoryStore {
        MemoryStore::with_state(&state)
    }

    fn today(current: i64, offset: i64) -> StepState {
        StepState {
            current_app_step: current,
            last_sensor_step: current + offset,
            last_offset_step: offset,
            last_sensor_time: NOON - MS_PER_MINUTE,
            ..StepState::default()
        }
    }

    #[test]
    fn counts_from_offset() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(0, 1_000)), &clock, Recorder::default());

        assert_eq!(r.process_cumulative(1_000, NOON), 0);
        assert_eq!(r.process_cumulative(1_025, NOON + 1), 25);
        assert_eq!(r.process_cumulative(1_100, NOON + 2), 100);
        assert_eq!(r.observer().steps.as_slice(), &[0, 25, 100]);
        assert_eq!(r.state().last_sensor_step, 1_100);
        assert_eq!(r.state().last_sensor_time, NOON + 2);
    }

    #[test]
    fn reboot_keeps_count() {
        let clock = FixedClock::new(NOON);
        let mut state = today(50, 100);
        state.system_reboot_status = true;
        let mut r = StepReconciler::new(seeded(state), &clock, ());

        assert_eq!(r.process_cumulative(5, NOON), 50);
        assert_eq!(r.state().last_offset_step, -45);
        assert!(!r.state().system_reboot_status);
        assert_eq!(
            r.store().get(StateKey::SystemRebootStatus),
            Ok(Some(StateValue::Flag(false)))
        );

        // Counting continues from the new anchor
        assert_eq!(r.process_cumulative(15, NOON + 1), 60);
    }

    #[test]
    fn regression_reanchors() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(30, 10)), &clock, ());

        assert_eq!(r.process_cumulative(20, NOON), 30);
        assert_eq!(r.state().last_offset_step, -10);
        assert_eq!(r.process_cumulative(25, NOON + 1), 35);
    }

    #[test]
    fn rollover_zeroes_count() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(400, 600)), &clock, ());

        let tomorrow = NOON + MS_PER_DAY;
        assert_eq!(r.process_cumulative(1_200, tomorrow), 0);
        assert_eq!(r.state().last_offset_step, 1_200);
        assert_eq!(r.process_cumulative(1_230, tomorrow + 1), 30);
    }

    #[test]
    fn rollover_and_reboot_on_same_reading() {
        let clock = FixedClock::new(NOON).with_boot_time(NOON - 10_000);
        let mut state = today(400, 600);
        state.system_reboot_status = true;
        let mut r = StepReconciler::new(seeded(state), &clock, ());

        let tomorrow = NOON + MS_PER_DAY;
        assert_eq!(r.process_cumulative(7, tomorrow), 0);
        assert_eq!(r.state().last_offset_step, 7);
        assert_eq!(r.state().system_boot_time, NOON - 10_000);
        assert!(!r.state().system_reboot_status);
    }

    #[test]
    fn corrupt_negative_count_is_clamped() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(-5, 10)), &clock, ());

        // raw - offset = -8 < -5, so the regression rule keeps -5 and the
        // negative guard takes over
        assert_eq!(r.process_cumulative(2, NOON), 0);
        assert_eq!(r.state().current_app_step, 0);
        assert_eq!(r.state().last_offset_step, 0);
    }

    #[test]
    fn pulses_count_unit_steps() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(0, 0)), &clock, Recorder::default());

        for i in 0..5 {
            r.process_pulse(1.0, NOON + i);
        }
        assert_eq!(r.steps(), 5);

        assert_eq!(r.process_pulse(2.0, NOON + 10), 5);
        assert_eq!(r.process_pulse(0.0, NOON + 11), 5);
        assert_eq!(r.observer().steps.as_slice(), &[1, 2, 3, 4, 5, 5, 5]);
    }

    #[test]
    fn requested_day_reset_applies_to_next_pulse() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(70, 0)), &clock, ());

        r.request_day_reset();
        // Non-step pulses do not consume the request
        r.process_pulse(3.0, NOON);
        assert_eq!(r.steps(), 70);

        assert_eq!(r.process_pulse(1.0, NOON + 1), 1);
        assert_eq!(r.process_pulse(1.0, NOON + 2), 2);
    }

    #[test]
    fn pulse_after_midnight_starts_new_day() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(70, 0)), &clock, ());

        assert_eq!(r.process_pulse(1.0, NOON + MS_PER_DAY), 1);
    }

    #[test]
    fn pulses_inside_midnight_window_all_count() {
        // 2023-11-15 00:00:00 UTC
        let midnight = NOON + MS_PER_DAY / 2;
        let mut state = today(500, 0);
        state.last_sensor_time = midnight - 20_000;
        let clock = FixedClock::new(midnight);
        let mut r = StepReconciler::new(seeded(state), &clock, ());

        for i in 0..100 {
            r.process_pulse(1.0, midnight + i * 495);
        }
        assert_eq!(r.steps(), 100);
        assert_eq!(StepState::load(r.store()).current_app_step, 100);
    }

    #[test]
    fn cumulative_reading_inside_midnight_window_resets() {
        // 2023-11-15 00:00:30 UTC, last reading 00:00:10 the same day
        let midnight = NOON + MS_PER_DAY / 2;
        let mut state = today(900, 100);
        state.last_sensor_time = midnight + 10_000;
        // Opened just after the window, so construction keeps the count
        let clock = FixedClock::new(midnight + 61_000);
        let mut r = StepReconciler::new(seeded(state), &clock, ());
        assert_eq!(r.steps(), 900);

        assert_eq!(r.process_cumulative(1_050, midnight + 30_000), 0);
        assert_eq!(r.state().last_offset_step, 1_050);

        // Outside the window counting resumes from the new anchor
        assert_eq!(r.process_cumulative(1_080, midnight + 90_000), 30);
    }

    #[test]
    fn detect_reboot_raises_flag() {
        let clock = FixedClock::new(NOON).with_boot_time(NOON - 60_000);
        let mut state = today(10, 0);
        state.system_boot_time = NOON - 60_000;
        let mut r = StepReconciler::new(seeded(state), &clock, ());

        assert!(!r.detect_reboot());

        clock.reboot();
        assert!(r.detect_reboot());
        assert_eq!(
            r.store().get(StateKey::SystemRebootStatus),
            Ok(Some(StateValue::Flag(true)))
        );

        // Counter restarted at zero after the reboot
        assert_eq!(r.process_cumulative(3, NOON), 10);
        assert_eq!(r.state().system_boot_time, NOON);
        assert!(!r.detect_reboot());
    }

    struct ReadOnlyStore(MemoryStore);

    impl StepStore for ReadOnlyStore {
        fn get(&self, key: StateKey) -> crate::errors::StepResult<Option<StateValue>> {
            self.0.get(key)
        }

        fn set(&mut self, key: StateKey, _: StateValue) -> crate::errors::StepResult<()> {
            Err(StepError::Storage {
                key,
                reason: "read-only",
            })
        }
    }

    #[test]
    fn store_failures_do_not_stop_counting() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(ReadOnlyStore(seeded(today(0, 100))), &clock, ());

        assert_eq!(r.process_cumulative(140, NOON), 40);
        assert_eq!(r.process_cumulative(175, NOON + 1), 75);
        assert_eq!(StepState::load(&r.store().0).current_app_step, 0);
    }

    #[test]
    fn writes_go_through() {
        let clock = FixedClock::new(NOON);
        let mut r = StepReconciler::new(seeded(today(0, 100)), &clock, ());
        r.process_cumulative(140, NOON);

        let reloaded = StepState::load(r.store());
        assert_eq!(&reloaded, r.state());
    }
}
