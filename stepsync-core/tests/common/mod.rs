//! Common test utilities for reconciler integration tests
//!
//! This module provides:
//! - A recording observer
//! - A scripted sensor hub standing in for the platform sensor layer
//! - Timestamps and state fixtures for day-boundary scenarios

#![allow(dead_code)]

use stepsync_core::{
    constants::{MS_PER_DAY, MS_PER_MINUTE},
    SensorHub, SensorKind, StepObserver, StepState, Timestamp,
};

/// 2023-11-14 00:00:00 UTC
pub const MIDNIGHT: Timestamp = 1_699_920_000_000;

/// 2023-11-14 12:00:00 UTC
pub const NOON: Timestamp = MIDNIGHT + MS_PER_DAY / 2;

/// Observer event, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Step(u64),
    Unsupported,
}

/// Observer that records everything it is told
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub signals: Vec<Signal>,
}

impl RecordingObserver {
    pub fn steps(&self) -> Vec<u64> {
        self.signals
            .iter()
            .filter_map(|s| match s {
                Signal::Step(n) => Some(*n),
                Signal::Unsupported => None,
            })
            .collect()
    }

    pub fn unsupported_count(&self) -> usize {
        self.signals
            .iter()
            .filter(|s| matches!(s, Signal::Unsupported))
            .count()
    }
}

impl StepObserver for RecordingObserver {
    fn on_step(&mut self, steps: u64) {
        self.signals.push(Signal::Step(steps));
    }

    fn on_unsupported(&mut self) {
        self.signals.push(Signal::Unsupported);
    }
}

/// Sensor hub with fixed capabilities
#[derive(Debug, Default)]
pub struct ScriptedHub {
    pub has_counter: bool,
    pub has_detector: bool,
    pub refuse_subscription: bool,
    pub subscribed: Option<SensorKind>,
    pub subscribe_calls: usize,
    pub unsubscribe_calls: usize,
}

impl ScriptedHub {
    pub fn counter() -> Self {
        Self { has_counter: true, has_detector: true, ..Self::default() }
    }

    pub fn detector_only() -> Self {
        Self { has_detector: true, ..Self::default() }
    }

    pub fn bare() -> Self {
        Self::default()
    }

    pub fn refusing(mut self) -> Self {
        self.refuse_subscription = true;
        self
    }
}

impl SensorHub for ScriptedHub {
    fn has_capability(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::StepCounter => self.has_counter,
            SensorKind::StepDetector => self.has_detector,
        }
    }

    fn subscribe(&mut self, kind: SensorKind) -> bool {
        self.subscribe_calls += 1;
        if self.refuse_subscription {
            return false;
        }
        self.subscribed = Some(kind);
        true
    }

    fn unsubscribe(&mut self) {
        self.unsubscribe_calls += 1;
        self.subscribed = None;
    }
}

/// State last touched a minute before `now`, same day
pub fn state_at(now: Timestamp, current: i64, offset: i64) -> StepState {
    StepState {
        current_app_step: current,
        last_sensor_step: current + offset,
        last_offset_step: offset,
        last_sensor_time: now - MS_PER_MINUTE,
        ..StepState::default()
    }
}
