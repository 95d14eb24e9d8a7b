//! Sensor Subscription Traits
//!
//! Phones and wearables expose step data in one of two shapes:
//!
//! ```text
//! Step counter:   boot ──► 0 ... 812 ... 4_051 ... (reboot) ──► 0 ...
//!                 lifetime total since boot, reported at the sensor's cadence
//!
//! Step detector:  ─ 1 ─── 1 ─ 1 ──── 1 ──►
//!                 one pulse per detected step, no accumulation
//! ```
//!
//! The platform layer implements [`SensorHub`] and forwards every event to
//! [`crate::StepReconciler::on_reading`]. The reconciler only decides which
//! sensor to subscribe to.

use core::fmt;

/// Hardware step sensor types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SensorKind {
    /// Lifetime cumulative counter, reset only by a reboot
    StepCounter = 0,
    /// Unit pulse per detected step
    StepDetector = 1,
}

impl SensorKind {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            SensorKind::StepCounter => "step counter",
            SensorKind::StepDetector => "step detector",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input mode the reconciler is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorMode {
    /// Not started, or stopped
    #[default]
    Idle,
    /// Subscribed to the step counter
    Cumulative,
    /// Subscribed to the step detector
    Pulse,
    /// No usable sensor; the observer has been told
    Unsupported,
}

impl SensorMode {
    /// Sensor feeding this mode, if any
    pub const fn sensor(&self) -> Option<SensorKind> {
        match self {
            SensorMode::Cumulative => Some(SensorKind::StepCounter),
            SensorMode::Pulse => Some(SensorKind::StepDetector),
            SensorMode::Idle | SensorMode::Unsupported => None,
        }
    }
}

/// Raw value delivered by the platform sensor layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// Lifetime counter value from a step counter
    Counter(i64),
    /// Pulse magnitude from a step detector (1.0 means one step)
    Detector(f32),
}

impl SensorReading {
    /// Sensor that produced this reading
    pub const fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Counter(_) => SensorKind::StepCounter,
            SensorReading::Detector(_) => SensorKind::StepDetector,
        }
    }
}

/// Platform sensor subscription
///
/// Implementations deliver readings by calling the reconciler; they must do
/// so from a single execution context.
pub trait SensorHub {
    /// Whether the device has this sensor
    fn has_capability(&self, kind: SensorKind) -> bool;

    /// Start delivering readings for `kind`; `false` if the platform refused
    fn subscribe(&mut self, kind: SensorKind) -> bool;

    /// Stop delivering readings
    fn unsubscribe(&mut self);
}

impl<H: SensorHub + ?Sized> SensorHub for &mut H {
    fn has_capability(&self, kind: SensorKind) -> bool {
        (**self).has_capability(kind)
    }

    fn subscribe(&mut self, kind: SensorKind) -> bool {
        (**self).subscribe(kind)
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe();
    }
}
