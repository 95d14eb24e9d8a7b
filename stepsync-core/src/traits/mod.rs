//! Collaborator Traits for StepSync
//!
//! The reconciler is a pure state machine. Everything it talks to is
//! injected through one of these traits so it can run against real
//! platform services, an in-memory fake, or a replay harness.
//!
//! ## Module Organization
//!
//! - [`store`] - Synchronous key-value persistence for the six state fields
//! - [`sensor`] - Sensor capability query and subscription
//! - [`observer`] - Callback receiving corrected step counts
//!
//! Time is abstracted separately by [`crate::time::Clock`].
//!
//! ## Usage Example
//!
//! ```rust
//! use stepsync_core::traits::StepObserver;
//!
//! struct Display { shown: u64 }
//!
//! impl StepObserver for Display {
//!     fn on_step(&mut self, steps: u64) {
//!         self.shown = steps;
//!     }
//!
//!     fn on_unsupported(&mut self) {
//!         // grey out the step widget
//!     }
//! }
//! ```

pub mod observer;
pub mod sensor;
pub mod store;

pub use observer::StepObserver;
pub use sensor::{SensorHub, SensorKind, SensorMode, SensorReading};
pub use store::{StateKey, StateValue, StepStore};
