//! Step count observer

/// Receives corrected step counts from the reconciler
///
/// There is exactly one observer per reconciler, fixed at construction.
/// Use `()` when nobody is listening.
pub trait StepObserver {
    /// Corrected step count for the current day
    fn on_step(&mut self, steps: u64);

    /// The device has no usable step sensor
    fn on_unsupported(&mut self);
}

impl StepObserver for () {
    fn on_step(&mut self, _steps: u64) {}

    fn on_unsupported(&mut self) {}
}

impl<O: StepObserver + ?Sized> StepObserver for &mut O {
    fn on_step(&mut self, steps: u64) {
        (**self).on_step(steps);
    }

    fn on_unsupported(&mut self) {
        (**self).on_unsupported();
    }
}
