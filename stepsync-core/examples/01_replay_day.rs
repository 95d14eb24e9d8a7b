//! Replay a Day of Step Counter Readings
//!
//! Feeds a recorded sequence of raw step counter values through the
//! reconciler, including a reboot in the afternoon and a counter glitch,
//! and prints the corrected count after each reading.
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_replay_day
//! ```

use stepsync_core::{
    FixedClock, MemoryStore, SensorHub, SensorKind, SensorReading, StepObserver, StepReconciler,
};

// 2023-11-14 07:00:00 UTC
const MORNING: i64 = 1_699_945_200_000;
const HOUR: i64 = 3_600_000;

struct PhoneSensors;

impl SensorHub for PhoneSensors {
    fn has_capability(&self, kind: SensorKind) -> bool {
        kind == SensorKind::StepCounter
    }

    fn subscribe(&mut self, _kind: SensorKind) -> bool {
        true
    }

    fn unsubscribe(&mut self) {}
}

struct Console;

impl StepObserver for Console {
    fn on_step(&mut self, steps: u64) {
        println!("  -> {} steps today", steps);
    }

    fn on_unsupported(&mut self) {
        println!("  -> no step sensor on this device");
    }
}

fn main() {
    println!("StepSync Day Replay");
    println!("===================\n");

    let clock = FixedClock::new(MORNING).with_boot_time(MORNING - 48 * HOUR);
    let mut sensors = PhoneSensors;
    let mut reconciler = StepReconciler::new(MemoryStore::new(), &clock, Console);

    // First run has no recorded boot time, so the first reading anchors
    reconciler.detect_reboot();

    let mode = reconciler.start(&mut sensors);
    println!("Sensor mode: {:?}\n", mode);

    let morning = [(0, 41_200), (1, 42_050), (2, 42_900)];
    for (hour, raw) in morning {
        clock.set(MORNING + hour * HOUR);
        println!("{:02}:00 raw={}", 7 + hour, raw);
        reconciler.on_reading(SensorReading::Counter(raw));
    }

    println!("\n-- phone restarts --");
    clock.set(MORNING + 5 * HOUR);
    clock.reboot();
    println!("reboot detected: {}", reconciler.detect_reboot());

    let afternoon = [(5, 0), (6, 730), (7, 650), (8, 1_400)];
    for (hour, raw) in afternoon {
        clock.set(MORNING + hour * HOUR);
        println!("{:02}:00 raw={}", 7 + hour, raw);
        reconciler.on_reading(SensorReading::Counter(raw));
    }

    reconciler.stop(&mut sensors);
    println!("\nFinal state: {:?}", reconciler.state());
}
