use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use shutter_core::persist::{self, KEY_CURRENT, KEY_MAX_COUNT};
use shutter_core::{MotionController, MoveOutcome};
use shutter_hardware::MemoryStore;
use shutter_traits::{BoxError, Button, Clock, ManualClock, MotorLines, ShutterIo};

/// Motor driver that always reports driving down.
struct AlwaysDown;

impl ShutterIo for AlwaysDown {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError> {
        Ok(MotorLines {
            driving_up: false,
            driving_down: true,
        })
    }
    fn set_button(&mut self, _button: Button, _pressed: bool) -> Result<(), BoxError> {
        Ok(())
    }
}

fn store(max: i32, current: i32) -> MemoryStore {
    let s = MemoryStore::new();
    s.insert_raw(KEY_MAX_COUNT, &persist::encode_i32(max));
    s.insert_raw(KEY_CURRENT, &persist::encode_i32(current));
    s
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn moving_down_never_decreases_or_exceeds_travel(
        max in 200i32..5000,
        start_frac in 0.0f64..0.5,
        batches in prop::collection::vec(0u32..60, 1..150),
    ) {
        let start = (f64::from(max) * start_frac) as i32;
        let mut ctl = MotionController::builder()
            .with_clock(Arc::new(ManualClock::new()))
            .with_io(AlwaysDown)
            .with_store(store(max, start))
            .build()
            .unwrap();
        ctl.close().unwrap();
        let edge = ctl.pulse_handle();

        let mut last = ctl.current_pulses();
        for n in batches {
            for _ in 0..n {
                edge.on_edge();
            }
            ctl.clock().sleep(Duration::from_millis(10));
            ctl.tick().unwrap();
            let now = ctl.current_pulses();
            prop_assert!(now >= last, "went from {} to {}", last, now);
            prop_assert!(now <= max, "{} beyond {}", now, max);
            last = now;
        }
    }

    #[test]
    fn move_targets_stay_within_travel(
        max in 1i32..100_000,
        current_frac in 0.0f64..=1.0,
        percent in any::<u8>(),
    ) {
        let current = (f64::from(max) * current_frac) as i32;
        let mut ctl = MotionController::builder()
            .with_clock(Arc::new(ManualClock::new()))
            .with_io(AlwaysDown)
            .with_store(store(max, current))
            .build()
            .unwrap();
        match ctl.move_to_percent(percent).unwrap() {
            MoveOutcome::Started { target_pulses, target_percent } => {
                prop_assert!((0..=max).contains(&target_pulses));
                prop_assert!(target_percent <= 100);
                prop_assert_eq!(ctl.target_pulses(), Some(target_pulses));
            }
            MoveOutcome::AlreadyAtTarget => {
                prop_assert_eq!(ctl.target_pulses(), None);
            }
            MoveOutcome::Rejected(r) => {
                prop_assert!(false, "unexpected rejection {:?}", r);
            }
        }
    }
}
