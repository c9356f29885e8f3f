use std::sync::{Arc, Mutex};
use std::time::Duration;

use shutter_core::persist::{self, KEY_MAX_COUNT};
use shutter_core::{
    CalibrationRequest, Direction, MotionController, MotionState, MoveOutcome, MoveRejection,
};
use shutter_hardware::MemoryStore;
use shutter_traits::{BoxError, Button, Clock, ManualClock, MotorLines, ShutterIo};

#[derive(Default)]
struct Wires {
    lines: MotorLines,
    presses: Vec<Button>,
}

#[derive(Clone, Default)]
struct FakeDriver(Arc<Mutex<Wires>>);

impl FakeDriver {
    fn drive(&self, d: Direction) {
        self.0.lock().unwrap().lines = MotorLines {
            driving_up: d == Direction::Up,
            driving_down: d == Direction::Down,
        };
    }

    fn presses(&self) -> Vec<Button> {
        self.0.lock().unwrap().presses.clone()
    }
}

impl ShutterIo for FakeDriver {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError> {
        Ok(self.0.lock().unwrap().lines)
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> Result<(), BoxError> {
        if pressed {
            self.0.lock().unwrap().presses.push(button);
        }
        Ok(())
    }
}

struct Bench {
    ctl: MotionController<FakeDriver, MemoryStore>,
    driver: FakeDriver,
    store: MemoryStore,
    results: Arc<Mutex<Vec<bool>>>,
}

fn bench() -> Bench {
    bench_with(MemoryStore::new())
}

fn bench_with(store: MemoryStore) -> Bench {
    let driver = FakeDriver::default();
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let ctl = MotionController::builder()
        .with_clock(Arc::new(ManualClock::new()))
        .on_calibration(move |ok| sink.lock().unwrap().push(ok))
        .with_io(driver.clone())
        .with_store(store.clone())
        .build()
        .unwrap();
    Bench {
        ctl,
        driver,
        store,
        results,
    }
}

impl Bench {
    fn tick(&mut self) {
        self.ctl.clock().sleep(Duration::from_millis(10));
        self.ctl.tick().unwrap();
    }

    fn tick_until_state(&mut self, state: MotionState, limit: usize) {
        for _ in 0..limit {
            self.tick();
            if self.ctl.state() == state {
                return;
            }
        }
        panic!("never reached {state}, still {}", self.ctl.state());
    }

    /// Run the motor for one traversal, counting `pulses` along the way,
    /// then let it stop at the limit.
    fn traverse(&mut self, direction: Direction, pulses: u32) {
        let h = self.ctl.pulse_handle();
        self.driver.drive(direction);
        let mut left = pulses;
        while left > 0 {
            let n = left.min(20);
            for _ in 0..n {
                h.on_edge();
            }
            left -= n;
            self.tick();
        }
        self.driver.drive(Direction::Stopped);
    }

    fn calibrate(&mut self, up: u32, down: u32) {
        assert_eq!(self.ctl.start_calibration(), CalibrationRequest::Started);
        self.tick();
        assert_eq!(self.ctl.state(), MotionState::CalibratingUp);
        self.traverse(Direction::Up, up);

        self.tick_until_state(MotionState::CalibratingDown, 400);
        // One tick to settle the applied action, one for the start press.
        self.tick();
        self.tick();
        self.traverse(Direction::Down, down);

        self.tick_until_state(MotionState::CalibratingValidation, 400);
        self.tick();
    }

    fn results(&self) -> Vec<bool> {
        self.results.lock().unwrap().clone()
    }
}

#[test]
fn matching_traversals_store_the_mean() {
    let mut b = bench();
    b.calibrate(1000, 980);

    assert_eq!(b.results(), vec![true]);
    assert_eq!(b.ctl.state(), MotionState::Stopped);
    assert!(b.ctl.is_calibrated());
    assert_eq!(b.ctl.max_pulses(), 990);
    assert_eq!(b.ctl.current_pulses(), 990);
    assert_eq!(b.ctl.current_percent(), 100);
    assert_eq!(
        b.store.raw(KEY_MAX_COUNT),
        Some(persist::encode_i32(990).to_vec())
    );
    assert_eq!(b.driver.presses(), vec![Button::Up, Button::Down]);
}

#[test]
fn mismatched_traversals_are_rejected() {
    let mut b = bench();
    b.calibrate(1000, 850);

    assert_eq!(b.results(), vec![false]);
    assert!(!b.ctl.is_calibrated());
    assert_eq!(b.ctl.state(), MotionState::Stopped);
    assert_eq!(
        b.ctl.move_to_percent(50).unwrap(),
        MoveOutcome::Rejected(MoveRejection::NotCalibrated)
    );
}

#[test]
fn calibrated_controller_accepts_moves() {
    let mut b = bench();
    b.calibrate(2000, 2000);
    assert!(matches!(
        b.ctl.move_to_percent(25).unwrap(),
        MoveOutcome::Started {
            target_pulses: 500,
            target_percent: 25
        }
    ));
}

#[test]
fn pulses_are_counted_per_phase() {
    let mut b = bench();
    b.ctl.start_calibration();
    b.tick();
    b.traverse(Direction::Up, 400);
    let session = b.ctl.calibration_session().copied().unwrap();
    assert_eq!(session.up_pulses, 400);
    assert_eq!(session.down_pulses, 0);
}

#[test]
fn calibration_times_out_when_no_limit_is_seen() {
    let mut b = bench();
    b.ctl.start_calibration();
    b.tick();
    b.driver.drive(Direction::Up);
    b.tick_until_state(MotionState::Stopped, 9_500);

    assert_eq!(b.results(), vec![false]);
    assert!(!b.ctl.is_calibrated());
    assert!(b.ctl.calibration_session().is_none());
    // Start press, then the stop press for the still-running motor.
    assert_eq!(b.driver.presses(), vec![Button::Up, Button::Up]);
}

fn previously_calibrated(max: i32) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_raw(KEY_MAX_COUNT, &persist::encode_i32(max));
    store
}

#[test]
fn timed_out_calibration_stays_uncalibrated_after_restart() {
    let store = previously_calibrated(1000);
    let mut b = bench_with(store.clone());
    assert!(b.ctl.is_calibrated());

    b.ctl.start_calibration();
    b.tick();
    b.driver.drive(Direction::Up);
    b.tick_until_state(MotionState::Stopped, 9_500);
    assert!(!b.ctl.is_calibrated());
    drop(b);

    let mut again = bench_with(store);
    assert!(!again.ctl.is_calibrated());
    assert_eq!(
        again.ctl.move_to_percent(50).unwrap(),
        MoveOutcome::Rejected(MoveRejection::NotCalibrated)
    );
}

#[test]
fn rejected_calibration_clears_the_stored_travel() {
    let store = previously_calibrated(1000);
    let mut b = bench_with(store.clone());
    b.calibrate(1000, 850);

    assert_eq!(b.results(), vec![false]);
    assert_eq!(store.raw(KEY_MAX_COUNT), Some(persist::encode_i32(0).to_vec()));
}

#[test]
fn stop_aborts_calibration() {
    let mut b = bench();
    b.ctl.start_calibration();
    b.tick();
    b.driver.drive(Direction::Up);
    for _ in 0..5 {
        b.tick();
    }
    b.ctl.stop().unwrap();

    assert_eq!(b.results(), vec![false]);
    assert_eq!(b.ctl.state(), MotionState::Stopped);
    assert_eq!(b.driver.presses(), vec![Button::Up, Button::Up]);
}

#[test]
fn no_reports_while_calibrating() {
    let mut b = bench();
    b.ctl.start_calibration();
    let h = b.ctl.pulse_handle();
    b.driver.drive(Direction::Up);
    for _ in 0..100 {
        h.on_edge();
        b.ctl.clock().sleep(Duration::from_millis(10));
        assert_eq!(b.ctl.tick().unwrap(), None);
    }
}
