use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use shutter_core::persist::{self, KEY_CURRENT, KEY_MAX_COUNT, KEY_WINDOW_LOGIC};
use shutter_core::{Command, MotionController, MotionState, Runner, WindowOpenLogic};
use shutter_hardware::{MemoryStore, SimParams, SimulatedIo, SimulatedShutter};
use shutter_traits::ManualClock;

type Rig = (
    Runner<SimulatedIo, MemoryStore>,
    crossbeam_channel::Sender<Command>,
    SimulatedShutter,
    MemoryStore,
);

fn setup() -> Rig {
    let sim = SimulatedShutter::new(SimParams {
        travel_pulses: 1000,
        ..SimParams::default()
    });
    let store = MemoryStore::new();
    store.insert_raw(KEY_MAX_COUNT, &persist::encode_i32(1000));
    store.insert_raw(KEY_CURRENT, &persist::encode_i32(0));

    let ctl = MotionController::builder()
        .with_clock(Arc::new(ManualClock::new()))
        .with_io(sim.io())
        .with_store(store.clone())
        .build()
        .unwrap();
    let edge = ctl.pulse_handle();
    sim.attach_pulse_interrupt(move || edge.on_edge());
    let (runner, tx) = Runner::new(ctl, 10);
    (runner, tx, sim, store)
}

#[test]
fn queued_commands_drive_the_shutter() {
    let (mut runner, tx, sim, store) = setup();
    tx.send(Command::MoveTo(50)).unwrap();

    let shutdown = AtomicBool::new(false);
    let sim_hook = sim.clone();
    let summary = runner
        .run(&shutdown, Some(600), |_, _| {
            sim_hook.advance(Duration::from_millis(10));
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.ticks, 600);
    assert_eq!(summary.commands, 1);
    assert!(summary.reports >= 2);
    assert!((sim.position() - 500.0).abs() <= 8.0, "sim at {}", sim.position());

    let ctl = runner.controller();
    assert_eq!(ctl.state(), MotionState::Stopped);
    let saved = persist::decode_i32(&store.raw(KEY_CURRENT).unwrap()).unwrap();
    assert_eq!(saved, ctl.current_pulses());
}

#[test]
fn settings_commands_apply_on_the_loop_thread() {
    let (mut runner, tx, _sim, store) = setup();
    tx.send(Command::SetWindowLogic(WindowOpenLogic::OpenFully)).unwrap();
    tx.send(Command::ToggleDirection).unwrap();

    let shutdown = AtomicBool::new(false);
    let summary = runner.run(&shutdown, Some(3), |_, _| Ok(())).unwrap();
    assert_eq!(summary.commands, 2);

    let ctl = runner.into_controller();
    assert!(ctl.is_direction_inverted());
    assert_eq!(ctl.window_open_logic(), WindowOpenLogic::OpenFully);
    assert_eq!(
        store.raw(KEY_WINDOW_LOGIC),
        Some(persist::encode_i32(2).to_vec())
    );
}

#[test]
fn shutdown_flag_ends_the_loop_before_ticking() {
    let (mut runner, _tx, _sim, _store) = setup();
    let shutdown = AtomicBool::new(true);
    let summary = runner.run(&shutdown, None, |_, _| Ok(())).unwrap();
    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.commands, 0);
}

#[test]
fn hook_errors_stop_the_loop() {
    let (mut runner, _tx, _sim, _store) = setup();
    let shutdown = AtomicBool::new(false);
    let mut calls = 0;
    let res = runner.run(&shutdown, Some(100), |_, _| {
        calls += 1;
        if calls == 5 {
            eyre::bail!("sink closed");
        }
        Ok(())
    });
    assert!(res.is_err());
    assert_eq!(calls, 5);
}
