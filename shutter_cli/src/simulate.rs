//! `shutter simulate`: the controller against `SimulatedShutter` on a
//! manual clock, so a session of many traversals finishes in milliseconds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use serde_json::json;
use shutter_config::Config;
use shutter_core::persist;
use shutter_core::{
    Command, Direction, MotionController, MotionState, PulseCounter, Runner, ShutterCfg,
    ShutterError,
};
use shutter_hardware::{MemoryStore, SimMotion, SimParams, SimulatedIo, SimulatedShutter};
use shutter_traits::{KeyValueStore, ManualClock};

use crate::cli::SimulateArgs;
use crate::output::{Output, command_name};
use crate::store::open_state_file;

pub fn simulate(cfg: &Config, args: &SimulateArgs, out: Output) -> Result<()> {
    if args.persist {
        drive(cfg, args, out, open_state_file(cfg)?)
    } else {
        drive(cfg, args, out, MemoryStore::new())
    }
}

fn is_settled<K: KeyValueStore>(
    ctl: &MotionController<SimulatedIo, K>,
    sim: &SimulatedShutter,
) -> bool {
    ctl.state() == MotionState::Stopped
        && ctl.target_pulses().is_none()
        && ctl.actual_direction() == Direction::Stopped
        && sim.motion() == SimMotion::Idle
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

struct Session<K> {
    runner: Runner<SimulatedIo, K>,
    sim: SimulatedShutter,
    clock: ManualClock,
    tick: Duration,
    max_ticks: u64,
    timeout_s: u64,
    out: Output,
}

impl<K: KeyValueStore> Session<K> {
    /// Apply `command`, then tick until the shutter is at rest again.
    fn step(&mut self, command: Command) -> Result<()> {
        let result = self.runner.controller_mut().apply(command)?;
        self.out.command(command, result);

        let settled = AtomicBool::new(false);
        let (sim, clock, tick, out) = (&self.sim, &self.clock, self.tick, self.out);
        let summary = self.runner.run(&settled, Some(self.max_ticks), |ctl, report| {
            sim.advance(tick);
            if let Some(p) = report {
                out.report(p, millis(clock.elapsed()));
            }
            if is_settled(ctl, sim) {
                settled.store(true, Ordering::Relaxed);
            }
            Ok(())
        })?;

        let name = command_name(command);
        if !settled.load(Ordering::Relaxed) {
            return Err(ShutterError::State(format!(
                "`{name}` still in motion after {} s of simulated time",
                self.timeout_s
            ))
            .into());
        }

        let ctl = self.runner.controller();
        let (percent, pulses) = (ctl.current_percent(), ctl.current_pulses());
        let sim_percent = round1(sim.percent());
        self.out.step(
            json!({
                "command": name,
                "ticks": summary.ticks,
                "percent": percent,
                "pulses": pulses,
                "sim_percent": sim_percent,
                "t_ms": millis(clock.elapsed()),
            }),
            || format!("{name}: at {percent} % ({pulses} pulses), shutter at {sim_percent} %"),
        );
        Ok(())
    }
}

fn drive<K: KeyValueStore>(cfg: &Config, args: &SimulateArgs, out: Output, store: K) -> Result<()> {
    // Resume where the stored state says the shutter is; otherwise closed.
    let saved = persist::load(&store);
    let start_position = if saved.calibrated() && !args.calibrate {
        u32::try_from(saved.current).unwrap_or(0)
    } else {
        args.travel
    };
    let sim = SimulatedShutter::new(SimParams {
        travel_pulses: args.travel,
        pulses_per_sec: args.pulses_per_sec,
        slip: if args.calibrate { 1.0 } else { args.slip },
        start_position,
    });

    let counter = PulseCounter::new();
    let edge = counter.handle();
    sim.attach_pulse_interrupt(move || edge.on_edge());

    let clock = ManualClock::new();
    let ctl = MotionController::builder()
        .with_config(ShutterCfg::from(cfg))
        .with_clock(Arc::new(clock.clone()))
        .with_pulse_counter(counter)
        .on_calibration(move |ok| out.calibration(ok))
        .with_io(sim.io())
        .with_store(store)
        .build()
        .wrap_err("build controller")?;

    let tick_ms = cfg.runner.tick_ms;
    let (runner, _commands) = Runner::new(ctl, tick_ms);
    tracing::info!(
        travel = args.travel,
        pps = args.pulses_per_sec,
        slip = args.slip,
        start_position,
        "simulation start"
    );

    let mut session = Session {
        runner,
        sim: sim.clone(),
        clock,
        tick: Duration::from_millis(tick_ms),
        max_ticks: args.step_timeout_s.saturating_mul(1000) / tick_ms,
        timeout_s: args.step_timeout_s,
        out,
    };

    if args.calibrate {
        session.step(Command::StartCalibration)?;
        sim.set_slip(args.slip);
    }
    if args.window_open {
        session.step(Command::SetWindowOpen(true))?;
    }
    for &p in &args.moves {
        session.step(Command::MoveTo(p))?;
    }
    for _ in 0..args.cycles {
        session.step(Command::Open)?;
        session.step(Command::Close)?;
    }

    out.diagnostics(&session.runner.controller().diagnostics());
    Ok(())
}
