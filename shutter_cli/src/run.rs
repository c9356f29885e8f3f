//! `shutter run`: the fixed-rate control loop in real time, fed by commands
//! typed (or piped) on stdin.

use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossbeam_channel::Sender;
use eyre::{Result, WrapErr};
use serde_json::json;
use shutter_config::Config;
use shutter_core::persist;
use shutter_core::{Command, MotionController, PulseCounter, Runner, ShutterCfg};
use shutter_hardware::{SimParams, SimulatedShutter};
use shutter_traits::{KeyValueStore, ShutterIo};

use crate::commands::parse_command;
use crate::output::Output;
use crate::store::open_state_file;

pub fn run(
    cfg: &Config,
    sim: bool,
    max_ticks: Option<u64>,
    out: Output,
    shutdown: &AtomicBool,
) -> Result<()> {
    let store = open_state_file(cfg)?;
    let counter = PulseCounter::new();
    let edge = counter.handle();

    if sim {
        let saved = persist::load(&store);
        let defaults = SimParams::default();
        let travel = u32::try_from(saved.max_count)
            .ok()
            .filter(|&t| t > 0)
            .unwrap_or(defaults.travel_pulses);
        let start_position = if saved.calibrated() {
            u32::try_from(saved.current).unwrap_or(0)
        } else {
            travel
        };
        let shutter = SimulatedShutter::new(SimParams {
            travel_pulses: travel,
            start_position,
            ..defaults
        });
        shutter.attach_pulse_interrupt(move || edge.on_edge());

        let ctl = MotionController::builder()
            .with_config(ShutterCfg::from(cfg))
            .with_pulse_counter(counter)
            .with_io(shutter.io())
            .with_store(store)
            .build()
            .wrap_err("build controller")?;
        let tick = Duration::from_millis(cfg.runner.tick_ms);
        return serve(ctl, cfg.runner.tick_ms, max_ticks, out, shutdown, move || {
            shutter.advance(tick);
        });
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let io = gpio::open(cfg, edge)?;
        let ctl = MotionController::builder()
            .with_config(ShutterCfg::from(cfg))
            .with_pulse_counter(counter)
            .with_io(io)
            .with_store(store)
            .build()
            .wrap_err("build controller")?;
        serve(ctl, cfg.runner.tick_ms, max_ticks, out, shutdown, || {})
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        drop(edge);
        Err(shutter_core::ShutterError::Hardware(
            "this build has no GPIO support (rebuild with `--features hardware` or pass --sim)"
                .to_string(),
        )
        .into())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod gpio {
    use eyre::{Result, WrapErr};
    use shutter_config::Config;
    use shutter_core::PulseHandle;
    use shutter_core::hw_error::map_hw_error;
    use shutter_hardware::{GpioPins, GpioShutter};

    pub fn open(cfg: &Config, edge: PulseHandle) -> Result<GpioShutter> {
        let p = cfg.pins;
        let pins = GpioPins {
            pulse_counter: p.pulse_counter,
            motor_up: p.motor_up,
            motor_down: p.motor_down,
            button_up: p.button_up,
            button_down: p.button_down,
        };
        let mut io = GpioShutter::new(pins, cfg.lines.status_active_low, cfg.lines.button_active_low)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err("open shutter GPIO lines")?;
        io.attach_pulse_interrupt(move || edge.on_edge())
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err_with(|| format!("arm pulse interrupt on pin {}", p.pulse_counter))?;
        Ok(io)
    }
}

/// Read commands from stdin until EOF and queue them for the loop thread.
fn spawn_command_reader(tx: Sender<Command>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match parse_command(line) {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(line, error = %e, "ignored command"),
                }
            }
            tracing::debug!("command input closed");
        })
        .wrap_err("spawn stdin reader")?;
    Ok(())
}

fn serve<I, K, F>(
    ctl: MotionController<I, K>,
    tick_ms: u64,
    max_ticks: Option<u64>,
    out: Output,
    shutdown: &AtomicBool,
    mut after_tick: F,
) -> Result<()>
where
    I: ShutterIo,
    K: KeyValueStore,
    F: FnMut(),
{
    let (mut runner, tx) = Runner::new(ctl, tick_ms);
    spawn_command_reader(tx)?;

    let clock = runner.controller().clock();
    let start = clock.now();
    let summary = runner.run(shutdown, max_ticks, |_, report| {
        after_tick();
        if let Some(p) = report {
            let t_ms = u64::try_from(clock.now().duration_since(start).as_millis()).unwrap_or(0);
            out.report(p, t_ms);
        }
        Ok(())
    })?;

    out.diagnostics(&runner.controller().diagnostics());
    out.summary(
        json!({
            "ticks": summary.ticks,
            "reports": summary.reports,
            "commands": summary.commands,
        }),
        || {
            format!(
                "stopped after {} ticks ({} reports, {} commands)",
                summary.ticks, summary.reports, summary.commands
            )
        },
    );
    Ok(())
}
