//! `shutter` binary: simulation, the live control loop and state inspection.

mod cli;
mod commands;
mod error_fmt;
mod logging;
mod output;
mod run;
mod simulate;
mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use serde_json::json;
use shutter_config::Config;
use shutter_core::{Diagnostics, ShutterError, persist};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::output::Output;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }

    if let Err(e) = real_main(cli) {
        tracing::debug!(error = ?e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    shutter_config::load_file(&cli.config)
        .map_err(|e| eyre::Report::new(ShutterError::Config(format!("{e:#}"))))
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli)?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");
    let out = Output::new(cli.json);

    match &cli.cmd {
        Commands::Simulate(args) => simulate::simulate(&cfg, args, out),
        Commands::Run { sim, max_ticks } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;
            run::run(&cfg, *sim, *max_ticks, out, &shutdown)
        }
        Commands::Diagnostics => {
            let store = store::open_state_file(&cfg)?;
            out.diagnostics(&Diagnostics::from_persisted(&persist::load(&store)));
            Ok(())
        }
        Commands::SelfCheck => self_check(&cfg, out),
    }
}

fn self_check(cfg: &Config, out: Output) -> Result<()> {
    let store = store::open_state_file(cfg)?;
    let saved = persist::load(&store);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let p = cfg.pins;
        shutter_hardware::GpioShutter::new(
            shutter_hardware::GpioPins {
                pulse_counter: p.pulse_counter,
                motor_up: p.motor_up,
                motor_down: p.motor_down,
                button_up: p.button_up,
                button_down: p.button_down,
            },
            cfg.lines.status_active_low,
            cfg.lines.button_active_low,
        )
        .map_err(|e| eyre::Report::new(shutter_core::hw_error::map_hw_error(&e)))
        .wrap_err("open shutter GPIO lines")?;
    }
    let gpio = cfg!(all(feature = "hardware", target_os = "linux"));

    out.summary(
        json!({
            "ok": true,
            "state_file": cfg.persistence.path,
            "calibrated": saved.calibrated(),
            "gpio": gpio,
        }),
        || {
            format!(
                "self-check ok (state file {}, {}, gpio {})",
                cfg.persistence.path,
                if saved.calibrated() { "calibrated" } else { "not calibrated" },
                if gpio { "ok" } else { "not built" }
            )
        },
    );
    Ok(())
}
