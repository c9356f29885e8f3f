//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shutter", version, about = "Roller-shutter position controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shutter.toml")]
    pub config: PathBuf,

    /// Emit JSON lines (events, logs and errors) instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the simulated shutter in simulated time
    Simulate(SimulateArgs),
    /// Run the control loop, reading commands from stdin
    Run {
        /// Use the simulated shutter in real time instead of GPIO
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
    },
    /// Print the persisted position, calibration and drift history
    Diagnostics,
    /// Check the config, the state file and (with `hardware`) the GPIO lines
    SelfCheck,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Full travel of the simulated shutter, in pulses
    #[arg(long, value_name = "PULSES", default_value_t = 10_000)]
    pub travel: u32,
    /// Belt speed of the simulated motor
    #[arg(long, value_name = "PPS", default_value_t = 400.0)]
    pub pulses_per_sec: f64,
    /// Fraction of travel that produces a pulse, applied after calibration
    #[arg(long, default_value_t = 1.0)]
    pub slip: f64,
    /// Calibrate first; the simulated shutter starts closed
    #[arg(long, action = ArgAction::SetTrue)]
    pub calibrate: bool,
    /// Report the window as open before moving
    #[arg(long, action = ArgAction::SetTrue)]
    pub window_open: bool,
    /// Positions to visit in order, in percent closed
    #[arg(long = "move", value_name = "PERCENT")]
    pub moves: Vec<u8>,
    /// Full open/close cycles to run after the moves
    #[arg(long, default_value_t = 0)]
    pub cycles: u32,
    /// Keep state in the configured state file instead of memory
    #[arg(long, action = ArgAction::SetTrue)]
    pub persist: bool,
    /// Give up on a step after this much simulated time
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub step_timeout_s: u64,
}
