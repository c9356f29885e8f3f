#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the roller-shutter controller.
//!
//! `Config` and its sections are deserialized from TOML and validated by
//! `Config::validate`. Only `[pins]` is mandatory; every other section falls
//! back to defaults tuned for a typical belt-driven shutter motor.
use serde::Deserialize;

/// Number of slots in each drift history ring buffer.
pub const DRIFT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    /// Motion pulse input (edge-triggered interrupt).
    pub pulse_counter: u8,
    /// Motor driver "driving up" status line.
    pub motor_up: u8,
    /// Motor driver "driving down" status line.
    pub motor_down: u8,
    /// Simulated "up" push button output.
    pub button_up: u8,
    /// Simulated "down" push button output.
    pub button_down: u8,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Lines {
    /// Status lines read low while the driver powers the motor.
    pub status_active_low: bool,
    /// Button outputs are pulled low to emulate a press.
    pub button_active_low: bool,
}

impl Default for Lines {
    fn default() -> Self {
        Self {
            status_active_low: true,
            button_active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timing {
    pub button_press_ms: u64,
    pub button_cooldown_ms: u64,
    /// Grace period after a motor start before "stopped" is trusted.
    pub min_run_ms: u64,
    /// Consecutive identical samples before a direction change is accepted.
    pub direction_stable_ticks: u8,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            button_press_ms: 300,
            button_cooldown_ms: 500,
            min_run_ms: 1000,
            direction_stable_ticks: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CalibrationCfg {
    pub timeout_ms: u64,
    /// Pause between the end of one traversal and the start of the next.
    pub settle_ms: u64,
    /// Max allowed up/down pulse mismatch, in percent of the up count.
    pub tolerance_pct: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 90_000,
            settle_ms: 1000,
            tolerance_pct: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DriftCfg {
    pub correction_pct: f32,
    pub warning_pct: f32,
    pub min_cycles: u32,
    pub min_samples: usize,
    /// Limit samples further than this from the expected end are discarded.
    pub plausibility_pct: f32,
}

impl Default for DriftCfg {
    fn default() -> Self {
        Self {
            correction_pct: 10.0,
            warning_pct: 3.0,
            min_cycles: 10,
            min_samples: DRIFT_HISTORY_CAPACITY,
            plausibility_pct: 15.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ThrottleCfg {
    pub moving_interval_ms: u64,
    pub moving_hysteresis_pct: u8,
    pub idle_hysteresis_pct: u8,
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        Self {
            moving_interval_ms: 500,
            moving_hysteresis_pct: 2,
            idle_hysteresis_pct: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Persistence {
    /// State file used by the file-backed store.
    pub path: String,
    pub min_interval_ms: u64,
    pub min_pulses: u32,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            path: "var/shutter_state.toml".to_string(),
            min_interval_ms: 1000,
            min_pulses: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowLogic {
    Disabled,
    #[default]
    BlockDownward,
    OpenFully,
    VentilationPosition,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Window {
    pub logic: WindowLogic,
    pub ventilation_percent: u8,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            logic: WindowLogic::BlockDownward,
            ventilation_percent: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Motion {
    pub direction_inverted: bool,
    /// How long an end-position move may keep running past the counted end
    /// before it is stopped explicitly.
    pub limit_overrun_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            direction_inverted: false,
            limit_overrun_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RunnerCfg {
    pub tick_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub lines: Lines,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub drift: DriftCfg,
    #[serde(default)]
    pub throttle: ThrottleCfg,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default)]
    pub window: Window,
    #[serde(default)]
    pub motion: Motion,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        let all = [
            p.pulse_counter,
            p.motor_up,
            p.motor_down,
            p.button_up,
            p.button_down,
        ];
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                eyre::bail!("pins must be distinct (pin {a} used twice)");
            }
        }

        // Timing
        if self.timing.button_press_ms == 0 {
            eyre::bail!("timing.button_press_ms must be >= 1");
        }
        if self.timing.direction_stable_ticks == 0 {
            eyre::bail!("timing.direction_stable_ticks must be >= 1");
        }
        if self.timing.min_run_ms > 60_000 {
            eyre::bail!("timing.min_run_ms is unreasonably large (>60s)");
        }

        // Calibration
        if self.calibration.timeout_ms == 0 {
            eyre::bail!("calibration.timeout_ms must be >= 1");
        }
        if self.calibration.settle_ms >= self.calibration.timeout_ms {
            eyre::bail!("calibration.settle_ms must be below calibration.timeout_ms");
        }
        let tol = self.calibration.tolerance_pct;
        if !(tol > 0.0 && tol <= 50.0) {
            eyre::bail!("calibration.tolerance_pct must be in (0.0, 50.0]");
        }

        // Drift
        let d = &self.drift;
        if !(d.warning_pct > 0.0 && d.warning_pct < d.correction_pct) {
            eyre::bail!("drift.warning_pct must be > 0 and below drift.correction_pct");
        }
        if d.correction_pct > 100.0 {
            eyre::bail!("drift.correction_pct must be <= 100");
        }
        if d.plausibility_pct <= d.correction_pct {
            eyre::bail!("drift.plausibility_pct must exceed drift.correction_pct");
        }
        if d.min_samples == 0 || d.min_samples > DRIFT_HISTORY_CAPACITY {
            eyre::bail!("drift.min_samples must be in [1, {DRIFT_HISTORY_CAPACITY}]");
        }
        if d.min_cycles == 0 {
            eyre::bail!("drift.min_cycles must be >= 1");
        }

        // Throttle
        if self.throttle.moving_hysteresis_pct > 100 || self.throttle.idle_hysteresis_pct > 100 {
            eyre::bail!("throttle hysteresis must be <= 100 percentage points");
        }

        // Persistence
        if self.persistence.path.trim().is_empty() {
            eyre::bail!("persistence.path must not be empty");
        }

        // Window
        if self.window.ventilation_percent > 100 {
            eyre::bail!("window.ventilation_percent must be in [0, 100]");
        }

        // Runner
        if self.runner.tick_ms == 0 {
            eyre::bail!("runner.tick_ms must be >= 1");
        }
        if self.runner.tick_ms > 1000 {
            eyre::bail!("runner.tick_ms is unreasonably large (>1s)");
        }

        Ok(())
    }
}
