//! Runtime configuration for the shutter engine.
//!
//! These are the structs consumed by `MotionController`. They are separate
//! from the TOML-deserialized config in `shutter_config`; see `conversions`.

/// Button and direction-sensing timing.
#[derive(Debug, Clone, Copy)]
pub struct TimingCfg {
    /// How long a simulated press holds the line asserted.
    pub button_press_ms: u64,
    /// Quiet period after a release before the next press is accepted.
    pub button_cooldown_ms: u64,
    /// Grace period after a motor start before an observed stop is trusted.
    pub min_run_ms: u64,
    /// Consecutive identical line samples before a direction is promoted.
    pub direction_stable_ticks: u8,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            button_press_ms: 300,
            button_cooldown_ms: 500,
            min_run_ms: 1000,
            direction_stable_ticks: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationCfg {
    /// Global limit for both traversal phases.
    pub timeout_ms: u64,
    /// Non-blocking pause at each end before the next phase starts.
    pub settle_ms: u64,
    /// Accepted up/down mismatch, percent of the up count.
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

#[derive(Debug, Clone, Copy)]
pub struct DriftCfg {
    pub correction_pct: f32,
    pub warning_pct: f32,
    /// Completed bottom arrivals required before an evaluation.
    pub min_cycles: u32,
    /// Bottom samples required before an evaluation.
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
            min_samples: crate::drift::HISTORY_CAPACITY,
            plausibility_pct: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
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

/// Rate limit for position writes while the shutter moves.
#[derive(Debug, Clone, Copy)]
pub struct PersistCfg {
    pub min_interval_ms: u64,
    pub min_pulses: u32,
}

impl Default for PersistCfg {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            min_pulses: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MotionCfg {
    /// Swap which button means "up". Overridden by the persisted value.
    pub direction_inverted: bool,
    pub limit_overrun_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            direction_inverted: false,
            limit_overrun_ms: 10_000,
        }
    }
}

/// What a downward move does while the window is reported open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowOpenLogic {
    Disabled,
    #[default]
    BlockDownward,
    OpenFully,
    VentilationPosition,
}

impl WindowOpenLogic {
    /// Stable code used in the persisted state.
    pub fn code(self) -> i32 {
        match self {
            Self::Disabled => 0,
            Self::BlockDownward => 1,
            Self::OpenFully => 2,
            Self::VentilationPosition => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Disabled),
            1 => Some(Self::BlockDownward),
            2 => Some(Self::OpenFully),
            3 => Some(Self::VentilationPosition),
            _ => None,
        }
    }

    /// Name as written in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::BlockDownward => "block_downward",
            Self::OpenFully => "open_fully",
            Self::VentilationPosition => "ventilation_position",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        [
            Self::Disabled,
            Self::BlockDownward,
            Self::OpenFully,
            Self::VentilationPosition,
        ]
        .into_iter()
        .find(|l| l.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowCfg {
    /// Overridden by the persisted value.
    pub logic: WindowOpenLogic,
    pub ventilation_percent: u8,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            logic: WindowOpenLogic::BlockDownward,
            ventilation_percent: 15,
        }
    }
}

/// All runtime sections together.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutterCfg {
    pub timing: TimingCfg,
    pub calibration: CalibrationCfg,
    pub drift: DriftCfg,
    pub throttle: ThrottleCfg,
    pub persist: PersistCfg,
    pub motion: MotionCfg,
    pub window: WindowCfg,
}
