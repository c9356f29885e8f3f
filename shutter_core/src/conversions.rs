//! `From` implementations bridging `shutter_config` types to `shutter_core` types.

use crate::config::{
    CalibrationCfg, DriftCfg, MotionCfg, PersistCfg, ShutterCfg, ThrottleCfg, TimingCfg,
    WindowCfg, WindowOpenLogic,
};

impl From<&shutter_config::Timing> for TimingCfg {
    fn from(c: &shutter_config::Timing) -> Self {
        Self {
            button_press_ms: c.button_press_ms,
            button_cooldown_ms: c.button_cooldown_ms,
            min_run_ms: c.min_run_ms,
            direction_stable_ticks: c.direction_stable_ticks,
        }
    }
}

impl From<&shutter_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &shutter_config::CalibrationCfg) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            settle_ms: c.settle_ms,
            tolerance_pct: c.tolerance_pct,
        }
    }
}

impl From<&shutter_config::DriftCfg> for DriftCfg {
    fn from(c: &shutter_config::DriftCfg) -> Self {
        Self {
            correction_pct: c.correction_pct,
            warning_pct: c.warning_pct,
            min_cycles: c.min_cycles,
            min_samples: c.min_samples,
            plausibility_pct: c.plausibility_pct,
        }
    }
}

impl From<&shutter_config::ThrottleCfg> for ThrottleCfg {
    fn from(c: &shutter_config::ThrottleCfg) -> Self {
        Self {
            moving_interval_ms: c.moving_interval_ms,
            moving_hysteresis_pct: c.moving_hysteresis_pct,
            idle_hysteresis_pct: c.idle_hysteresis_pct,
        }
    }
}

impl From<&shutter_config::Persistence> for PersistCfg {
    fn from(c: &shutter_config::Persistence) -> Self {
        Self {
            min_interval_ms: c.min_interval_ms,
            min_pulses: c.min_pulses,
        }
    }
}

impl From<&shutter_config::Motion> for MotionCfg {
    fn from(c: &shutter_config::Motion) -> Self {
        Self {
            direction_inverted: c.direction_inverted,
            limit_overrun_ms: c.limit_overrun_ms,
        }
    }
}

impl From<shutter_config::WindowLogic> for WindowOpenLogic {
    fn from(c: shutter_config::WindowLogic) -> Self {
        match c {
            shutter_config::WindowLogic::Disabled => Self::Disabled,
            shutter_config::WindowLogic::BlockDownward => Self::BlockDownward,
            shutter_config::WindowLogic::OpenFully => Self::OpenFully,
            shutter_config::WindowLogic::VentilationPosition => Self::VentilationPosition,
        }
    }
}

impl From<&shutter_config::Window> for WindowCfg {
    fn from(c: &shutter_config::Window) -> Self {
        Self {
            logic: c.logic.into(),
            ventilation_percent: c.ventilation_percent,
        }
    }
}

impl From<&shutter_config::Config> for ShutterCfg {
    fn from(c: &shutter_config::Config) -> Self {
        Self {
            timing: (&c.timing).into(),
            calibration: (&c.calibration).into(),
            drift: (&c.drift).into(),
            throttle: (&c.throttle).into(),
            persist: (&c.persistence).into(),
            motion: (&c.motion).into(),
            window: (&c.window).into(),
        }
    }
}
