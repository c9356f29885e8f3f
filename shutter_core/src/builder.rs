//! Type-state builder for `MotionController`.
//!
//! `build()` only exists once line I/O has been provided; the store defaults
//! to `NullStore` and the clock to `MonotonicClock`.

use std::sync::Arc;

use shutter_traits::clock::{Clock, MonotonicClock};
use shutter_traits::{KeyValueStore, ShutterIo};

use crate::button::ButtonActuator;
use crate::config::*;
use crate::controller::{Callbacks, MotionController};
use crate::direction::{Direction, DirectionSensor};
use crate::drift::{DriftMonitor, HISTORY_CAPACITY};
use crate::error::{BuildError, Result};
use crate::mocks::NullStore;
use crate::persist::{self, WriteLimiter};
use crate::pulse::PulseCounter;
use crate::status::MotionState;
use crate::throttle::UpdateThrottle;

/// Placeholder for a builder slot that has not been filled.
pub struct Missing;

pub struct ShutterBuilder<I = Missing, K = NullStore> {
    io: I,
    store: K,
    cfg: ShutterCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    pulses: Option<PulseCounter>,
    callbacks: Callbacks,
}

impl Default for ShutterBuilder<Missing, NullStore> {
    fn default() -> Self {
        Self {
            io: Missing,
            store: NullStore,
            cfg: ShutterCfg::default(),
            clock: None,
            pulses: None,
            callbacks: Callbacks::default(),
        }
    }
}

impl MotionController<Missing, NullStore> {
    /// Start building a controller.
    pub fn builder() -> ShutterBuilder<Missing, NullStore> {
        ShutterBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &ShutterCfg) -> Result<()> {
    if cfg.timing.button_press_ms == 0 {
        return Err(invalid("button_press_ms must be >= 1"));
    }
    if cfg.timing.direction_stable_ticks == 0 {
        return Err(invalid("direction_stable_ticks must be >= 1"));
    }
    if cfg.calibration.timeout_ms == 0 {
        return Err(invalid("calibration timeout_ms must be >= 1"));
    }
    let tol = cfg.calibration.tolerance_pct;
    if !(tol > 0.0 && tol <= 50.0) {
        return Err(invalid("calibration tolerance_pct must be in (0, 50]"));
    }
    let d = &cfg.drift;
    if !(d.warning_pct > 0.0 && d.warning_pct < d.correction_pct) {
        return Err(invalid("drift warning_pct must be > 0 and below correction_pct"));
    }
    if d.plausibility_pct <= d.correction_pct {
        return Err(invalid("drift plausibility_pct must exceed correction_pct"));
    }
    if d.min_samples == 0 || d.min_samples > HISTORY_CAPACITY {
        return Err(invalid("drift min_samples must be within the history capacity"));
    }
    if d.min_cycles == 0 {
        return Err(invalid("drift min_cycles must be >= 1"));
    }
    if cfg.window.ventilation_percent > 100 {
        return Err(invalid("ventilation_percent must be <= 100"));
    }
    Ok(())
}

/// Chainable setters that do not affect type-state.
impl<I, K> ShutterBuilder<I, K> {
    pub fn with_config(mut self, cfg: ShutterCfg) -> Self {
        self.cfg = cfg;
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.cfg.timing = timing;
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.cfg.calibration = calibration;
        self
    }
    pub fn with_drift(mut self, drift: DriftCfg) -> Self {
        self.cfg.drift = drift;
        self
    }
    pub fn with_throttle(mut self, throttle: ThrottleCfg) -> Self {
        self.cfg.throttle = throttle;
        self
    }
    pub fn with_persist(mut self, persist: PersistCfg) -> Self {
        self.cfg.persist = persist;
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.cfg.motion = motion;
        self
    }
    pub fn with_window(mut self, window: WindowCfg) -> Self {
        self.cfg.window = window;
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Use a counter whose handle is already wired to the edge interrupt.
    pub fn with_pulse_counter(mut self, pulses: PulseCounter) -> Self {
        self.pulses = Some(pulses);
        self
    }
    pub fn on_calibration<F>(mut self, f: F) -> Self
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.callbacks.calibration = Some(Box::new(f));
        self
    }
    pub fn on_position<F>(mut self, f: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.callbacks.position = Some(Box::new(f));
        self
    }
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(MotionState) + Send + 'static,
    {
        self.callbacks.state = Some(Box::new(f));
        self
    }

    /// Line I/O towards the motor controller.
    pub fn with_io<J: ShutterIo>(self, io: J) -> ShutterBuilder<J, K> {
        ShutterBuilder {
            io,
            store: self.store,
            cfg: self.cfg,
            clock: self.clock,
            pulses: self.pulses,
            callbacks: self.callbacks,
        }
    }

    /// Persistent state; replaces the default `NullStore`.
    pub fn with_store<S: KeyValueStore>(self, store: S) -> ShutterBuilder<I, S> {
        ShutterBuilder {
            io: self.io,
            store,
            cfg: self.cfg,
            clock: self.clock,
            pulses: self.pulses,
            callbacks: self.callbacks,
        }
    }
}

impl<I: ShutterIo, K: KeyValueStore> ShutterBuilder<I, K> {
    /// Validate, restore persisted state and arm the pulse counter.
    pub fn build(self) -> Result<MotionController<I, K>> {
        validate(&self.cfg)?;
        let mut cfg = self.cfg;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        let saved = persist::load(&self.store);
        let direction_inverted = saved
            .direction_inverted
            .unwrap_or(cfg.motion.direction_inverted);
        let window_logic = saved.window_logic.unwrap_or(cfg.window.logic);
        cfg.motion.direction_inverted = direction_inverted;
        cfg.window.logic = window_logic;

        let drift = DriftMonitor::restore(cfg.drift, saved.top, saved.bottom, saved.full_cycles);
        let pulses = self.pulses.unwrap_or_default();

        tracing::info!(
            calibrated = saved.calibrated(),
            max_pulses = saved.max_count,
            current = saved.current,
            direction_inverted,
            ?window_logic,
            "controller ready"
        );

        let controller = MotionController {
            io: self.io,
            store: self.store,
            clock,
            epoch,
            sensor: DirectionSensor::new(cfg.timing.direction_stable_ticks),
            button: ButtonActuator::new(cfg.timing.button_press_ms, cfg.timing.button_cooldown_ms),
            drift,
            throttle: UpdateThrottle::new(cfg.throttle),
            limiter: WriteLimiter::new(
                cfg.persist.min_interval_ms,
                cfg.persist.min_pulses,
                saved.current,
            ),
            current: saved.current,
            max: saved.max_count,
            target: None,
            calibrated: saved.calibrated(),
            state: MotionState::Stopped,
            notified_state: MotionState::Stopped,
            applied: Direction::Stopped,
            motor_start_ms: 0,
            session: None,
            end_reached_ms: None,
            direction_inverted,
            window_logic,
            window_open: false,
            callbacks: self.callbacks,
            pulses,
            cfg,
        };
        controller.pulses.set_ready(true);
        Ok(controller)
    }
}
