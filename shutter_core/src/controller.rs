//! The shutter control loop (`MotionController`).
//!
//! One `tick()` drains the pulse counter, debounces the motor lines,
//! attributes the pulses, advances the motion/calibration state machine,
//! resolves the desired motor action into button presses, releases held
//! buttons, persists what changed and finally asks the throttle whether the
//! position should be reported.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use shutter_traits::{Button, Clock, KeyValueStore, ShutterIo};

use crate::button::ButtonActuator;
use crate::calibration::{self, CalibrationSession, CalibrationVerdict};
use crate::config::{ShutterCfg, WindowOpenLogic};
use crate::direction::{Direction, DirectionSensor};
use crate::drift::{DriftMonitor, DriftVerdict};
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::persist::{self, WriteLimiter};
use crate::pulse::{PulseCounter, PulseHandle, PulseStats};
use crate::status::{CalibrationRequest, MotionState, MoveOutcome, MoveRejection};
use crate::throttle::{ThrottleInput, UpdateThrottle};
use crate::util::{percent_to_pulses, pulses_to_percent};

pub type CalibrationCallback = Box<dyn FnMut(bool) + Send>;
pub type PositionCallback = Box<dyn FnMut(u8) + Send>;
pub type StateCallback = Box<dyn FnMut(MotionState) + Send>;

#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) calibration: Option<CalibrationCallback>,
    pub(crate) position: Option<PositionCallback>,
    pub(crate) state: Option<StateCallback>,
}

pub struct MotionController<I, K> {
    pub(crate) io: I,
    pub(crate) store: K,
    pub(crate) cfg: ShutterCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,

    pub(crate) pulses: PulseCounter,
    pub(crate) sensor: DirectionSensor,
    pub(crate) button: ButtonActuator,
    pub(crate) drift: DriftMonitor,
    pub(crate) throttle: UpdateThrottle,
    pub(crate) limiter: WriteLimiter,

    pub(crate) current: i32,
    pub(crate) max: i32,
    pub(crate) target: Option<i32>,
    pub(crate) calibrated: bool,
    pub(crate) state: MotionState,
    pub(crate) notified_state: MotionState,
    /// Last motor action that actually got its press accepted.
    pub(crate) applied: Direction,
    pub(crate) motor_start_ms: u64,
    pub(crate) session: Option<CalibrationSession>,
    /// When the counter first reached an end target during a limit run.
    pub(crate) end_reached_ms: Option<u64>,

    pub(crate) direction_inverted: bool,
    pub(crate) window_logic: WindowOpenLogic,
    pub(crate) window_open: bool,
    pub(crate) callbacks: Callbacks,
}

impl<I: ShutterIo, K: KeyValueStore> core::fmt::Debug for MotionController<I, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("max", &self.max)
            .field("target", &self.target)
            .field("calibrated", &self.calibrated)
            .finish()
    }
}

impl<I: ShutterIo, K: KeyValueStore> MotionController<I, K> {
    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> MotionState {
        self.state
    }
    pub fn current_pulses(&self) -> i32 {
        self.current
    }
    pub fn max_pulses(&self) -> i32 {
        self.max
    }
    /// Pending target in pulses, `None` when idle.
    pub fn target_pulses(&self) -> Option<i32> {
        self.target
    }
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }
    pub fn current_percent(&self) -> u8 {
        pulses_to_percent(self.current, self.max)
    }
    pub fn actual_direction(&self) -> Direction {
        self.sensor.actual()
    }
    pub fn is_direction_inverted(&self) -> bool {
        self.direction_inverted
    }
    pub fn window_open_logic(&self) -> WindowOpenLogic {
        self.window_logic
    }
    pub fn is_window_open(&self) -> bool {
        self.window_open
    }
    pub fn calibration_session(&self) -> Option<&CalibrationSession> {
        self.session.as_ref()
    }
    pub fn drift(&self) -> &DriftMonitor {
        &self.drift
    }
    pub fn pulse_stats(&self) -> PulseStats {
        self.pulses.stats()
    }
    /// Producer side of the pulse counter, for the edge interrupt.
    pub fn pulse_handle(&self) -> PulseHandle {
        self.pulses.handle()
    }
    pub fn config(&self) -> &ShutterCfg {
        &self.cfg
    }
    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }
    pub fn io(&self) -> &I {
        &self.io
    }
    pub fn store(&self) -> &K {
        &self.store
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Physical button for a motor direction.
    pub fn button_for(&self, direction: Direction) -> Option<Button> {
        let (up, down) = if self.direction_inverted {
            (Button::Down, Button::Up)
        } else {
            (Button::Up, Button::Down)
        };
        match direction {
            Direction::Up => Some(up),
            Direction::Down => Some(down),
            Direction::Stopped => None,
        }
    }

    // ── Control loop ─────────────────────────────────────────────────────────

    /// One control-loop iteration. Returns the percentage when a position
    /// report was emitted.
    pub fn tick(&mut self) -> Result<Option<u8>> {
        let now = self.now_ms();
        let pulses = self.pulses.drain();
        let lines = self
            .io
            .motor_lines()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading motor lines")?;
        let actual = self.sensor.update(lines);

        if pulses > 0 {
            self.attribute_pulses(pulses, actual);
        }
        self.step_state_machine(now, actual);
        self.apply_motor_action(now, actual)?;
        self.button.poll(&mut self.io, now)?;
        self.persist_step(now, actual);
        self.notify_state();
        Ok(self.maybe_report(now, actual))
    }

    fn attribute_pulses(&mut self, pulses: u32, actual: Direction) {
        match self.state {
            MotionState::CalibratingUp => {
                if let Some(s) = self.session.as_mut() {
                    s.up_pulses = s.up_pulses.saturating_add(pulses);
                }
            }
            MotionState::CalibratingDown => {
                if let Some(s) = self.session.as_mut() {
                    s.down_pulses = s.down_pulses.saturating_add(pulses);
                }
            }
            MotionState::MovingUp | MotionState::MovingDown => {
                self.shift_position(self.state.desired_action(), pulses);
            }
            MotionState::Stopped if actual != Direction::Stopped => {
                self.shift_position(actual, pulses);
            }
            _ => {
                tracing::warn!(pulses, state = %self.state, "spurious pulses discarded");
            }
        }
    }

    fn shift_position(&mut self, direction: Direction, pulses: u32) {
        let n = i32::try_from(pulses).unwrap_or(i32::MAX);
        let next = match direction {
            Direction::Down => self.current.saturating_add(n),
            Direction::Up => self.current.saturating_sub(n).max(0),
            Direction::Stopped => return,
        };
        self.current = if self.calibrated {
            next.clamp(0, self.max)
        } else {
            next.max(0)
        };
        self.throttle.mark_changed();
    }

    fn step_state_machine(&mut self, now: u64, actual: Direction) {
        if matches!(
            self.state,
            MotionState::CalibratingUp | MotionState::CalibratingDown
        ) {
            let started = self.session.map_or(now, |s| s.start_ms);
            let elapsed = now.saturating_sub(started);
            if elapsed > self.cfg.calibration.timeout_ms {
                tracing::error!(elapsed_ms = elapsed, "calibration timed out");
                self.abort_calibration(now);
                return;
            }
        }

        match self.state {
            MotionState::Stopped => {
                if let Some(target) = self.target {
                    let delta = target - self.current;
                    if delta.abs() > 1 {
                        self.state = if delta > 0 {
                            MotionState::MovingDown
                        } else {
                            MotionState::MovingUp
                        };
                        self.end_reached_ms = None;
                        tracing::info!(target, current = self.current, "move started");
                    } else {
                        self.target = None;
                    }
                }
            }
            MotionState::MovingUp | MotionState::MovingDown => self.step_moving(now, actual),
            MotionState::CalibratingUp => self.step_calibrating(now, actual, Direction::Up),
            MotionState::CalibratingDown => self.step_calibrating(now, actual, Direction::Down),
            MotionState::CalibratingValidation => self.finish_calibration(now),
        }
    }

    fn step_moving(&mut self, now: u64, actual: Direction) {
        let Some(target) = self.target else {
            self.state = MotionState::Stopped;
            return;
        };
        let desired = self.state.desired_action();
        let end_target = target == 0 || target == self.max;

        let running_for = now.saturating_sub(self.motor_start_ms);
        if actual == Direction::Stopped
            && self.applied == desired
            && running_for > self.cfg.timing.min_run_ms
        {
            // A self-stop is a limit arrival only once the counter got to the
            // end, or when it stopped close enough to it to be counted drift.
            let counted_to_end = self.end_reached_ms.take().is_some();
            if end_target
                && (counted_to_end || self.drift.is_plausible(self.current, target, self.max))
            {
                self.limit_arrival(now, target == self.max);
            } else {
                tracing::warn!(
                    current = self.current,
                    target,
                    running_ms = running_for,
                    "motor stopped unexpectedly, target cleared"
                );
                self.target = None;
                self.state = MotionState::Stopped;
            }
            return;
        }

        let reached = match desired {
            Direction::Down => self.current >= target,
            _ => self.current <= target,
        };
        if !reached {
            return;
        }
        if end_target {
            // Let the motor run into its limit; the self-stop re-homes.
            let since = *self.end_reached_ms.get_or_insert(now);
            if now.saturating_sub(since) < self.cfg.motion.limit_overrun_ms {
                return;
            }
            tracing::warn!(target, "limit not detected in time, stopping");
        } else {
            tracing::info!(target, current = self.current, "target reached");
        }
        self.end_reached_ms = None;
        self.target = None;
        self.state = MotionState::Stopped;
    }

    fn limit_arrival(&mut self, now: u64, bottom: bool) {
        let sample = self.current;
        if bottom {
            if let DriftVerdict::Corrected { corrected, .. } =
                self.drift.record_bottom(sample, self.max)
            {
                if corrected > 0 {
                    self.max = corrected;
                }
            }
            self.current = self.max;
        } else {
            self.drift.record_top(sample);
            self.current = 0;
        }
        tracing::info!(
            sample,
            limit = if bottom { "bottom" } else { "top" },
            rehomed = self.current,
            "limit reached"
        );
        self.target = None;
        self.state = MotionState::Stopped;
        self.throttle.mark_changed();
        persist::save_drift(&mut self.store, &self.drift);
        self.save_position(now);
    }

    fn step_calibrating(&mut self, now: u64, actual: Direction, phase: Direction) {
        let min_run = self.cfg.timing.min_run_ms;
        let settle_ms = self.cfg.calibration.settle_ms;
        let limit_hit = actual == Direction::Stopped
            && self.applied == phase
            && now.saturating_sub(self.motor_start_ms) > min_run;

        let Some(session) = self.session.as_mut() else {
            self.state = MotionState::Stopped;
            return;
        };

        if let Some(until) = session.settle_until_ms {
            if now >= until {
                session.settle_until_ms = None;
                self.state = match phase {
                    Direction::Up => MotionState::CalibratingDown,
                    _ => MotionState::CalibratingValidation,
                };
            }
            return;
        }

        if limit_hit {
            session.settle_until_ms = Some(now.saturating_add(settle_ms));
            let counted = match phase {
                Direction::Up => session.up_pulses,
                _ => session.down_pulses,
            };
            tracing::info!(phase = phase.as_str(), pulses = counted, "calibration limit reached");
            if phase == Direction::Up {
                self.current = 0;
                self.throttle.mark_changed();
            }
        }
    }

    fn finish_calibration(&mut self, now: u64) {
        let session = self.session.take().unwrap_or_default();
        let (up, down) = (session.up_pulses, session.down_pulses);
        let tolerance = self.cfg.calibration.tolerance_pct;
        let success = match calibration::validate(up, down, tolerance) {
            CalibrationVerdict::Accepted {
                max_pulses,
                diff_pct,
            } => {
                self.max = max_pulses;
                self.current = max_pulses;
                self.calibrated = true;
                self.drift.reset();
                tracing::info!(up, down, diff_pct, max_pulses, "calibration accepted");
                persist::save_drift(&mut self.store, &self.drift);
                self.save_position(now);
                true
            }
            CalibrationVerdict::Rejected { diff_pct } => {
                self.calibrated = false;
                tracing::error!(
                    up,
                    down,
                    diff_pct,
                    tolerance_pct = tolerance,
                    "calibration rejected"
                );
                self.save_position(now);
                false
            }
        };
        self.target = None;
        self.state = MotionState::Stopped;
        self.throttle.mark_changed();
        self.fire_calibration(success);
    }

    fn abort_calibration(&mut self, now: u64) {
        self.session = None;
        self.calibrated = false;
        self.target = None;
        self.state = MotionState::Stopped;
        self.save_position(now);
        self.fire_calibration(false);
    }

    fn fire_calibration(&mut self, success: bool) {
        if let Some(cb) = self.callbacks.calibration.as_mut() {
            cb(success);
        }
    }

    fn apply_motor_action(&mut self, now: u64, actual: Direction) -> Result<()> {
        let desired = self.state.desired_action();
        if desired == self.applied {
            return Ok(());
        }
        if desired == Direction::Stopped || self.applied != Direction::Stopped {
            // Stopping, or reversing: halt first, start on a later tick.
            self.stop_path(now, actual)?;
            self.applied = Direction::Stopped;
            return Ok(());
        }
        let Some(button) = self.button_for(desired) else {
            return Ok(());
        };
        if self.button.press(&mut self.io, button, now)? {
            self.applied = desired;
            self.motor_start_ms = now;
            tracing::debug!(direction = desired.as_str(), ?button, "motor start pressed");
        }
        Ok(())
    }

    /// Press the button matching the observed motion. Nothing is pressed when
    /// the motor is idle, since a press would start it. Within the start-up
    /// grace the lines may still read idle after an accepted start press; the
    /// applied direction stands in for them then.
    fn stop_path(&mut self, now: u64, actual: Direction) -> Result<()> {
        let starting = self.applied != Direction::Stopped
            && now.saturating_sub(self.motor_start_ms) <= self.cfg.timing.min_run_ms;
        let running = match actual {
            Direction::Stopped if starting => self.applied,
            observed => observed,
        };
        let Some(button) = self.button_for(running) else {
            tracing::debug!("motor already idle, no stop press");
            return Ok(());
        };
        self.button.force_press(&mut self.io, button, now)?;
        tracing::info!(
            observed = actual.as_str(),
            running = running.as_str(),
            ?button,
            "stop pressed"
        );
        Ok(())
    }

    fn persist_step(&mut self, now: u64, actual: Direction) {
        let in_motion = self.state.is_moving()
            || (self.state == MotionState::Stopped && actual != Direction::Stopped);
        if in_motion {
            if self.limiter.due(now, self.current) {
                self.save_position(now);
            }
        } else if self.state == MotionState::Stopped && self.limiter.differs(self.current) {
            self.save_position(now);
        }
    }

    fn save_position(&mut self, now: u64) {
        persist::save_position(&mut self.store, self.max, self.calibrated, self.current);
        self.limiter.record(now, self.current);
    }

    fn notify_state(&mut self) {
        if self.state == self.notified_state {
            return;
        }
        tracing::info!(from = %self.notified_state, to = %self.state, "state change");
        self.notified_state = self.state;
        if let Some(cb) = self.callbacks.state.as_mut() {
            cb(self.state);
        }
    }

    fn maybe_report(&mut self, now: u64, actual: Direction) -> Option<u8> {
        let percent = self.current_percent();
        let input = ThrottleInput {
            state: self.state,
            target_pending: self.target.is_some(),
            actual,
            percent,
            now_ms: now,
        };
        if !self.throttle.should_send(input) {
            return None;
        }
        self.throttle.mark_sent(now, percent);
        tracing::debug!(percent, "position report");
        if let Some(cb) = self.callbacks.position.as_mut() {
            cb(percent);
        }
        Some(percent)
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Move to `percent` (0 = open, 100 = closed, larger values clamp).
    pub fn move_to_percent(&mut self, percent: u8) -> Result<MoveOutcome> {
        if !self.calibrated {
            tracing::warn!(percent, "move rejected: not calibrated");
            return Ok(MoveOutcome::Rejected(MoveRejection::NotCalibrated));
        }
        let percent = percent.min(100);
        let mut target = percent_to_pulses(percent, self.max);

        if (target - self.current).abs() <= 1 {
            tracing::debug!(target, "already at target");
            self.target = None;
            return Ok(MoveOutcome::AlreadyAtTarget);
        }

        if target > self.current && self.window_open {
            match self.window_logic {
                WindowOpenLogic::Disabled => {}
                WindowOpenLogic::BlockDownward => {
                    tracing::warn!(percent, "move rejected: window open");
                    return Ok(MoveOutcome::Rejected(MoveRejection::WindowOpen));
                }
                WindowOpenLogic::OpenFully => {
                    tracing::info!(requested = percent, "window open, opening fully instead");
                    target = 0;
                }
                WindowOpenLogic::VentilationPosition => {
                    let vent = self.cfg.window.ventilation_percent;
                    tracing::info!(requested = percent, vent, "window open, ventilation position");
                    target = percent_to_pulses(vent, self.max);
                }
            }
            if (target - self.current).abs() <= 1 {
                tracing::debug!(target, "window position already reached");
                self.target = None;
                return Ok(MoveOutcome::AlreadyAtTarget);
            }
        }

        let reverse = match self.state {
            MotionState::MovingDown => target < self.current,
            MotionState::MovingUp => target > self.current,
            _ => false,
        };
        self.target = Some(target);
        self.end_reached_ms = None;
        self.throttle.mark_changed();
        if reverse {
            self.state = MotionState::Stopped;
            let now = self.now_ms();
            let actual = self.sensor.actual();
            self.apply_motor_action(now, actual)?;
            self.notify_state();
        }
        Ok(MoveOutcome::Started {
            target_pulses: target,
            target_percent: pulses_to_percent(target, self.max),
        })
    }

    pub fn open(&mut self) -> Result<MoveOutcome> {
        self.move_to_percent(0)
    }

    pub fn close(&mut self) -> Result<MoveOutcome> {
        self.move_to_percent(100)
    }

    /// Halt any motion and persist the position.
    pub fn stop(&mut self) -> Result<()> {
        let now = self.now_ms();
        let actual = self.sensor.actual();
        if self.state.is_calibrating() {
            tracing::warn!("calibration aborted by stop");
            self.abort_calibration(now);
        }
        if self.state != MotionState::Stopped {
            tracing::info!(state = %self.state, "stop requested");
            self.target = None;
            self.end_reached_ms = None;
            self.state = MotionState::Stopped;
        }
        if self.applied != Direction::Stopped {
            self.apply_motor_action(now, actual)?;
        } else if actual != Direction::Stopped && self.button.is_idle(now) {
            tracing::warn!(observed = actual.as_str(), "motor running while stopped, forcing stop");
            self.target = None;
            self.stop_path(now, actual)?;
        }
        self.save_position(now);
        self.notify_state();
        Ok(())
    }

    pub fn start_calibration(&mut self) -> CalibrationRequest {
        if self.state != MotionState::Stopped {
            tracing::warn!(state = %self.state, "calibration rejected: not stopped");
            return CalibrationRequest::Busy(self.state);
        }
        let now = self.now_ms();
        tracing::info!("calibration started");
        self.calibrated = false;
        self.target = None;
        self.session = Some(CalibrationSession::new(now));
        self.state = MotionState::CalibratingUp;
        self.notify_state();
        CalibrationRequest::Started
    }

    // ── Settings ─────────────────────────────────────────────────────────────

    pub fn set_window_open(&mut self, open: bool) {
        if self.window_open != open {
            tracing::info!(open, "window state");
        }
        self.window_open = open;
    }

    pub fn set_window_open_logic(&mut self, logic: WindowOpenLogic) {
        if self.window_logic == logic {
            return;
        }
        tracing::info!(?logic, "window logic changed");
        self.window_logic = logic;
        persist::save_settings(&mut self.store, self.direction_inverted, self.window_logic);
    }

    pub fn set_direction_inverted(&mut self, inverted: bool) {
        if self.direction_inverted == inverted {
            return;
        }
        tracing::info!(inverted, "direction inversion changed");
        self.direction_inverted = inverted;
        persist::save_settings(&mut self.store, self.direction_inverted, self.window_logic);
    }

    pub fn toggle_direction(&mut self) {
        self.set_direction_inverted(!self.direction_inverted);
    }
}
