//! Physical model of a belt-driven roller shutter behind a two-button motor controller.
//!
//! The model is deliberately mechanical: a press edge on either button starts
//! the motor when idle and stops it when moving, the belt travels at a fixed
//! pulse rate, and the mechanical limits stop the motor by themselves. Pulses
//! are delivered through the registered edge callback exactly like a GPIO
//! interrupt would deliver them, optionally thinned by a slip factor.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shutter_traits::{BoxError, Button, MotorLines, ShutterIo};

use crate::error::HwError;

/// Tunables of the simulated installation.
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Real distance between the two mechanical limits, in pulses.
    pub travel_pulses: u32,
    /// Belt speed.
    pub pulses_per_sec: f64,
    /// Fraction of travelled pulses that reach the counter (1.0 = no slip).
    pub slip: f64,
    /// Starting position, in pulses from the top limit.
    pub start_position: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            travel_pulses: 10_000,
            pulses_per_sec: 400.0,
            slip: 1.0,
            start_position: 0,
        }
    }
}

/// What the simulated motor is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMotion {
    Idle,
    Up,
    Down,
}

struct SimState {
    params: SimParams,
    position: f64,
    motion: SimMotion,
    pressed_up: bool,
    pressed_down: bool,
    carry: f64,
    emitted: u64,
    presses: u64,
    on_pulse: Option<Box<dyn FnMut() + Send>>,
}

impl SimState {
    fn toggle(&mut self, button: Button) {
        self.presses = self.presses.saturating_add(1);
        let travel = f64::from(self.params.travel_pulses);
        self.motion = match (self.motion, button) {
            (SimMotion::Idle, Button::Up) if self.position > 0.0 => SimMotion::Up,
            (SimMotion::Idle, Button::Down) if self.position < travel => SimMotion::Down,
            (SimMotion::Idle, _) => SimMotion::Idle,
            // Any press while the motor runs halts it.
            (_, _) => SimMotion::Idle,
        };
        tracing::trace!(?button, motion = ?self.motion, "sim button edge");
    }

    fn advance(&mut self, dt: Duration) {
        let sign = match self.motion {
            SimMotion::Idle => return,
            SimMotion::Up => -1.0,
            SimMotion::Down => 1.0,
        };
        let travel = f64::from(self.params.travel_pulses);
        let step = self.params.pulses_per_sec * dt.as_secs_f64();
        let next = (self.position + sign * step).clamp(0.0, travel);
        let moved = (next - self.position).abs();
        self.position = next;
        if next <= 0.0 || next >= travel {
            self.motion = SimMotion::Idle;
        }

        self.carry += moved * self.params.slip.clamp(0.0, 1.0);
        while self.carry >= 1.0 {
            self.carry -= 1.0;
            self.emitted = self.emitted.saturating_add(1);
            if let Some(cb) = self.on_pulse.as_mut() {
                cb();
            }
        }
    }
}

/// Shared handle to the simulated installation.
#[derive(Clone)]
pub struct SimulatedShutter {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedShutter {
    pub fn new(params: SimParams) -> Self {
        let position = f64::from(params.start_position.min(params.travel_pulses));
        Self {
            state: Arc::new(Mutex::new(SimState {
                params,
                position,
                motion: SimMotion::Idle,
                pressed_up: false,
                pressed_down: false,
                carry: 0.0,
                emitted: 0,
                presses: 0,
                on_pulse: None,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Line I/O view handed to the controller.
    pub fn io(&self) -> SimulatedIo {
        SimulatedIo {
            state: Arc::clone(&self.state),
        }
    }

    /// Register the pulse "interrupt" handler.
    pub fn attach_pulse_interrupt(&self, on_edge: impl FnMut() + Send + 'static) {
        self.with(|s| s.on_pulse = Some(Box::new(on_edge)));
    }

    /// Let simulated time pass.
    pub fn advance(&self, dt: Duration) {
        self.with(|s| s.advance(dt));
    }

    /// A person pressing the physical wall switch.
    pub fn press_wall_button(&self, button: Button) {
        self.with(|s| s.toggle(button));
    }

    pub fn set_slip(&self, slip: f64) {
        self.with(|s| s.params.slip = slip);
    }

    pub fn motion(&self) -> SimMotion {
        self.with(|s| s.motion)
    }

    /// Physical position in pulses from the top limit.
    pub fn position(&self) -> f64 {
        self.with(|s| s.position)
    }

    /// Physical position as 0 (open) ..= 100 (closed).
    pub fn percent(&self) -> f64 {
        self.with(|s| {
            let travel = f64::from(s.params.travel_pulses.max(1));
            s.position / travel * 100.0
        })
    }

    pub fn emitted_pulses(&self) -> u64 {
        self.with(|s| s.emitted)
    }

    /// Number of press edges seen on either button (controller and wall).
    pub fn press_count(&self) -> u64 {
        self.with(|s| s.presses)
    }
}

/// `ShutterIo` implementation backed by the simulation.
pub struct SimulatedIo {
    state: Arc<Mutex<SimState>>,
}

impl ShutterIo for SimulatedIo {
    fn motor_lines(&mut self) -> Result<MotorLines, BoxError> {
        let s = self.state.lock().map_err(|_| HwError::Poisoned)?;
        Ok(MotorLines {
            driving_up: s.motion == SimMotion::Up,
            driving_down: s.motion == SimMotion::Down,
        })
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> Result<(), BoxError> {
        let mut s = self.state.lock().map_err(|_| HwError::Poisoned)?;
        let was = match button {
            Button::Up => std::mem::replace(&mut s.pressed_up, pressed),
            Button::Down => std::mem::replace(&mut s.pressed_down, pressed),
        };
        if pressed && !was {
            s.toggle(button);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn sim() -> (SimulatedShutter, Arc<AtomicU32>) {
        let sim = SimulatedShutter::new(SimParams {
            travel_pulses: 1000,
            pulses_per_sec: 100.0,
            slip: 1.0,
            start_position: 0,
        });
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        sim.attach_pulse_interrupt(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        (sim, count)
    }

    #[test]
    fn press_edge_starts_and_second_edge_stops() {
        let (sim, count) = sim();
        let mut io = sim.io();
        io.set_button(Button::Down, true).unwrap();
        // Holding the line is not another edge.
        io.set_button(Button::Down, true).unwrap();
        assert_eq!(sim.motion(), SimMotion::Down);
        sim.advance(Duration::from_secs(2));
        assert_eq!(count.load(Ordering::Relaxed), 200);
        assert!(io.motor_lines().unwrap().driving_down);

        io.set_button(Button::Down, false).unwrap();
        io.set_button(Button::Down, true).unwrap();
        assert_eq!(sim.motion(), SimMotion::Idle);
    }

    #[test]
    fn up_press_at_top_limit_does_nothing() {
        let (sim, _) = sim();
        sim.press_wall_button(Button::Up);
        assert_eq!(sim.motion(), SimMotion::Idle);
    }

    #[test]
    fn limit_stops_motor_and_slip_thins_pulses() {
        let (sim, count) = sim();
        sim.set_slip(0.5);
        sim.press_wall_button(Button::Down);
        sim.advance(Duration::from_secs(30));
        assert_eq!(sim.motion(), SimMotion::Idle);
        assert_eq!(sim.position(), 1000.0);
        assert_eq!(count.load(Ordering::Relaxed), 500);
    }
}
