//! Timed press/release of the emulated wall buttons.

use eyre::WrapErr;
use shutter_traits::{Button, ShutterIo};

use crate::error::Result;
use crate::hw_error::map_hw_error;

/// The press currently in flight (or the cooldown after it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSession {
    pub active: bool,
    pub button: Option<Button>,
    pub press_start_ms: u64,
    pub cooldown_until_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ButtonActuator {
    press_ms: u64,
    cooldown_ms: u64,
    session: ButtonSession,
}

fn drive<I: ShutterIo + ?Sized>(io: &mut I, button: Button, pressed: bool) -> Result<()> {
    io.set_button(button, pressed)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err(if pressed { "press button" } else { "release button" })
}

impl ButtonActuator {
    pub fn new(press_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            press_ms,
            cooldown_ms,
            session: ButtonSession::default(),
        }
    }

    pub fn session(&self) -> &ButtonSession {
        &self.session
    }

    /// No press held and no cooldown pending.
    pub fn is_idle(&self, now_ms: u64) -> bool {
        !self.session.active && now_ms >= self.session.cooldown_until_ms
    }

    /// Start a press. Returns `false` (and does nothing) while another press
    /// is held or cooling down.
    pub fn press<I: ShutterIo + ?Sized>(
        &mut self,
        io: &mut I,
        button: Button,
        now_ms: u64,
    ) -> Result<bool> {
        if !self.is_idle(now_ms) {
            tracing::debug!(?button, "press rejected: actuator busy");
            return Ok(false);
        }
        drive(io, button, true)?;
        self.session = ButtonSession {
            active: true,
            button: Some(button),
            press_start_ms: now_ms,
            cooldown_until_ms: 0,
        };
        tracing::debug!(?button, "button pressed");
        Ok(true)
    }

    /// Stop priority: cancel any held press or cooldown and press now.
    pub fn force_press<I: ShutterIo + ?Sized>(
        &mut self,
        io: &mut I,
        button: Button,
        now_ms: u64,
    ) -> Result<()> {
        if let (true, Some(held)) = (self.session.active, self.session.button) {
            drive(io, held, false)?;
        }
        self.session = ButtonSession::default();
        if !self.press(io, button, now_ms)? {
            return Err(eyre::Report::new(crate::error::ShutterError::State(
                "forced press rejected".into(),
            )));
        }
        Ok(())
    }

    /// Release the held line once the press duration elapsed.
    pub fn poll<I: ShutterIo + ?Sized>(&mut self, io: &mut I, now_ms: u64) -> Result<()> {
        if !self.session.active {
            return Ok(());
        }
        if now_ms.saturating_sub(self.session.press_start_ms) < self.press_ms {
            return Ok(());
        }
        if let Some(button) = self.session.button {
            drive(io, button, false)?;
            tracing::debug!(?button, "button released");
        }
        self.session.active = false;
        self.session.cooldown_until_ms = now_ms.saturating_add(self.cooldown_ms);
        Ok(())
    }
}
