//! Requests from other threads, marshalled into the control loop.

use shutter_traits::{KeyValueStore, ShutterIo};

use crate::config::WindowOpenLogic;
use crate::controller::MotionController;
use crate::error::Result;
use crate::status::{CalibrationRequest, MoveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveTo(u8),
    Open,
    Close,
    Stop,
    StartCalibration,
    SetWindowOpen(bool),
    SetWindowLogic(WindowOpenLogic),
    SetDirectionInverted(bool),
    ToggleDirection,
}

/// What applying a command produced, for callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Move(MoveOutcome),
    Calibration(CalibrationRequest),
    Done,
}

impl<I: ShutterIo, K: KeyValueStore> MotionController<I, K> {
    pub fn apply(&mut self, command: Command) -> Result<CommandResult> {
        tracing::debug!(?command, "command");
        Ok(match command {
            Command::MoveTo(p) => CommandResult::Move(self.move_to_percent(p)?),
            Command::Open => CommandResult::Move(self.open()?),
            Command::Close => CommandResult::Move(self.close()?),
            Command::Stop => {
                self.stop()?;
                CommandResult::Done
            }
            Command::StartCalibration => CommandResult::Calibration(self.start_calibration()),
            Command::SetWindowOpen(open) => {
                self.set_window_open(open);
                CommandResult::Done
            }
            Command::SetWindowLogic(logic) => {
                self.set_window_open_logic(logic);
                CommandResult::Done
            }
            Command::SetDirectionInverted(inv) => {
                self.set_direction_inverted(inv);
                CommandResult::Done
            }
            Command::ToggleDirection => {
                self.toggle_direction();
                CommandResult::Done
            }
        })
    }
}
