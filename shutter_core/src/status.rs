//! Motion states and the typed outcomes of controller requests.

use crate::direction::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Stopped,
    MovingUp,
    MovingDown,
    CalibratingUp,
    CalibratingDown,
    CalibratingValidation,
}

impl MotionState {
    pub fn is_moving(self) -> bool {
        matches!(self, Self::MovingUp | Self::MovingDown)
    }

    pub fn is_calibrating(self) -> bool {
        matches!(
            self,
            Self::CalibratingUp | Self::CalibratingDown | Self::CalibratingValidation
        )
    }

    /// Motor action this state asks for.
    pub fn desired_action(self) -> Direction {
        match self {
            Self::MovingUp | Self::CalibratingUp => Direction::Up,
            Self::MovingDown | Self::CalibratingDown => Direction::Down,
            Self::Stopped | Self::CalibratingValidation => Direction::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::MovingUp => "moving_up",
            Self::MovingDown => "moving_down",
            Self::CalibratingUp => "calibrating_up",
            Self::CalibratingDown => "calibrating_down",
            Self::CalibratingValidation => "calibrating_validation",
        }
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    NotCalibrated,
    /// Downward move refused by `WindowOpenLogic::BlockDownward`.
    WindowOpen,
}

/// Result of `move_to_percent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Started { target_pulses: i32, target_percent: u8 },
    AlreadyAtTarget,
    Rejected(MoveRejection),
}

/// Result of `start_calibration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationRequest {
    Started,
    /// Calibration only starts from `MotionState::Stopped`.
    Busy(MotionState),
}
