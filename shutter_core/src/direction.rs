//! Debounced motor direction from the two driver status lines.

use shutter_traits::MotorLines;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stopped,
}

impl Direction {
    /// Instantaneous reading. "Down" wins if both lines claim activity.
    pub fn from_lines(lines: MotorLines) -> Self {
        if lines.driving_down {
            Self::Down
        } else if lines.driving_up {
            Self::Up
        } else {
            Self::Stopped
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stopped => "stopped",
        }
    }
}

/// Promotes a reading to the actual direction once it has repeated for
/// `required` further consecutive samples.
#[derive(Debug, Clone)]
pub struct DirectionSensor {
    required: u8,
    last_raw: Direction,
    stable: u8,
    actual: Direction,
}

impl DirectionSensor {
    pub fn new(required: u8) -> Self {
        Self {
            required: required.max(1),
            last_raw: Direction::Stopped,
            stable: 0,
            actual: Direction::Stopped,
        }
    }

    pub fn update(&mut self, lines: MotorLines) -> Direction {
        let raw = Direction::from_lines(lines);
        if raw == self.last_raw {
            if self.stable < self.required {
                self.stable += 1;
            }
        } else {
            self.last_raw = raw;
            self.stable = 0;
        }

        if self.stable >= self.required && self.actual != raw {
            tracing::debug!(from = self.actual.as_str(), to = raw.as_str(), "direction change");
            self.actual = raw;
        }
        self.actual
    }

    pub fn actual(&self) -> Direction {
        self.actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWN: MotorLines = MotorLines {
        driving_up: false,
        driving_down: true,
    };
    const IDLE: MotorLines = MotorLines {
        driving_up: false,
        driving_down: false,
    };

    #[test]
    fn needs_three_confirming_samples() {
        let mut s = DirectionSensor::new(3);
        assert_eq!(s.update(DOWN), Direction::Stopped); // change, counter reset
        assert_eq!(s.update(DOWN), Direction::Stopped);
        assert_eq!(s.update(DOWN), Direction::Stopped);
        assert_eq!(s.update(DOWN), Direction::Down);
    }

    #[test]
    fn glitch_resets_stability() {
        let mut s = DirectionSensor::new(3);
        s.update(DOWN);
        s.update(DOWN);
        s.update(DOWN);
        s.update(IDLE);
        assert_eq!(s.update(DOWN), Direction::Stopped);
        for _ in 0..3 {
            s.update(DOWN);
        }
        assert_eq!(s.actual(), Direction::Down);
    }

    #[test]
    fn down_line_wins_when_both_active() {
        let both = MotorLines {
            driving_up: true,
            driving_down: true,
        };
        assert_eq!(Direction::from_lines(both), Direction::Down);
    }
}
