//! Decides when a position change is worth reporting upstream.

use crate::config::ThrottleCfg;
use crate::direction::Direction;
use crate::status::MotionState;

/// Everything the throttle looks at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleInput {
    pub state: MotionState,
    pub target_pending: bool,
    pub actual: Direction,
    pub percent: u8,
    pub now_ms: u64,
}

#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    cfg: ThrottleCfg,
    last_update_ms: u64,
    /// `None` until the first report.
    last_reported: Option<u8>,
    position_changed: bool,
}

impl UpdateThrottle {
    pub fn new(cfg: ThrottleCfg) -> Self {
        Self {
            cfg,
            last_update_ms: 0,
            last_reported: None,
            position_changed: true,
        }
    }

    pub fn mark_changed(&mut self) {
        self.position_changed = true;
    }

    pub fn position_changed(&self) -> bool {
        self.position_changed
    }

    pub fn last_reported(&self) -> Option<u8> {
        self.last_reported
    }

    fn moved_at_least(&self, percent: u8, band: u8) -> bool {
        self.last_reported
            .is_none_or(|last| last.abs_diff(percent) >= band)
    }

    pub fn should_send(&self, input: ThrottleInput) -> bool {
        if input.state.is_calibrating() {
            return false;
        }

        if input.state.is_moving() && input.target_pending {
            if self.last_reported.is_none() {
                return true;
            }
            let elapsed = input.now_ms.saturating_sub(self.last_update_ms);
            let send = elapsed >= self.cfg.moving_interval_ms
                && self.moved_at_least(input.percent, self.cfg.moving_hysteresis_pct);
            tracing::trace!(elapsed, percent = input.percent, send, "throttle: moving");
            return send;
        }

        if input.state == MotionState::Stopped {
            // Manual motion still in progress: wait until it ends.
            if input.actual != Direction::Stopped {
                return false;
            }
            if self.position_changed {
                return self.moved_at_least(input.percent, self.cfg.idle_hysteresis_pct);
            }
        }
        false
    }

    pub fn mark_sent(&mut self, now_ms: u64, percent: u8) {
        self.last_update_ms = now_ms;
        self.last_reported = Some(percent);
        self.position_changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving(percent: u8, now_ms: u64) -> ThrottleInput {
        ThrottleInput {
            state: MotionState::MovingDown,
            target_pending: true,
            actual: Direction::Down,
            percent,
            now_ms,
        }
    }

    #[test]
    fn moving_reports_need_interval_and_band() {
        let mut t = UpdateThrottle::new(ThrottleCfg::default());
        assert!(t.should_send(moving(10, 0)));
        t.mark_sent(0, 10);

        assert!(!t.should_send(moving(13, 200)));
        assert!(!t.should_send(moving(16, 400)));
        assert!(!t.should_send(moving(11, 600)));
        assert!(t.should_send(moving(16, 600)));
    }

    #[test]
    fn calibration_never_reports() {
        let t = UpdateThrottle::new(ThrottleCfg::default());
        for state in [
            MotionState::CalibratingUp,
            MotionState::CalibratingDown,
            MotionState::CalibratingValidation,
        ] {
            assert!(!t.should_send(ThrottleInput {
                state,
                ..moving(50, 10_000)
            }));
        }
    }

    #[test]
    fn manual_motion_reports_after_it_ends() {
        let mut t = UpdateThrottle::new(ThrottleCfg::default());
        t.mark_sent(0, 40);
        t.mark_changed();
        let running = ThrottleInput {
            state: MotionState::Stopped,
            target_pending: false,
            actual: Direction::Up,
            percent: 20,
            now_ms: 5000,
        };
        assert!(!t.should_send(running));
        let ended = ThrottleInput {
            actual: Direction::Stopped,
            ..running
        };
        assert!(t.should_send(ended));
        t.mark_sent(5000, 20);
        assert!(!t.should_send(ended));
    }

    #[test]
    fn idle_change_within_band_is_suppressed() {
        let mut t = UpdateThrottle::new(ThrottleCfg::default());
        t.mark_sent(0, 40);
        t.mark_changed();
        let idle = ThrottleInput {
            state: MotionState::Stopped,
            target_pending: false,
            actual: Direction::Stopped,
            percent: 40,
            now_ms: 100,
        };
        assert!(!t.should_send(idle));
        assert!(t.should_send(ThrottleInput { percent: 41, ..idle }));
    }
}
