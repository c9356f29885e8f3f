//! Monitoring snapshot; never used for control decisions.

use shutter_traits::{KeyValueStore, ShutterIo};

use crate::controller::MotionController;
use crate::drift::History;
use crate::persist::PersistedState;
use crate::pulse::PulseStats;
use crate::status::MotionState;
use crate::util::{deviation_pct, pulses_to_percent};

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub calibrated: bool,
    pub max_pulses: i32,
    pub current_pulses: i32,
    pub percent: u8,
    /// `None` when built from persisted state only.
    pub state: Option<MotionState>,
    pub full_cycles: u32,
    pub measured_average: Option<f64>,
    pub drift_percent: Option<f64>,
    pub drift_pulses: Option<i32>,
    pub top_history: Vec<i32>,
    pub bottom_history: Vec<i32>,
    pub pulses: Option<PulseStats>,
}

impl Diagnostics {
    fn assemble(
        calibrated: bool,
        max_pulses: i32,
        current_pulses: i32,
        full_cycles: u32,
        top: &History,
        bottom: &History,
    ) -> Self {
        let measured_average = bottom.mean();
        let (drift_percent, drift_pulses) = match measured_average {
            Some(avg) if max_pulses > 0 => (
                Some(deviation_pct(avg, f64::from(max_pulses))),
                Some(avg.round() as i32 - max_pulses),
            ),
            _ => (None, None),
        };
        Self {
            calibrated,
            max_pulses,
            current_pulses,
            percent: pulses_to_percent(current_pulses, max_pulses),
            state: None,
            full_cycles,
            measured_average,
            drift_percent,
            drift_pulses,
            top_history: top.iter().collect(),
            bottom_history: bottom.iter().collect(),
            pulses: None,
        }
    }

    /// Snapshot of what is stored, without a running controller.
    pub fn from_persisted(state: &PersistedState) -> Self {
        Self::assemble(
            state.calibrated(),
            state.max_count,
            state.current,
            state.full_cycles,
            &state.top,
            &state.bottom,
        )
    }
}

impl<I: ShutterIo, K: KeyValueStore> MotionController<I, K> {
    pub fn diagnostics(&self) -> Diagnostics {
        let drift = self.drift();
        let mut d = Diagnostics::assemble(
            self.is_calibrated(),
            self.max_pulses(),
            self.current_pulses(),
            drift.full_cycles(),
            drift.top(),
            drift.bottom(),
        );
        d.state = Some(self.state());
        d.pulses = Some(self.pulse_stats());
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_snapshot_reports_drift() {
        let mut state = PersistedState {
            max_count: 10_000,
            current: 2500,
            ..PersistedState::default()
        };
        for v in [9000, 9200] {
            state.bottom.push(v);
        }
        let d = Diagnostics::from_persisted(&state);
        assert!(d.calibrated);
        assert_eq!(d.percent, 25);
        assert_eq!(d.measured_average, Some(9100.0));
        assert_eq!(d.drift_pulses, Some(-900));
        assert_eq!(d.bottom_history, vec![9000, 9200]);
        assert!(d.top_history.is_empty());
        assert!(d.state.is_none());
    }

    #[test]
    fn empty_history_has_no_drift() {
        let d = Diagnostics::from_persisted(&PersistedState::default());
        assert_eq!(d.measured_average, None);
        assert_eq!(d.drift_percent, None);
    }
}
