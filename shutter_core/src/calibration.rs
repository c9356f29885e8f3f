//! Travel-distance learning from one up and one down traversal.

/// Accumulators of one calibration attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationSession {
    pub up_pulses: u32,
    pub down_pulses: u32,
    pub start_ms: u64,
    /// While set, the current phase has reached its limit and waits for the
    /// motor to settle before the next phase starts.
    pub settle_until_ms: Option<u64>,
}

impl CalibrationSession {
    pub fn new(start_ms: u64) -> Self {
        Self {
            start_ms,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationVerdict {
    Accepted { max_pulses: i32, diff_pct: f64 },
    Rejected { diff_pct: f64 },
}

/// Compare the two traversals. The mismatch is relative to the up count; an
/// empty up traversal is always rejected.
pub fn validate(up: u32, down: u32, tolerance_pct: f32) -> CalibrationVerdict {
    if up == 0 {
        return CalibrationVerdict::Rejected { diff_pct: 100.0 };
    }
    let diff_pct = f64::from(up.abs_diff(down)) / f64::from(up) * 100.0;
    if diff_pct > f64::from(tolerance_pct) {
        return CalibrationVerdict::Rejected { diff_pct };
    }
    let mean = (u64::from(up) + u64::from(down)) / 2;
    match i32::try_from(mean) {
        Ok(max_pulses) if max_pulses > 0 => CalibrationVerdict::Accepted { max_pulses, diff_pct },
        _ => CalibrationVerdict::Rejected { diff_pct },
    }
}
