//! Long-term travel drift detection from repeated limit arrivals.
//!
//! Each arrival at a mechanical limit contributes the counter value at that
//! moment. Bottom samples estimate the true travel distance; once enough
//! cycles have accumulated, the mean is compared against the learned
//! `max_pulses` and either confirms it, warns, or replaces it.

use crate::config::DriftCfg;
use crate::util::deviation_pct;

pub const HISTORY_CAPACITY: usize = shutter_config::DRIFT_HISTORY_CAPACITY;

/// Fixed-capacity ring of pulse counts that tracks how many slots hold real
/// samples, so a genuine zero is never mistaken for an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBuffer<const N: usize> {
    slots: [i32; N],
    cursor: usize,
    len: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self {
            slots: [0; N],
            cursor: 0,
            len: 0,
        }
    }
}

impl<const N: usize> RingBuffer<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. `None` if they are inconsistent.
    pub fn from_parts(slots: &[i32], cursor: usize, len: usize) -> Option<Self> {
        if slots.len() != N || cursor >= N.max(1) || len > N {
            return None;
        }
        let mut ring = Self::default();
        ring.slots.copy_from_slice(slots);
        ring.cursor = cursor;
        ring.len = len;
        Some(ring)
    }

    pub fn push(&mut self, value: i32) {
        if N == 0 {
            return;
        }
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn slots(&self) -> &[i32; N] {
        &self.slots
    }

    /// Valid samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        let start = (self.cursor + N - self.len) % N.max(1);
        (0..self.len).map(move |i| self.slots[(start + i) % N])
    }

    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let sum: i64 = self.iter().map(i64::from).sum();
        Some(sum as f64 / self.len as f64)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub type History = RingBuffer<HISTORY_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftVerdict {
    /// Not enough cycles or samples yet.
    Pending,
    Stable { deviation_pct: f64 },
    Warning { measured: f64, deviation_pct: f64 },
    Corrected { previous: i32, corrected: i32, deviation_pct: f64 },
}

#[derive(Debug, Clone)]
pub struct DriftMonitor {
    cfg: DriftCfg,
    top: History,
    bottom: History,
    full_cycles: u32,
}

impl DriftMonitor {
    pub fn new(cfg: DriftCfg) -> Self {
        Self::restore(cfg, History::new(), History::new(), 0)
    }

    pub fn restore(cfg: DriftCfg, top: History, bottom: History, full_cycles: u32) -> Self {
        Self {
            cfg,
            top,
            bottom,
            full_cycles,
        }
    }

    pub fn top(&self) -> &History {
        &self.top
    }

    pub fn bottom(&self) -> &History {
        &self.bottom
    }

    pub fn full_cycles(&self) -> u32 {
        self.full_cycles
    }

    /// Whether a limit sample is close enough to `expected` to be trusted.
    pub fn is_plausible(&self, sample: i32, expected: i32, max_pulses: i32) -> bool {
        let window = f64::from(max_pulses.max(0)) * f64::from(self.cfg.plausibility_pct) / 100.0;
        f64::from(sample.abs_diff(expected)) <= window
    }

    pub fn record_top(&mut self, pulses: i32) {
        self.top.push(pulses);
        tracing::debug!(pulses, samples = self.top.len(), "top limit sample");
    }

    /// Record a bottom arrival and evaluate when due.
    pub fn record_bottom(&mut self, pulses: i32, max_pulses: i32) -> DriftVerdict {
        self.bottom.push(pulses);
        self.full_cycles = self.full_cycles.saturating_add(1);
        tracing::debug!(
            pulses,
            samples = self.bottom.len(),
            cycles = self.full_cycles,
            "bottom limit sample"
        );
        self.evaluate(max_pulses)
    }

    pub fn evaluate(&mut self, max_pulses: i32) -> DriftVerdict {
        if self.full_cycles < self.cfg.min_cycles || self.bottom.len() < self.cfg.min_samples {
            return DriftVerdict::Pending;
        }
        let Some(measured) = self.bottom.mean() else {
            return DriftVerdict::Pending;
        };
        let deviation = deviation_pct(measured, f64::from(max_pulses));

        if deviation > f64::from(self.cfg.correction_pct) {
            let corrected = measured.round() as i32;
            tracing::info!(
                previous = max_pulses,
                corrected,
                deviation_pct = deviation,
                "drift corrected"
            );
            self.reset();
            return DriftVerdict::Corrected {
                previous: max_pulses,
                corrected,
                deviation_pct: deviation,
            };
        }
        if deviation > f64::from(self.cfg.warning_pct) {
            tracing::warn!(
                measured,
                max_pulses,
                deviation_pct = deviation,
                "travel drift above warning threshold"
            );
            return DriftVerdict::Warning {
                measured,
                deviation_pct: deviation,
            };
        }
        self.full_cycles = 0;
        DriftVerdict::Stable {
            deviation_pct: deviation,
        }
    }

    pub fn reset(&mut self) {
        self.top.clear();
        self.bottom.clear();
        self.full_cycles = 0;
    }
}
