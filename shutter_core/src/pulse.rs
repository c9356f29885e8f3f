//! Interrupt-fed motion pulse accumulator.
//!
//! The producer side (`PulseHandle::on_edge`) runs in interrupt context and
//! only touches atomics. The control loop is the single consumer and reads
//! through `PulseCounter::drain`, which swaps the accumulator with zero so no
//! pulse is counted twice or lost between drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicU32,
    ready: AtomicBool,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Accepted/rejected edge totals since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Consumer side, owned by the controller.
#[derive(Debug, Default)]
pub struct PulseCounter {
    shared: Arc<Shared>,
}

/// Producer side, moved into the interrupt callback.
#[derive(Debug, Clone)]
pub struct PulseHandle {
    shared: Arc<Shared>,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> PulseHandle {
        PulseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Edges are rejected until this is set.
    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Pulses since the previous drain.
    #[inline]
    pub fn drain(&self) -> u32 {
        self.shared.pending.swap(0, Ordering::AcqRel)
    }

    pub fn stats(&self) -> PulseStats {
        PulseStats {
            accepted: self.shared.accepted.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
        }
    }
}

impl PulseHandle {
    /// Interrupt entry point. Lock-free; never logs or allocates.
    #[inline]
    pub fn on_edge(&self) {
        if self.shared.ready.load(Ordering::Acquire) {
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
            self.shared.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_before_ready_are_rejected() {
        let counter = PulseCounter::new();
        let isr = counter.handle();
        isr.on_edge();
        isr.on_edge();
        assert_eq!(counter.drain(), 0);
        counter.set_ready(true);
        isr.on_edge();
        assert_eq!(counter.drain(), 1);
        assert_eq!(
            counter.stats(),
            PulseStats {
                accepted: 1,
                rejected: 2
            }
        );
    }

    #[test]
    fn concurrent_edges_are_never_lost() {
        let counter = PulseCounter::new();
        counter.set_ready(true);
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let isr = counter.handle();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        isr.on_edge();
                    }
                })
            })
            .collect();

        let mut total = 0u64;
        while producers.iter().any(|p| !p.is_finished()) {
            total += u64::from(counter.drain());
        }
        for p in producers {
            p.join().unwrap();
        }
        total += u64::from(counter.drain());
        assert_eq!(total, 40_000);
        assert_eq!(counter.drain(), 0);
    }
}
