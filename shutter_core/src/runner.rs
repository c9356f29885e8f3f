//! Fixed-rate driver for `MotionController::tick`.
//!
//! Commands from other threads arrive over a crossbeam channel and are
//! applied at the start of each tick, so every controller entry point runs on
//! the control-loop thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use shutter_traits::{KeyValueStore, ShutterIo};

use crate::command::Command;
use crate::controller::MotionController;
use crate::error::Result;

/// Totals of one `Runner::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub reports: u64,
    pub commands: u64,
}

pub struct Runner<I, K> {
    controller: MotionController<I, K>,
    commands: Receiver<Command>,
    period: Duration,
}

impl<I: ShutterIo, K: KeyValueStore> Runner<I, K> {
    /// Wrap a controller; the returned sender feeds its command queue.
    pub fn new(controller: MotionController<I, K>, tick_ms: u64) -> (Self, Sender<Command>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let runner = Self {
            controller,
            commands: rx,
            period: Duration::from_millis(tick_ms.max(1)),
        };
        (runner, tx)
    }

    pub fn controller(&self) -> &MotionController<I, K> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MotionController<I, K> {
        &mut self.controller
    }

    pub fn into_controller(self) -> MotionController<I, K> {
        self.controller
    }

    fn drain_commands(&mut self) -> Result<u64> {
        let mut n = 0;
        loop {
            match self.commands.try_recv() {
                Ok(cmd) => {
                    self.controller.apply(cmd)?;
                    n += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(n),
            }
        }
    }

    fn step<F>(&mut self, hook: &mut F, summary: &mut RunSummary) -> Result<Option<u8>>
    where
        F: FnMut(&mut MotionController<I, K>, Option<u8>) -> Result<()>,
    {
        summary.commands += self.drain_commands()?;
        let report = self.controller.tick()?;
        hook(&mut self.controller, report)?;
        Ok(report)
    }

    /// Tick until `shutdown` is set or `max_ticks` is reached. `hook` runs
    /// after every tick with the report of that tick. The motor is stopped
    /// and the position persisted before returning.
    pub fn run<F>(
        &mut self,
        shutdown: &AtomicBool,
        max_ticks: Option<u64>,
        mut hook: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&mut MotionController<I, K>, Option<u8>) -> Result<()>,
    {
        let clock = self.controller.clock();
        let mut summary = RunSummary::default();
        tracing::info!(period_ms = self.period.as_millis() as u64, "control loop start");

        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown requested");
                break Ok(());
            }
            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break Ok(());
            }
            let step = self.step(&mut hook, &mut summary);
            match step {
                Ok(report) => {
                    summary.ticks += 1;
                    if report.is_some() {
                        summary.reports += 1;
                    }
                }
                Err(e) => break Err(e),
            }
            clock.sleep(self.period);
        };

        if let Err(e) = self.controller.stop() {
            tracing::warn!(error = %e, "stop on exit failed");
        }
        tracing::info!(
            ticks = summary.ticks,
            reports = summary.reports,
            commands = summary.commands,
            "control loop end"
        );
        outcome.map(|()| summary)
    }
}
