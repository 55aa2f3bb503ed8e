//! Outer loop around anchoring rounds.
//!
//! Every error a round raises is caught here and logged. With a zero
//! interval the scheduler runs a single round and stops with exit status
//! 0 or 1. Otherwise it sleeps the interval and runs again, forever,
//! whatever the previous round's outcome was.

use chrono::Local;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

use crate::engine::round::RoundOutcome;
use crate::error::Result;
use crate::log::AnchorLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped { exit_code: i32 },
}

pub struct RetryScheduler<'a> {
    interval: Duration,
    log: &'a dyn AnchorLog,
}

impl<'a> RetryScheduler<'a> {
    pub fn new(interval: Duration, log: &'a dyn AnchorLog) -> Self {
        Self { interval, log }
    }

    pub fn is_single_shot(&self) -> bool {
        self.interval.is_zero()
    }

    /// Run rounds until stopped and return the process exit status.
    ///
    /// In repeat mode this never returns.
    pub async fn run<F, Fut>(&self, mut round: F) -> i32
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RoundOutcome>>,
    {
        loop {
            if let SchedulerState::Stopped { exit_code } = self.step(&mut round).await {
                return exit_code;
            }
        }
    }

    /// Run one round, then either stop or sleep until the next one is due.
    pub async fn step<F, Fut>(&self, round: &mut F) -> SchedulerState
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RoundOutcome>>,
    {
        let ok = self.run_cycle(round).await;

        if self.is_single_shot() {
            return SchedulerState::Stopped {
                exit_code: if ok { 0 } else { 1 },
            };
        }

        tokio::time::sleep(self.interval).await;
        self.log
            .info(&format!("{} repeating the routine", Local::now().format("%Y-%m-%d %H:%M:%S")));
        self.log.info("================================================");
        SchedulerState::Running
    }

    /// Run one round, reporting its outcome. Returns whether it succeeded.
    pub async fn run_cycle<F, Fut>(&self, round: &mut F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RoundOutcome>>,
    {
        match round().await {
            Ok(outcome) => {
                info!(
                    txid = ?outcome.txid,
                    fee_rate = %outcome.fee_rate,
                    skipped = outcome.skipped.len(),
                    "Round complete"
                );
                true
            }
            Err(e) => {
                error!(retryable = e.is_retryable(), "Round failed");
                self.log.critical(&format!("Error: {e}"));
                false
            }
        }
    }
}
