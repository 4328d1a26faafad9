//! Serialized, time-bounded execution of pipeline passes.
//!
//! The interval loop and the manual trigger share one [`Runner`], so two
//! passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::pipeline::{Pipeline, RunReport};

pub struct Runner {
    pipeline: Arc<Pipeline>,
    guard: Mutex<()>,
    timeout: Duration,
}

impl Runner {
    pub fn new(pipeline: Arc<Pipeline>, timeout: Duration) -> Self {
        Self {
            pipeline,
            guard: Mutex::new(()),
            timeout,
        }
    }

    /// Run one pass unless another is active.
    ///
    /// A pass that exceeds the timeout is dropped mid-flight; alerts already
    /// committed stay committed.
    pub async fn try_run(&self) -> Result<RunReport> {
        let _guard = self.guard.try_lock().map_err(|_| AppError::RunInProgress)?;
        tokio::time::timeout(self.timeout, self.pipeline.run_once())
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_secs()))?
    }

    /// Run a pass every `period` until the task is dropped.
    pub async fn run_every(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.try_run().await {
                Ok(_) => {}
                Err(AppError::RunInProgress) => log::info!("Tick skipped: run in progress"),
                Err(e) => log::error!("Scheduled run failed: {}", e),
            }
        }
    }
}
