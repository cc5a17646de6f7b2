//! Live monitoring loop: append a reading, rescore the whole buffer, repeat.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::pipeline::{HealthSummary, Pipeline};
use crate::reading::{HealthState, Reading, ReadingBuffer};
use crate::simulate::Simulator;

struct MonitorState {
    buffer: ReadingBuffer,
    simulator: Simulator,
}

/// Owns the live buffer. Share it behind an `Arc` to read snapshots while
/// another task drives the refresh loop.
pub struct LiveMonitor {
    state: Mutex<MonitorState>,
    pipeline: Pipeline,
}

impl LiveMonitor {
    pub fn new(buffer: ReadingBuffer, pipeline: Pipeline, simulator: Simulator) -> Self {
        Self {
            state: Mutex::new(MonitorState { buffer, simulator }),
            pipeline,
        }
    }

    /// Score whatever is currently buffered without appending.
    pub async fn rescore(&self) -> Result<HealthSummary> {
        let mut state = self.state.lock().await;
        let summary = self
            .pipeline
            .run(state.buffer.as_mut_slice())
            .context("failed to score buffered readings")?;
        Ok(summary)
    }

    /// Append one simulated reading and rescore. The lock is held across both
    /// steps so no caller ever sees a half-updated buffer.
    pub async fn tick(&self) -> Result<HealthSummary> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let next = state.simulator.next_after(state.buffer.last());
        state.buffer.push(next).context("simulated reading out of order")?;
        let summary = self
            .pipeline
            .run(state.buffer.as_mut_slice())
            .context("failed to score buffered readings")?;
        Ok(summary)
    }

    /// Run `ticks` refresh cycles, sleeping `interval` between them.
    pub async fn run(&self, ticks: usize, interval: Duration) -> Result<Vec<HealthSummary>> {
        let mut summaries = Vec::with_capacity(ticks);
        for n in 0..ticks {
            if n > 0 {
                tokio::time::sleep(interval).await;
            }
            let summary = self.tick().await?;
            if summary.worst() == Some(HealthState::Critical) {
                warn!(
                    tick = n + 1,
                    critical = summary.critical,
                    risk_pct = summary.risk_pct,
                    "critical readings in buffer"
                );
            } else {
                info!(tick = n + 1, risk_pct = summary.risk_pct, "buffer rescored");
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Copy of the current (annotated) buffer contents.
    pub async fn snapshot(&self) -> Vec<Reading> {
        self.state.lock().await.buffer.to_vec()
    }
}
