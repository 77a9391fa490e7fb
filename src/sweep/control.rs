//! Scan control handle - stop, wait, join

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::{ScanSnapshot, ScanState};
use crate::error::{Result, SweepError};
use crate::types::{ScanPhase, ScanReport};

/// Handle to a running scan returned by [`Scanner::start`](super::Scanner::start)
pub struct ScanHandle {
    cancel: CancellationToken,
    phase: watch::Receiver<ScanPhase>,
    state: Arc<ScanState>,
    task: JoinHandle<ScanReport>,
}

impl ScanHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        phase: watch::Receiver<ScanPhase>,
        state: Arc<ScanState>,
        task: JoinHandle<ScanReport>,
    ) -> Self {
        Self {
            cancel,
            phase,
            state,
            task,
        }
    }

    /// Request a stop. Safe to call any number of times, including after the
    /// scan has already ended.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(phase = %self.phase(), "Stop requested");
            self.cancel.cancel();
        }
    }

    /// Request a stop and wait until the coordinator reaches Finished or
    /// Aborted. The coordinator bounds this by the configured grace period.
    pub async fn stop_and_wait(&self) -> ScanPhase {
        self.stop();
        self.wait_terminal().await
    }

    /// Wait for Finished or Aborted without requesting a stop
    pub async fn wait_terminal(&self) -> ScanPhase {
        let mut phase = self.phase.clone();
        if let Ok(current) = phase.wait_for(|p| p.is_terminal()).await {
            return *current;
        }
        // Sender dropped: the coordinator task is gone, report what it last published
        let last = *phase.borrow();
        last
    }

    /// Current coordinator phase
    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Live counters
    pub fn snapshot(&self) -> ScanSnapshot {
        self.state.snapshot()
    }

    /// Wait for the coordinator task and take its final report
    pub async fn join(self) -> Result<ScanReport> {
        self.task
            .await
            .map_err(|e| SweepError::internal(format!("scan task failed: {}", e)))
    }
}

impl std::fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHandle")
            .field("phase", &self.phase())
            .field("stop_requested", &self.cancel.is_cancelled())
            .field("snapshot", &self.state.snapshot())
            .finish()
    }
}
