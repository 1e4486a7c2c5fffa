//! The perpetual reconcile loop: run a pass, sleep until the most urgent
//! requeue (capped by the default interval), repeat until shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::reconcile::{PassReport, Reconciler};
use crate::error::Result;

/// Configuration for the reconcile loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Upper bound on the sleep between passes.
    pub default_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Clone)]
pub struct ReconcileLoop {
    reconciler: Arc<Reconciler>,
    config: LoopConfig,
    cancel: CancellationToken,
}

impl ReconcileLoop {
    pub fn new(reconciler: Arc<Reconciler>, config: LoopConfig) -> Self {
        Self {
            reconciler,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop. An in-progress sleep is interrupted immediately.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// A single pass, outside the loop.
    pub async fn run_once(&self) -> Result<PassReport> {
        self.reconciler.run_pass(&self.cancel).await
    }

    /// Run until shut down. Pass failures are logged and never end the loop.
    pub async fn run(&self) {
        info!(
            checks = ?self.reconciler.check_names(),
            default_interval_s = self.config.default_interval.as_secs(),
            "reconcile loop started"
        );

        while !self.cancel.is_cancelled() {
            let delay = match self.reconciler.run_pass(&self.cancel).await {
                Ok(report) if report.cancelled => break,
                Ok(report) => report.result.next_delay(self.config.default_interval),
                Err(e) => {
                    error!("reconcile pass failed: {e}");
                    self.config.default_interval
                }
            };
            debug!(delay_ms = delay.as_millis() as u64, "next reconcile pass scheduled");

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("reconcile loop stopped");
    }
}
