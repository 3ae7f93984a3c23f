//! Recovery Worker
//!
//! Background sweeps:
//! - finishes PROCESSING sagas that stalled (crash, ambiguous ledger error)
//! - expires PENDING transactions whose verification window passed
//! - purges dead OTP challenges

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::engine::TransactionEngine;
use super::error::TransactionError;
use super::state::TransactionStatus;

/// Configuration for the recovery worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// How often to sweep
    pub scan_interval_secs: u64,
    /// How long a record must sit in PROCESSING to be considered stalled
    pub stale_threshold_secs: u64,
    /// Maximum records handled per sweep and category
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 60,
            batch_size: 100,
        }
    }
}

impl WorkerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }
}

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: usize,
    pub failed: usize,
    pub still_processing: usize,
    pub expired: usize,
    pub purged_challenges: usize,
}

pub struct RecoveryWorker {
    engine: Arc<TransactionEngine>,
    config: WorkerConfig,
}

impl RecoveryWorker {
    pub fn new(engine: Arc<TransactionEngine>, config: WorkerConfig) -> Self {
        Self { engine, config }
    }

    pub fn with_defaults(engine: Arc<TransactionEngine>) -> Self {
        Self::new(engine, WorkerConfig::default())
    }

    /// Run the recovery loop forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            stale_threshold_secs = self.config.stale_threshold_secs,
            pending_ttl_secs = self.engine.config().pending_ttl_secs,
            "Starting recovery worker"
        );

        loop {
            if let Err(e) = self.sweep().await {
                error!(error = %e, "Recovery sweep failed");
            }

            tokio::time::sleep(self.config.scan_interval()).await;
        }
    }

    /// One full sweep
    pub async fn sweep(&self) -> Result<SweepReport, TransactionError> {
        let mut report = self.recover_processing().await?;
        report.expired = self.engine.expire_pending(self.config.batch_size).await?;
        report.purged_challenges = match self.engine.otp().purge_dead().await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "Challenge purge failed");
                0
            }
        };

        if report != SweepReport::default() {
            info!(
                completed = report.completed,
                failed = report.failed,
                still_processing = report.still_processing,
                expired = report.expired,
                purged_challenges = report.purged_challenges,
                "Recovery sweep finished"
            );
        }
        Ok(report)
    }

    async fn recover_processing(&self) -> Result<SweepReport, TransactionError> {
        let now = self.engine.clock().now_ms();
        let threshold_ms = self.config.stale_threshold_secs as i64 * 1_000;
        let stale = self
            .engine
            .store()
            .find_in_status_before(
                TransactionStatus::Processing,
                now - threshold_ms,
                self.config.batch_size,
            )
            .await?;

        let mut report = SweepReport::default();
        if stale.is_empty() {
            debug!("No stalled transactions found");
            return Ok(report);
        }
        info!(count = stale.len(), "Found stalled transactions to recover");

        for record in &stale {
            let stalled_ms = now - record.updated_at;
            if stalled_ms > threshold_ms * 10 {
                warn!(
                    reference = %record.reference,
                    stalled_secs = stalled_ms / 1_000,
                    "CRITICAL: Transaction stuck in PROCESSING across many sweeps"
                );
            }

            match self.engine.settlement().reconcile(record).await {
                Ok(TransactionStatus::Completed) => report.completed += 1,
                Ok(TransactionStatus::Failed) => report.failed += 1,
                Ok(status) => {
                    debug!(reference = %record.reference, status = %status, "Still unresolved");
                    report.still_processing += 1;
                }
                Err(e) => {
                    error!(reference = %record.reference, error = %e, "Failed to recover transaction");
                    report.still_processing += 1;
                }
            }
        }
        Ok(report)
    }
}
