//! Reconciliation of the client registry against the status report
//!
//! Each cycle reads the latest report, parses it and applies it to the
//! registry as a snapshot: every `connected` record is first reset to
//! `disconnected`, then each reported session marks its record
//! `connected` with fresh counters.
//!
//! # Consistency
//!
//! A session whose update fails after the reset stays `disconnected` until
//! the next successful cycle. This window is accepted; the next tick heals
//! it.
//!
//! Sessions with no registry record are logged and ignored. Records are
//! only ever created by issuance.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use oa_core::error::ReconcileError;
use oa_core::outcome::ReconciliationResult;
use oa_core::traits::{RegistryStore, StatusSource};
use oa_core::types::StatusUpdate;
use oa_status::StatusReport;

/// Merges status reports into the registry
pub struct Reconciler {
    source: Arc<dyn StatusSource>,
    registry: Arc<dyn RegistryStore>,
    // Held for a whole cycle so cycles never overlap
    cycle: Mutex<()>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn StatusSource>, registry: Arc<dyn RegistryStore>) -> Self {
        Self {
            source,
            registry,
            cycle: Mutex::new(()),
        }
    }

    /// Run one reconciliation cycle
    ///
    /// Never fails: problems are collected in the result. A cycle that
    /// starts while another is running waits for it to finish.
    pub async fn reconcile(&self) -> ReconciliationResult {
        let _cycle = self.cycle.lock().await;
        let mut result = ReconciliationResult::default();

        let text = match self.source.read_current_report().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping reconciliation cycle: {}", e);
                result.errors.push(ReconcileError::Source(e));
                return result;
            }
        };

        let report = StatusReport::parse_at(&text, Utc::now());
        if !report.anomalies.is_empty() {
            tracing::debug!(
                "Status report parsed with {} anomalies",
                report.anomalies.len()
            );
        }

        let updates: Vec<StatusUpdate> =
            report.sessions.iter().map(StatusUpdate::from_session).collect();

        let applied = match self.registry.apply_snapshot(&updates).await {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!("Skipping reconciliation cycle: {}", e);
                result.errors.push(ReconcileError::Snapshot(e));
                return result;
            }
        };
        result.reset = applied.reset;

        for (name, outcome) in applied.updates {
            match outcome {
                Ok(0) => {
                    tracing::warn!("Session for unknown client {} ignored", name);
                    result.orphaned.push(name);
                }
                Ok(_) => result.updated += 1,
                Err(error) => {
                    tracing::warn!("Failed to update client {}: {}", name, error);
                    result.errors.push(ReconcileError::Update { name, error });
                }
            }
        }

        tracing::debug!(
            "Reconciled {} sessions ({} reset, {} orphaned, {} errors)",
            result.updated,
            result.reset,
            result.orphaned.len(),
            result.errors.len()
        );
        result
    }
}

/// Run the periodic reconciliation task
///
/// The first cycle runs immediately. Cycles that fall behind are delayed
/// rather than bunched up.
///
/// # Arguments
///
/// * `reconciler` - The reconciler to drive
/// * `interval` - Time between cycle starts
/// * `cancel` - Cancellation token for graceful shutdown
pub async fn run_reconcile_loop(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Starting reconciliation task (interval: {:?})", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = reconciler.reconcile().await;
                if !result.is_clean() {
                    tracing::info!(
                        "Reconciliation cycle finished with {} errors",
                        result.errors.len()
                    );
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Reconciliation task shutting down");
                break;
            }
        }
    }
}
