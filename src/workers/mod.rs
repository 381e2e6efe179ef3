//! Periodic background workers

use std::time::Duration;

use rampart_core::config::ReconciliationConfig;
use rampart_orchestrator::ReconciliationSweep;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the sweep that re-enqueues stale running scans.
///
/// Returns `None` when reconciliation is disabled. The task exits once
/// `shutdown_token` is cancelled.
pub fn spawn_reconciliation_worker(
    sweep: ReconciliationSweep,
    config: &ReconciliationConfig,
    shutdown_token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !config.enabled || config.interval_seconds == 0 {
        tracing::info!("Reconciliation sweep disabled");
        return None;
    }

    let interval = Duration::from_secs(config.interval_seconds);

    Some(tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match sweep.run_once().await {
                        Ok(0) => tracing::debug!("Reconciliation sweep found nothing to re-enqueue"),
                        Ok(requeued) => {
                            tracing::info!("Reconciliation sweep re-enqueued {} scans", requeued);
                        }
                        Err(e) => tracing::warn!("Reconciliation sweep failed: {}", e),
                    }
                }
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Reconciliation worker shutting down");
                    break;
                }
            }
        }
    }))
}
