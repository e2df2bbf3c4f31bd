//! Periodic auto-completion of past-due lessons.
//!
//! Spawns a background task that flips confirmed lessons whose scheduled
//! end has passed to completed. Runs on a fixed interval using
//! `tokio::time::interval`; the first tick fires at process start.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::queries::lesson::run_sweep;

/// Run the auto-completion loop.
///
/// One lesson failing to complete never aborts a pass; `run_sweep` logs and
/// skips it. Runs until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let interval_secs = Config::get().sweep_interval_secs;

    tracing::info!(interval_secs, "Auto-completion sweeper started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Auto-completion sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match run_sweep(&pool).await {
                    Ok(report) => {
                        if report.completed_count > 0 {
                            tracing::info!(
                                total_scanned = report.total_scanned,
                                completed_count = report.completed_count,
                                "Sweep completed past-due lessons"
                            );
                        } else {
                            tracing::debug!(
                                total_scanned = report.total_scanned,
                                "Sweep found nothing to complete"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Sweep pass failed");
                    }
                }
            }
        }
    }
}
