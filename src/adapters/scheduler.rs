//! Periodic ingestion task with an explicit start/stop lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::ingest::IngestJob;

/// Handle to a running ingestion loop. Must be started inside a tokio
/// runtime. The first pass runs immediately.
pub struct IngestScheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl IngestScheduler {
    pub fn start(job: Arc<IngestJob>, every: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(every_secs = every.as_secs_f64(), "ingestion scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let job = job.clone();
                        // Store writes are blocking; keep them off the async workers.
                        match tokio::task::spawn_blocking(move || job.run_once()).await {
                            Ok(report) => tracing::debug!(?report, "scheduled ingestion finished"),
                            Err(e) => tracing::error!(error = %e, "ingestion pass panicked"),
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("ingestion scheduler stopped");
        });

        IngestScheduler { stop_tx, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop and wait for an in-flight pass to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "ingestion scheduler task failed");
        }
    }
}
