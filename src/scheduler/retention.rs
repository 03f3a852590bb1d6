//! Retention manager for cleaning up old data.

use crate::db::Store;
use crate::uptime::Resolution;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Manager for deleting heartbeats and uptime buckets past their retention.
pub struct RetentionManager {
    store: Arc<Store>,
    keep_days: u32,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, keep_days: u32) -> Self {
        Self {
            store,
            keep_days,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the retention manager background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let stop = self.stop.clone();
        let keep_days = self.keep_days;

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            let mut rx = tx.subscribe();
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx);
            }

            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        process_retention(&store, keep_days, Utc::now());
                    }
                }
            }
            tracing::info!("RetentionManager: Stopped");
        });
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// One retention pass. Returns the number of rows deleted.
pub fn process_retention(store: &Store, keep_days: u32, now: DateTime<Utc>) -> usize {
    let mut deleted = 0;

    for res in Resolution::ALL {
        let cutoff = res.bucket_start(now.timestamp() - res.retention_seconds());
        match store.delete_buckets_before(res.seconds(), cutoff) {
            Ok(n) => deleted += n,
            Err(e) => tracing::error!(
                "RetentionManager: Failed to delete buckets (w={}): {}",
                res.seconds(),
                e
            ),
        }
    }

    let cutoff = now - ChronoDuration::days(keep_days as i64);
    match store.delete_heartbeats_before(cutoff) {
        Ok(n) => deleted += n,
        Err(e) => tracing::error!("RetentionManager: Failed to delete heartbeats: {}", e),
    }

    if deleted > 0 {
        tracing::debug!("RetentionManager: Deleted {} expired rows", deleted);
    }
    deleted
}
