//! Heartbeat ingestion.
//!
//! One call takes a reported result for a monitor through classification,
//! uptime aggregation, persistence and the notification decision, then hands
//! the stored heartbeat to the live-update and metrics collaborators.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::broadcast::Broadcaster;
use crate::classify::{classify, is_important_beat, is_important_for_notification, PreviousBeat};
use crate::db::{DbError, Heartbeat, Monitor, Status, Store};
use crate::error::{Error, Result};
use crate::metrics::MetricsRegistry;
use crate::notify::Notifier;
use crate::uptime::{Resolution, UptimeCalculator, UptimeRegistry};

const MAINTENANCE_MSG: &str = "Monitor under maintenance";

/// A reported result, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    pub status: Status,
    pub msg: String,
    pub ping: Option<f64>,
    pub at: DateTime<Utc>,
}

impl Beat {
    pub fn new(status: Status, at: DateTime<Utc>) -> Self {
        Self {
            status,
            msg: "OK".to_string(),
            ping: None,
            at,
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    pub fn with_ping(mut self, ping: Option<f64>) -> Self {
        self.ping = ping;
        self
    }
}

/// What happened to an ingested beat.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub heartbeat: Heartbeat,
    pub is_first_beat: bool,
    pub notified: bool,
}

/// Coordinates ingestion for all monitors.
pub struct Pipeline {
    store: Arc<Store>,
    registry: Arc<UptimeRegistry>,
    notifier: Arc<dyn Notifier>,
    broadcaster: Arc<dyn Broadcaster>,
    metrics: Arc<MetricsRegistry>,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<UptimeRegistry>,
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn Broadcaster>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
            broadcaster,
            metrics,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Ingest a beat for the active monitor owning `token`.
    pub async fn ingest_push(&self, token: &str, beat: Beat) -> Result<IngestOutcome> {
        let monitor = self
            .store
            .find_active_monitor_by_token(token)?
            .ok_or(Error::NotFound)?;
        self.ingest(monitor, beat).await
    }

    /// Ingest a beat for a monitor by id. Inactive monitors are rejected.
    pub async fn ingest_for_monitor(&self, monitor_id: i64, beat: Beat) -> Result<IngestOutcome> {
        let monitor = match self.store.get_monitor(monitor_id) {
            Ok(m) if m.active => m,
            Ok(_) | Err(DbError::NotFound) => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        };
        self.ingest(monitor, beat).await
    }

    /// Uptime engine for a monitor, restored from storage on first use.
    pub fn calculator(&self, monitor_id: i64) -> Result<Arc<UptimeCalculator>> {
        let calc = self
            .registry
            .get_or_try_insert_with(monitor_id, || restore_calculator(&self.store, monitor_id))?;
        Ok(calc)
    }

    fn monitor_lock(&self, monitor_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(monitor_id).or_default().clone()
    }

    async fn ingest(&self, monitor: Monitor, beat: Beat) -> Result<IngestOutcome> {
        if let Some(ping) = beat.ping {
            if !ping.is_finite() || ping < 0.0 {
                return Err(Error::InvalidInput(format!("invalid ping: {}", ping)));
            }
        }

        let lock = self.monitor_lock(monitor.id);
        let _guard = lock.lock().await;

        // Everything that can fail on read happens before the engine is touched.
        let previous = self.store.get_previous_heartbeat(monitor.id)?;
        let is_first_beat = previous.is_none();
        let last_important = match previous {
            Some(_) => self
                .store
                .get_last_important_heartbeat(monitor.id)?
                .map(|hb| hb.status),
            None => None,
        };
        let under_maintenance = self.store.is_under_maintenance(monitor.id, beat.at)?;
        let calc = self.calculator(monitor.id)?;

        let (status, retries, msg) = if under_maintenance {
            (Status::Maintenance, 0, MAINTENANCE_MSG.to_string())
        } else {
            let c = classify(
                beat.status,
                previous.as_ref().map(PreviousBeat::from),
                monitor.max_retries,
                monitor.upside_down,
            );
            (c.status, c.retries, beat.msg)
        };

        let update = calc.prepare_update(status, beat.ping, beat.at);

        let important = is_important_beat(is_first_beat, last_important, status);
        let mut down_count = previous.as_ref().map_or(0, |p| p.down_count);
        let mut notify = false;
        if is_important_for_notification(is_first_beat, last_important, status) {
            down_count = 0;
            notify = true;
        } else if status == Status::Down && monitor.resend_interval > 0 {
            down_count += 1;
            if down_count >= monitor.resend_interval {
                tracing::debug!(
                    "Pipeline: [{}] resending, down count {} reached interval {}",
                    monitor.name,
                    down_count,
                    monitor.resend_interval
                );
                down_count = 0;
                notify = true;
            }
        }

        let draft = Heartbeat {
            id: 0,
            monitor_id: monitor.id,
            time: beat.at,
            end_time: update.end_time,
            status,
            ping: beat.ping,
            msg,
            duration: previous
                .as_ref()
                .map_or(0, |p| (beat.at - p.time).num_seconds().max(0)),
            retries,
            down_count,
            important,
        };
        // The engine only moves once the heartbeat and its buckets are stored.
        let id = self.store.record_heartbeat(&draft, &update.changed)?;
        calc.commit(&update);
        let heartbeat = Heartbeat { id, ..draft };

        tracing::debug!(
            "Pipeline: [{}] previous={:?} current={} retries={} important={}",
            monitor.name,
            previous.as_ref().map(|p| p.status),
            heartbeat.status,
            heartbeat.retries,
            heartbeat.important
        );

        let notified = if notify {
            self.notifier
                .notify(is_first_beat, &monitor, &heartbeat)
                .await
                .map(|_| true)
                .map_err(Error::from)
        } else {
            Ok(false)
        };
        if let Err(e) = &notified {
            tracing::warn!("Pipeline: [{}] notification failed: {}", monitor.name, e);
        }

        let broadcast = self
            .broadcaster
            .broadcast(monitor.user_id, &heartbeat)
            .await
            .map_err(Error::from);

        let uptime_24h = calc
            .get_data_by_duration(24 * 3_600, beat.at)
            .ok()
            .map(|d| d.uptime);
        let uptime_30d = calc
            .get_data_by_duration(30 * 86_400, beat.at)
            .ok()
            .map(|d| d.uptime);
        self.metrics.record(&monitor, &heartbeat, uptime_24h, uptime_30d);

        let notified = notified?;
        broadcast?;

        Ok(IngestOutcome {
            heartbeat,
            is_first_beat,
            notified,
        })
    }
}

/// Rebuild a monitor's engine from its persisted buckets and last heartbeat.
pub fn restore_calculator(store: &Store, monitor_id: i64) -> Result<UptimeCalculator, DbError> {
    let last_end = store.get_previous_heartbeat(monitor_id)?.map(|hb| hb.end_time);
    let anchor = last_end.unwrap_or_else(Utc::now).timestamp();

    let mut rows = Vec::new();
    for res in Resolution::ALL {
        let since = res.bucket_start(anchor - res.retention_seconds());
        rows.extend(store.load_buckets(monitor_id, res.seconds(), since)?);
    }

    tracing::debug!(
        "Pipeline: Restored {} buckets for monitor {}",
        rows.len(),
        monitor_id
    );
    Ok(UptimeCalculator::restore(monitor_id, last_end, rows))
}
