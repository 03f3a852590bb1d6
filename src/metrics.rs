//! Prometheus text exposition of per-monitor gauges.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{PoisonError, RwLock};

use crate::db::{Heartbeat, Monitor, Status};

/// Latest values exported for one monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorGauges {
    pub name: String,
    pub status: Status,
    pub response_time_ms: Option<f64>,
    pub uptime_24h: Option<f64>,
    pub uptime_30d: Option<f64>,
}

/// Gauge registry updated by the ingestion pipeline and scraped over HTTP.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    monitors: RwLock<BTreeMap<i64, MonitorGauges>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        monitor: &Monitor,
        heartbeat: &Heartbeat,
        uptime_24h: Option<f64>,
        uptime_30d: Option<f64>,
    ) {
        let gauges = MonitorGauges {
            name: monitor.name.clone(),
            status: heartbeat.status,
            response_time_ms: heartbeat.ping,
            uptime_24h,
            uptime_30d,
        };
        self.monitors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(monitor.id, gauges);
    }

    pub fn get(&self, monitor_id: i64) -> Option<MonitorGauges> {
        self.monitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&monitor_id)
            .cloned()
    }

    /// Render all gauges in the Prometheus text format.
    pub fn render(&self) -> String {
        let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();

        write_family(&mut out, "monitor_status", "Monitor status (0 down, 1 up, 2 pending, 3 maintenance)", &monitors, |g| {
            Some(g.status.code() as f64)
        });
        write_family(&mut out, "monitor_response_time", "Last response time in milliseconds", &monitors, |g| {
            g.response_time_ms
        });
        write_family(&mut out, "monitor_uptime_24h_ratio", "Uptime ratio over the last 24 hours", &monitors, |g| {
            g.uptime_24h
        });
        write_family(&mut out, "monitor_uptime_30d_ratio", "Uptime ratio over the last 30 days", &monitors, |g| {
            g.uptime_30d
        });

        out
    }
}

fn write_family<F>(out: &mut String, name: &str, help: &str, monitors: &BTreeMap<i64, MonitorGauges>, value: F)
where
    F: Fn(&MonitorGauges) -> Option<f64>,
{
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
    for (id, gauges) in monitors {
        if let Some(v) = value(gauges) {
            let _ = writeln!(
                out,
                "{}{{monitor_id=\"{}\",monitor_name=\"{}\"}} {}",
                name,
                id,
                escape_label_value(&gauges.name),
                v
            );
        }
    }
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
