//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classified state of a monitor at one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Down,
    Up,
    Pending,
    Maintenance,
}

impl Status {
    /// Integer code used in the database (matches the push API's historical values).
    pub fn code(self) -> i64 {
        match self {
            Status::Down => 0,
            Status::Up => 1,
            Status::Pending => 2,
            Status::Maintenance => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::Down),
            1 => Some(Status::Up),
            2 => Some(Status::Pending),
            3 => Some(Status::Maintenance),
            _ => None,
        }
    }

    /// Swap UP and DOWN; other states are unaffected.
    pub fn flipped(self) -> Self {
        match self {
            Status::Up => Status::Down,
            Status::Down => Status::Up,
            other => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Down => "down",
            Status::Up => "up",
            Status::Pending => "pending",
            Status::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Status::Up),
            "down" => Ok(Status::Down),
            "pending" => Ok(Status::Pending),
            "maintenance" => Ok(Status::Maintenance),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// A monitored target as configured by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub active: bool,
    pub max_retries: u32,
    pub upside_down: bool,
    /// Consecutive DOWN beats between repeat notifications (0 disables).
    pub resend_interval: u32,
    pub push_token: String,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            id: 0,
            user_id: 0,
            name: String::new(),
            active: true,
            max_retries: 0,
            upside_down: false,
            resend_interval: 0,
            push_token: String::new(),
        }
    }
}

/// A stored heartbeat. Never modified after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: i64,
    pub monitor_id: i64,
    pub time: DateTime<Utc>,
    /// Effective end of the span this beat was credited for in the uptime buckets.
    pub end_time: DateTime<Utc>,
    pub status: Status,
    /// Response time in milliseconds.
    pub ping: Option<f64>,
    pub msg: String,
    /// Seconds since the previous heartbeat of the same monitor.
    pub duration: i64,
    pub retries: u32,
    pub down_count: u32,
    pub important: bool,
}

/// A scheduled maintenance period for one monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: i64,
    pub monitor_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Filters for the heartbeat report. Every field left unset matches all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFilter {
    pub heartbeat_id: Option<i64>,
    /// Substring of the monitor name.
    pub name: Option<String>,
    /// Substring of the heartbeat message.
    pub message: Option<String>,
    pub duration: Option<i64>,
    pub status: Option<Status>,
    pub active: Option<bool>,
    pub retries: Option<u32>,
    /// Inclusive time range; applied only when both ends are set.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: u32,
    /// Rows per page; `None` returns everything.
    pub limit: Option<u32>,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            heartbeat_id: None,
            name: None,
            message: None,
            duration: None,
            status: None,
            active: None,
            retries: None,
            from: None,
            to: None,
            page: 1,
            limit: Some(10),
        }
    }
}

/// One row of the heartbeat report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportItem {
    pub id: i64,
    /// Monitor name.
    pub name: String,
    pub msg: String,
    pub time: DateTime<Utc>,
    pub duration: i64,
    pub status: Status,
    pub active: bool,
    pub retries: u32,
}

/// A page of report rows plus the number of rows matching the filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub items: Vec<ReportItem>,
    pub total_count: i64,
}

/// A persisted uptime bucket row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBucket {
    pub monitor_id: i64,
    pub window_seconds: i64,
    /// Bucket start as a unix timestamp.
    pub start: i64,
    pub up_seconds: f64,
    pub down_seconds: f64,
    pub maintenance_seconds: f64,
    pub ping_sum: f64,
    pub ping_count: f64,
}
