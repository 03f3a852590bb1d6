//! Notification dispatch.
//!
//! The pipeline only decides when to notify. Delivery is up to the
//! [`Notifier`] implementation.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::db::{Heartbeat, Monitor, Status};

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("endpoint rejected notification: HTTP {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Network(err.to_string())
        }
    }
}

/// Receives heartbeats worth telling a human about.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, is_first_beat: bool, monitor: &Monitor, heartbeat: &Heartbeat) -> Result<(), NotifyError>;
}

/// Human readable summary line for a heartbeat.
pub fn format_message(monitor: &Monitor, heartbeat: &Heartbeat) -> String {
    let icon = match heartbeat.status {
        Status::Up => "✅ Up",
        Status::Down => "🔴 Down",
        Status::Pending => "🟡 Pending",
        Status::Maintenance => "🔧 Maintenance",
    };
    if heartbeat.msg.is_empty() {
        format!("[{}] [{}]", monitor.name, icon)
    } else {
        format!("[{}] [{}] {}", monitor.name, icon, heartbeat.msg)
    }
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, is_first_beat: bool, monitor: &Monitor, heartbeat: &Heartbeat) -> Result<(), NotifyError> {
        tracing::info!(
            first_beat = is_first_beat,
            "Notification: {}",
            format_message(monitor, heartbeat)
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    msg: String,
    monitor: &'a Monitor,
    heartbeat: &'a Heartbeat,
}

/// Posts a JSON payload to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, _is_first_beat: bool, monitor: &Monitor, heartbeat: &Heartbeat) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            msg: format_message(monitor, heartbeat),
            monitor,
            heartbeat,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        tracing::debug!("WebhookNotifier: Delivered notification for {}", monitor.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn heartbeat(status: Status, msg: &str) -> Heartbeat {
        Heartbeat {
            id: 1,
            monitor_id: 1,
            time: Utc::now(),
            end_time: Utc::now(),
            status,
            ping: None,
            msg: msg.to_string(),
            duration: 0,
            retries: 0,
            down_count: 0,
            important: true,
        }
    }

    #[test]
    fn test_format_message() {
        let monitor = Monitor {
            name: "billing".to_string(),
            ..Default::default()
        };
        assert_eq!(
            format_message(&monitor, &heartbeat(Status::Down, "timeout")),
            "[billing] [🔴 Down] timeout"
        );
        assert_eq!(format_message(&monitor, &heartbeat(Status::Up, "")), "[billing] [✅ Up]");
    }

    #[tokio::test]
    async fn test_webhook_unreachable_endpoint() {
        let notifier = WebhookNotifier::new("http://256.256.256.256/hook", Duration::from_millis(100)).unwrap();
        let monitor = Monitor::default();
        let result = notifier.notify(true, &monitor, &heartbeat(Status::Down, "x")).await;
        assert!(result.is_err());
    }
}
