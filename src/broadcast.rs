//! Live heartbeat fan-out to connected dashboards.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::db::Heartbeat;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("live update for user {user_id} not delivered: {reason}")]
    Undelivered { user_id: i64, reason: String },
}

/// Pushes freshly stored heartbeats to whoever is watching.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, user_id: i64, heartbeat: &Heartbeat) -> Result<(), BroadcastError>;
}

/// A heartbeat addressed to one owner's sessions.
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub user_id: i64,
    pub heartbeat: Heartbeat,
}

/// In-process hub built on a tokio broadcast channel.
///
/// Having no subscribers is not an error; slow subscribers lag and skip.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<LiveUpdate>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Broadcaster for BroadcastHub {
    async fn broadcast(&self, user_id: i64, heartbeat: &Heartbeat) -> Result<(), BroadcastError> {
        let update = LiveUpdate {
            user_id,
            heartbeat: heartbeat.clone(),
        };
        if self.tx.send(update).is_err() {
            tracing::trace!("BroadcastHub: No live subscribers for user {}", user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Status;
    use chrono::Utc;

    fn heartbeat() -> Heartbeat {
        Heartbeat {
            id: 3,
            monitor_id: 1,
            time: Utc::now(),
            end_time: Utc::now(),
            status: Status::Up,
            ping: Some(1.0),
            msg: "OK".to_string(),
            duration: 20,
            retries: 0,
            down_count: 0,
            important: false,
        }
    }

    #[test]
    fn test_subscriber_receives_update() {
        let hub = BroadcastHub::new(4);
        let mut rx = hub.subscribe();

        tokio_test::block_on(hub.broadcast(7, &heartbeat())).unwrap();

        let update = rx.try_recv().unwrap();
        assert_eq!(update.user_id, 7);
        assert_eq!(update.heartbeat.id, 3);
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let hub = BroadcastHub::default();
        assert!(tokio_test::block_on(hub.broadcast(1, &heartbeat())).is_ok());
    }
}
