//! Error types surfaced by ingestion and uptime queries.

use thiserror::Error;

use crate::broadcast::BroadcastError;
use crate::db::DbError;
use crate::duration::DurationError;
use crate::notify::NotifyError;

/// Errors returned by the core to request handlers.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown or inactive monitor. Raised before any state is touched.
    #[error("monitor not found or not active")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No up or down time recorded in the requested window. Render as "N/A".
    #[error("no data in the requested window")]
    NoData,

    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl From<DurationError> for Error {
    fn from(err: DurationError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
