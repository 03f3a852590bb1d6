//! Database module for uptrail.
//!
//! Provides SQLite storage for monitors, heartbeats, maintenance windows and
//! persisted uptime buckets.

mod models;
mod store;

pub use models::*;
pub use store::*;
