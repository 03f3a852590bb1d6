//! uptrail - heartbeat ingestion and multi-resolution uptime aggregation.

pub mod badge;
pub mod broadcast;
pub mod classify;
pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod uptime;
pub mod web;
