//! Uptime aggregation engine.
//!
//! Multi-resolution rolling statistics per monitor, queryable by duration.

mod bucket;
mod calculator;
mod registry;

pub use bucket::*;
pub use calculator::*;
pub use registry::*;
