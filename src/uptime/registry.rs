//! Shared cache of per-monitor uptime engines.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::calculator::UptimeCalculator;

/// Owns one [`UptimeCalculator`] per monitor for the lifetime of the process.
///
/// Created once at startup and handed to the ingestion pipeline and the web
/// layer. Engines are never evicted.
#[derive(Debug, Default)]
pub struct UptimeRegistry {
    calculators: RwLock<HashMap<i64, Arc<UptimeCalculator>>>,
}

impl UptimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached engine for a monitor, if one was created.
    pub fn get(&self, monitor_id: i64) -> Option<Arc<UptimeCalculator>> {
        self.calculators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&monitor_id)
            .cloned()
    }

    /// Return the cached engine or build one with `init`.
    ///
    /// `init` runs without holding the registry lock, so a slow restore for one
    /// monitor never blocks lookups for others. If two callers race, the first
    /// insert wins and the other engine is dropped.
    pub fn get_or_try_insert_with<F, E>(&self, monitor_id: i64, init: F) -> Result<Arc<UptimeCalculator>, E>
    where
        F: FnOnce() -> Result<UptimeCalculator, E>,
    {
        if let Some(calc) = self.get(monitor_id) {
            return Ok(calc);
        }

        let fresh = Arc::new(init()?);
        let mut map = self.calculators.write().unwrap_or_else(PoisonError::into_inner);
        let calc = map.entry(monitor_id).or_insert_with(|| {
            tracing::debug!("UptimeRegistry: Created engine for monitor {}", monitor_id);
            fresh
        });
        Ok(calc.clone())
    }
}
