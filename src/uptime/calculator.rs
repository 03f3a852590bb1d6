//! Per-monitor incremental uptime statistics.
//!
//! Each heartbeat credits the time since the previous one to its status. The
//! span is split across minute, hour and day buckets at once, so every
//! resolution is complete on its own and coarse buckets never depend on a later
//! rollup pass. Queries sum buckets instead of replaying heartbeats.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::bucket::{Resolution, UptimeBucket};
use crate::db::{Status, StoredBucket};
use crate::error::{Error, Result};

/// Span credited to a monitor's very first heartbeat.
pub const DEFAULT_SPAN_SECONDS: i64 = 60;

/// Result of recording one heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeUpdate {
    /// Authoritative end of the credited span. Stored as the heartbeat's end time.
    pub end_time: DateTime<Utc>,
    /// Seconds credited by this update (0 for duplicate or out-of-order pushes).
    pub credited_seconds: f64,
    /// Current values of every bucket the update changed.
    pub changed: Vec<StoredBucket>,
    base_end_ms: Option<i64>,
    advances: bool,
}

/// Aggregated statistics for a query window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UptimeData {
    /// Fraction of up time in `[0, 1]`; maintenance is excluded.
    pub uptime: f64,
    /// Mean response time in milliseconds, if any UP beat carried one.
    pub avg_ping: Option<f64>,
    pub up_seconds: f64,
    pub down_seconds: f64,
    pub maintenance_seconds: f64,
}

#[derive(Debug, Default)]
struct State {
    levels: [BTreeMap<i64, UptimeBucket>; 3],
    /// Earliest bucket start still retained per level after the last trim.
    floors: [Option<i64>; 3],
    last_end_ms: Option<i64>,
}

/// Uptime engine for a single monitor.
#[derive(Debug)]
pub struct UptimeCalculator {
    monitor_id: i64,
    state: RwLock<State>,
}

impl UptimeCalculator {
    pub fn new(monitor_id: i64) -> Self {
        Self {
            monitor_id,
            state: RwLock::new(State::default()),
        }
    }

    /// Rebuild an engine from persisted buckets.
    ///
    /// Rows with an unknown window size or for another monitor are ignored.
    pub fn restore(monitor_id: i64, last_end: Option<DateTime<Utc>>, rows: Vec<StoredBucket>) -> Self {
        let mut state = State {
            last_end_ms: last_end.map(|t| t.timestamp_millis()),
            ..State::default()
        };

        for row in rows.into_iter().filter(|r| r.monitor_id == monitor_id) {
            let Some(res) = Resolution::from_seconds(row.window_seconds) else {
                tracing::warn!(
                    "UptimeCalculator: Skipping bucket with unknown window {}s for monitor {}",
                    row.window_seconds,
                    monitor_id
                );
                continue;
            };
            state.levels[res.index()].insert(res.bucket_start(row.start), UptimeBucket::from(&row));
        }

        if let Some(end_ms) = state.last_end_ms {
            trim(&mut state, end_ms);
        }

        Self {
            monitor_id,
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// End of the most recently credited span.
    pub fn last_end_time(&self) -> Option<DateTime<Utc>> {
        self.read().last_end_ms.and_then(from_millis)
    }

    /// Stage one heartbeat's contribution ending at `at` without applying it.
    ///
    /// The span since the previous end time (or [`DEFAULT_SPAN_SECONDS`] for the
    /// first beat) is credited to `status`. A push at or before the previous end
    /// time credits nothing, which makes re-ingesting the same heartbeat harmless.
    /// Pings only count for UP beats. The engine is unchanged until the returned
    /// update is passed to [`commit`](Self::commit).
    pub fn prepare_update(&self, status: Status, ping: Option<f64>, at: DateTime<Utc>) -> UptimeUpdate {
        let at_ms = at.timestamp_millis();
        let state = self.read();
        let base_end_ms = state.last_end_ms;

        let start_ms = match base_end_ms {
            Some(end_ms) if at_ms <= end_ms => {
                tracing::debug!(
                    "UptimeCalculator: Ignoring non-advancing beat for monitor {} ({} <= {})",
                    self.monitor_id,
                    at_ms,
                    end_ms
                );
                return UptimeUpdate {
                    end_time: from_millis(end_ms).unwrap_or(at),
                    credited_seconds: 0.0,
                    changed: Vec::new(),
                    base_end_ms,
                    advances: false,
                };
            }
            Some(end_ms) => end_ms,
            None => at_ms - DEFAULT_SPAN_SECONDS * 1000,
        };

        let span_ms = at_ms - start_ms;
        let ping = ping.filter(|p| status == Status::Up && p.is_finite() && *p >= 0.0);
        let mut changed = Vec::new();

        for res in Resolution::ALL {
            let width_ms = res.seconds() * 1000;
            // Anything older than the retention horizon would be trimmed right away.
            let horizon_ms = res.bucket_start(at_ms.div_euclid(1000) - res.retention_seconds()) * 1000;
            let mut cursor = start_ms.max(horizon_ms);
            let level = &state.levels[res.index()];

            while cursor < at_ms {
                let bucket_start_ms = cursor - cursor.rem_euclid(width_ms);
                let segment_end = (bucket_start_ms + width_ms).min(at_ms);
                let segment_ms = segment_end - cursor;
                let weight = segment_ms as f64 / span_ms as f64;

                let key = bucket_start_ms / 1000;
                let mut bucket = level.get(&key).copied().unwrap_or_default();
                bucket.credit(status, segment_ms as f64 / 1000.0, ping, weight);
                changed.push(self.stored(res, key, &bucket));

                cursor = segment_end;
            }
        }

        UptimeUpdate {
            end_time: at,
            credited_seconds: span_ms as f64 / 1000.0,
            changed,
            base_end_ms,
            advances: true,
        }
    }

    /// Apply a staged update.
    ///
    /// Returns `false` and leaves the engine untouched when another update was
    /// committed after this one was prepared.
    pub fn commit(&self, update: &UptimeUpdate) -> bool {
        if !update.advances {
            return true;
        }

        let mut state = self.write();
        if state.last_end_ms != update.base_end_ms {
            tracing::warn!(
                "UptimeCalculator: Dropping stale update for monitor {} (staged against {:?}, now {:?})",
                self.monitor_id,
                update.base_end_ms,
                state.last_end_ms
            );
            return false;
        }

        for row in &update.changed {
            if let Some(res) = Resolution::from_seconds(row.window_seconds) {
                state.levels[res.index()].insert(row.start, UptimeBucket::from(row));
            }
        }

        let end_ms = update.end_time.timestamp_millis();
        state.last_end_ms = Some(end_ms);
        trim(&mut state, end_ms);
        true
    }

    /// Uptime and average ping over `[now - seconds, now]`.
    ///
    /// Returns [`Error::NoData`] when the window holds no up or down time.
    pub fn get_data_by_duration(&self, seconds: u64, now: DateTime<Utc>) -> Result<UptimeData> {
        let state = self.read();
        let Some(last_end_ms) = state.last_end_ms else {
            return Err(Error::NoData);
        };

        let end_ms = now.timestamp_millis();
        let span_ms = i64::try_from(seconds)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .ok_or_else(|| Error::InvalidInput(format!("duration out of range: {}s", seconds)))?;
        let start_ms = end_ms.saturating_sub(span_ms);

        let query = Query {
            state: &*state,
            last_end_ms,
        };
        let level = Resolution::ALL
            .into_iter()
            .find(|r| query.retained(*r, start_ms))
            .unwrap_or(Resolution::Day);
        let total = query.collect(level, start_ms, end_ms);

        let counted = total.up_seconds + total.down_seconds;
        if counted <= 0.0 {
            return Err(Error::NoData);
        }

        Ok(UptimeData {
            uptime: (total.up_seconds / counted).clamp(0.0, 1.0),
            avg_ping: (total.ping_count > 0.0).then(|| total.ping_sum / total.ping_count),
            up_seconds: total.up_seconds,
            down_seconds: total.down_seconds,
            maintenance_seconds: total.maintenance_seconds,
        })
    }

    fn stored(&self, res: Resolution, start: i64, b: &UptimeBucket) -> StoredBucket {
        StoredBucket {
            monitor_id: self.monitor_id,
            window_seconds: res.seconds(),
            start,
            up_seconds: b.up_seconds,
            down_seconds: b.down_seconds,
            maintenance_seconds: b.maintenance_seconds,
            ping_sum: b.ping_sum,
            ping_count: b.ping_count,
        }
    }
}

/// Drop buckets that fell out of each level's retention.
fn trim(state: &mut State, now_ms: i64) {
    let now = now_ms.div_euclid(1000);
    for res in Resolution::ALL {
        let cutoff = res.bucket_start(now - res.retention_seconds());
        let idx = res.index();
        state.levels[idx] = state.levels[idx].split_off(&cutoff);
        state.floors[idx] = Some(state.floors[idx].map_or(cutoff, |f| f.max(cutoff)));
    }
}

struct Query<'a> {
    state: &'a State,
    last_end_ms: i64,
}

impl Query<'_> {
    /// Whether `res` still holds complete data from `at_ms` onward.
    fn retained(&self, res: Resolution, at_ms: i64) -> bool {
        self.state.floors[res.index()].map_or(true, |floor| at_ms >= floor * 1000)
    }

    /// Sum `[a, b)` at `res`, refining partial buckets where finer data exists.
    fn collect(&self, res: Resolution, a: i64, b: i64) -> UptimeBucket {
        let mut sum = UptimeBucket::default();
        if a >= b {
            return sum;
        }

        let width = res.seconds() * 1000;
        let first_full = ceil_to(a, width);
        let last_full = b - b.rem_euclid(width);

        if first_full > last_full {
            return self.partial(res, a, b);
        }

        sum.merge(&self.partial(res, a, first_full));
        if first_full < last_full {
            let level = &self.state.levels[res.index()];
            for bucket in level.range(first_full / 1000..last_full / 1000).map(|(_, v)| v) {
                sum.merge(bucket);
            }
        }
        sum.merge(&self.partial(res, last_full, b));
        sum
    }

    /// `[a, b)` lies inside one bucket of `res`.
    fn partial(&self, res: Resolution, a: i64, b: i64) -> UptimeBucket {
        if a >= b {
            return UptimeBucket::default();
        }

        if let Some(finer) = res.finer() {
            if self.retained(finer, a) {
                return self.collect(finer, a, b);
            }
        }

        let width = res.seconds() * 1000;
        let bucket_start = a - a.rem_euclid(width);
        let Some(bucket) = self.state.levels[res.index()].get(&(bucket_start / 1000)) else {
            return UptimeBucket::default();
        };

        // Recorded time in a bucket never extends past the last credited end.
        let covered_end = (bucket_start + width).min(self.last_end_ms);
        let covered = covered_end - bucket_start;
        let overlap = b.min(covered_end) - a;
        if covered <= 0 || overlap <= 0 {
            return UptimeBucket::default();
        }

        bucket.scaled((overlap as f64 / covered as f64).clamp(0.0, 1.0))
    }
}

fn ceil_to(value: i64, width: i64) -> i64 {
    let rem = value.rem_euclid(width);
    if rem == 0 {
        value
    } else {
        value - rem + width
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
