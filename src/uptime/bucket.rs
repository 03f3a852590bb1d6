//! Bucket resolutions and per-bucket accumulators.

use crate::db::{Status, StoredBucket};

/// Fixed UTC bucket widths the engine keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Minute,
    Hour,
    Day,
}

impl Resolution {
    /// Finest first.
    pub const ALL: [Resolution; 3] = [Resolution::Minute, Resolution::Hour, Resolution::Day];

    pub fn seconds(self) -> i64 {
        match self {
            Resolution::Minute => 60,
            Resolution::Hour => 3_600,
            Resolution::Day => 86_400,
        }
    }

    /// How long buckets of this width are kept.
    pub fn retention_seconds(self) -> i64 {
        match self {
            Resolution::Minute => 24 * 3_600,
            Resolution::Hour => 30 * 86_400,
            Resolution::Day => 365 * 86_400,
        }
    }

    pub fn finer(self) -> Option<Resolution> {
        match self {
            Resolution::Minute => None,
            Resolution::Hour => Some(Resolution::Minute),
            Resolution::Day => Some(Resolution::Hour),
        }
    }

    pub fn from_seconds(seconds: i64) -> Option<Resolution> {
        Resolution::ALL.into_iter().find(|r| r.seconds() == seconds)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Resolution::Minute => 0,
            Resolution::Hour => 1,
            Resolution::Day => 2,
        }
    }

    /// Start of the bucket containing `ts` (unix seconds).
    pub fn bucket_start(self, ts: i64) -> i64 {
        ts - ts.rem_euclid(self.seconds())
    }
}

/// Seconds and ping totals accumulated for one time slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UptimeBucket {
    pub up_seconds: f64,
    pub down_seconds: f64,
    pub maintenance_seconds: f64,
    pub ping_sum: f64,
    pub ping_count: f64,
}

impl UptimeBucket {
    /// Credit `seconds` of `status` to this bucket.
    ///
    /// `weight` is the share of the heartbeat's span that falls in this bucket;
    /// a ping contributes that share to the sum and count.
    pub fn credit(&mut self, status: Status, seconds: f64, ping: Option<f64>, weight: f64) {
        match status {
            Status::Up => self.up_seconds += seconds,
            // A monitor waiting on retries is not available.
            Status::Down | Status::Pending => self.down_seconds += seconds,
            Status::Maintenance => self.maintenance_seconds += seconds,
        }

        if let Some(ping) = ping {
            self.ping_sum += ping * weight;
            self.ping_count += weight;
        }
    }

    pub fn merge(&mut self, other: &UptimeBucket) {
        self.up_seconds += other.up_seconds;
        self.down_seconds += other.down_seconds;
        self.maintenance_seconds += other.maintenance_seconds;
        self.ping_sum += other.ping_sum;
        self.ping_count += other.ping_count;
    }

    pub fn scaled(&self, factor: f64) -> UptimeBucket {
        UptimeBucket {
            up_seconds: self.up_seconds * factor,
            down_seconds: self.down_seconds * factor,
            maintenance_seconds: self.maintenance_seconds * factor,
            ping_sum: self.ping_sum * factor,
            ping_count: self.ping_count * factor,
        }
    }

    pub fn total_seconds(&self) -> f64 {
        self.up_seconds + self.down_seconds + self.maintenance_seconds
    }
}

impl From<&StoredBucket> for UptimeBucket {
    fn from(row: &StoredBucket) -> Self {
        Self {
            up_seconds: row.up_seconds,
            down_seconds: row.down_seconds,
            maintenance_seconds: row.maintenance_seconds,
            ping_sum: row.ping_sum,
            ping_count: row.ping_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_start() {
        // 2024-01-01 12:34:56 UTC
        let ts = 1_704_112_496;
        assert_eq!(Resolution::Minute.bucket_start(ts), 1_704_112_440);
        assert_eq!(Resolution::Hour.bucket_start(ts), 1_704_110_400);
        assert_eq!(Resolution::Day.bucket_start(ts), 1_704_067_200);
        assert_eq!(Resolution::Minute.bucket_start(-1), -60);
    }

    #[test]
    fn test_pending_counts_as_down() {
        let mut b = UptimeBucket::default();
        b.credit(Status::Pending, 30.0, None, 1.0);
        b.credit(Status::Up, 10.0, Some(100.0), 0.5);
        b.credit(Status::Maintenance, 5.0, None, 1.0);
        assert_eq!(b.down_seconds, 30.0);
        assert_eq!(b.up_seconds, 10.0);
        assert_eq!(b.maintenance_seconds, 5.0);
        assert_eq!(b.ping_sum, 50.0);
        assert_eq!(b.ping_count, 0.5);
        assert_eq!(b.total_seconds(), 45.0);
    }

    #[test]
    fn test_resolution_lookup() {
        assert_eq!(Resolution::from_seconds(3_600), Some(Resolution::Hour));
        assert_eq!(Resolution::from_seconds(300), None);
        assert_eq!(Resolution::Day.finer(), Some(Resolution::Hour));
        assert_eq!(Resolution::Minute.finer(), None);
    }
}
