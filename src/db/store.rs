//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::models::*;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const HEARTBEAT_COLUMNS: &str =
    "id, monitor_id, time, end_time, status, ping, msg, duration, retries, down_count, important";

const MONITOR_COLUMNS: &str =
    "id, user_id, name, active, max_retries, upside_down, resend_interval, push_token";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn();

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        conn.execute_batch(include_str!("../../migrations/000002_maintenance_and_buckets.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 2 failed: {}", e)))?;

        Ok(())
    }

    // --- Monitors ---

    /// Add a new monitor and return its ID.
    pub fn add_monitor(&self, monitor: &mut Monitor) -> Result<i64, DbError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO monitors (user_id, name, active, max_retries, upside_down, resend_interval, push_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                monitor.user_id,
                monitor.name,
                monitor.active,
                monitor.max_retries,
                monitor.upside_down,
                monitor.resend_interval,
                monitor.push_token,
            ],
        )?;
        let id = conn.last_insert_rowid();
        monitor.id = id;
        Ok(id)
    }

    /// Get a monitor by ID.
    pub fn get_monitor(&self, id: i64) -> Result<Monitor, DbError> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM monitors WHERE id = ?1", MONITOR_COLUMNS),
            params![id],
            row_to_monitor,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Look up an active monitor by its push token.
    pub fn find_active_monitor_by_token(&self, token: &str) -> Result<Option<Monitor>, DbError> {
        let conn = self.conn();
        let monitor = conn
            .query_row(
                &format!(
                    "SELECT {} FROM monitors WHERE push_token = ?1 AND active = 1",
                    MONITOR_COLUMNS
                ),
                params![token],
                row_to_monitor,
            )
            .optional()?;
        Ok(monitor)
    }

    // --- Heartbeats ---

    /// Most recent heartbeat for a monitor.
    pub fn get_previous_heartbeat(&self, monitor_id: i64) -> Result<Option<Heartbeat>, DbError> {
        self.query_one_heartbeat(
            &format!(
                "SELECT {} FROM heartbeats WHERE monitor_id = ?1 ORDER BY time DESC, id DESC LIMIT 1",
                HEARTBEAT_COLUMNS
            ),
            monitor_id,
        )
    }

    /// Most recent heartbeat flagged as important.
    pub fn get_last_important_heartbeat(&self, monitor_id: i64) -> Result<Option<Heartbeat>, DbError> {
        self.query_one_heartbeat(
            &format!(
                "SELECT {} FROM heartbeats WHERE monitor_id = ?1 AND important = 1 ORDER BY time DESC, id DESC LIMIT 1",
                HEARTBEAT_COLUMNS
            ),
            monitor_id,
        )
    }

    fn query_one_heartbeat(&self, sql: &str, monitor_id: i64) -> Result<Option<Heartbeat>, DbError> {
        let conn = self.conn();
        let row = conn
            .query_row(sql, params![monitor_id], row_to_heartbeat)
            .optional()?;
        row.transpose()
    }

    /// Heartbeats for a monitor within `[start, end)`, oldest first.
    pub fn get_heartbeats(
        &self,
        monitor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Heartbeat>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM heartbeats WHERE monitor_id = ?1 AND time >= ?2 AND time < ?3 ORDER BY time ASC, id ASC",
            HEARTBEAT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![monitor_id, format_db_time(start), format_db_time(end)],
                row_to_heartbeat,
            )?
            .collect::<SqlResult<Vec<_>>>()?;
        rows.into_iter().collect()
    }

    /// Append a heartbeat together with the uptime buckets it changed.
    ///
    /// Both writes share one transaction so a failed append leaves no partial bucket rows.
    pub fn record_heartbeat(&self, hb: &Heartbeat, buckets: &[StoredBucket]) -> Result<i64, DbError> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO heartbeats (monitor_id, time, end_time, status, ping, msg, duration, retries, down_count, important)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                hb.monitor_id,
                format_db_time(hb.time),
                format_db_time(hb.end_time),
                hb.status.code(),
                hb.ping,
                hb.msg,
                hb.duration,
                hb.retries,
                hb.down_count,
                hb.important,
            ],
        )?;
        let id = tx.last_insert_rowid();
        upsert_buckets(&tx, buckets)?;

        tx.commit()?;
        Ok(id)
    }

    /// Delete heartbeats older than the cutoff. Returns the number of rows removed.
    ///
    /// Each monitor's latest heartbeat and latest important heartbeat are kept
    /// regardless of age: classification and notification decisions read them.
    pub fn delete_heartbeats_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM heartbeats WHERE time < ?1 AND id NOT IN (
                 SELECT id FROM (
                     SELECT id, important,
                            ROW_NUMBER() OVER (PARTITION BY monitor_id ORDER BY time DESC, id DESC) AS latest,
                            ROW_NUMBER() OVER (PARTITION BY monitor_id, important ORDER BY time DESC, id DESC) AS latest_flagged
                     FROM heartbeats
                 )
                 WHERE latest = 1 OR (important = 1 AND latest_flagged = 1)
             )",
            params![format_db_time(cutoff)],
        )?;
        Ok(n)
    }

    /// Filtered, paginated heartbeat listing across monitors, newest first.
    pub fn report(&self, filter: &ReportFilter) -> Result<Report, DbError> {
        let mut clauses = String::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(id) = filter.heartbeat_id {
            clauses.push_str(" AND heartbeats.id = ?");
            values.push(Value::Integer(id));
        }
        if let Some(name) = &filter.name {
            clauses.push_str(" AND monitors.name LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(name)));
        }
        if let Some(message) = &filter.message {
            clauses.push_str(" AND heartbeats.msg LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(message)));
        }
        if let Some(duration) = filter.duration {
            clauses.push_str(" AND heartbeats.duration = ?");
            values.push(Value::Integer(duration));
        }
        if let Some(status) = filter.status {
            clauses.push_str(" AND heartbeats.status = ?");
            values.push(Value::Integer(status.code()));
        }
        if let Some(active) = filter.active {
            clauses.push_str(" AND monitors.active = ?");
            values.push(Value::Integer(active as i64));
        }
        if let Some(retries) = filter.retries {
            clauses.push_str(" AND heartbeats.retries = ?");
            values.push(Value::Integer(retries as i64));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            clauses.push_str(" AND heartbeats.time BETWEEN ? AND ?");
            values.push(Value::Text(format_db_time(from)));
            values.push(Value::Text(format_db_time(to)));
        }

        let base = format!(
            "FROM heartbeats INNER JOIN monitors ON heartbeats.monitor_id = monitors.id WHERE 1 = 1{}",
            clauses
        );

        let conn = self.conn();
        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) {}", base),
            params_from_iter(values.iter()),
            |r| r.get(0),
        )?;

        // SQLite treats a negative LIMIT as no limit.
        let limit = filter.limit.map_or(-1, i64::from);
        let offset = filter.limit.map_or(0, |l| i64::from(filter.page.max(1) - 1) * i64::from(l));
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&format!(
            "SELECT heartbeats.id, monitors.name, heartbeats.msg, heartbeats.time, heartbeats.duration,
                    heartbeats.status, monitors.active, heartbeats.retries
             {} ORDER BY heartbeats.id DESC LIMIT ? OFFSET ?",
            base
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let time_str: String = row.get(3)?;
                let code: i64 = row.get(5)?;
                let item = match (parse_db_time(&time_str), Status::from_code(code)) {
                    (Some(time), Some(status)) => Ok(ReportItem {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        msg: row.get(2)?,
                        time,
                        duration: row.get(4)?,
                        status,
                        active: row.get(6)?,
                        retries: row.get(7)?,
                    }),
                    _ => Err(DbError::Corrupt(format!(
                        "bad report row: time={} status={}",
                        time_str, code
                    ))),
                };
                Ok(item)
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(Report {
            items: rows.into_iter().collect::<Result<Vec<_>, _>>()?,
            total_count,
        })
    }

    // --- Maintenance ---

    pub fn add_maintenance_window(&self, window: &mut MaintenanceWindow) -> Result<i64, DbError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO maintenance_windows (monitor_id, start_time, end_time) VALUES (?1, ?2, ?3)",
            params![
                window.monitor_id,
                format_db_time(window.start),
                format_db_time(window.end),
            ],
        )?;
        let id = conn.last_insert_rowid();
        window.id = id;
        Ok(id)
    }

    /// Whether `at` falls inside any maintenance window of the monitor.
    pub fn is_under_maintenance(&self, monitor_id: i64, at: DateTime<Utc>) -> Result<bool, DbError> {
        let conn = self.conn();
        let at = format_db_time(at);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM maintenance_windows WHERE monitor_id = ?1 AND start_time <= ?2 AND end_time > ?2",
            params![monitor_id, at],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    // --- Uptime buckets ---

    /// Insert or replace bucket rows.
    pub fn save_buckets(&self, buckets: &[StoredBucket]) -> Result<(), DbError> {
        if buckets.is_empty() {
            return Ok(());
        }

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        upsert_buckets(&tx, buckets)?;
        tx.commit()?;
        Ok(())
    }

    /// Load bucket rows of one resolution starting at or after `since`.
    pub fn load_buckets(
        &self,
        monitor_id: i64,
        window_seconds: i64,
        since: i64,
    ) -> Result<Vec<StoredBucket>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT monitor_id, window_seconds, start, up_seconds, down_seconds, maintenance_seconds, ping_sum, ping_count
             FROM uptime_buckets
             WHERE monitor_id = ?1 AND window_seconds = ?2 AND start >= ?3
             ORDER BY start ASC",
        )?;
        let buckets = stmt
            .query_map(params![monitor_id, window_seconds, since], |row| {
                Ok(StoredBucket {
                    monitor_id: row.get(0)?,
                    window_seconds: row.get(1)?,
                    start: row.get(2)?,
                    up_seconds: row.get(3)?,
                    down_seconds: row.get(4)?,
                    maintenance_seconds: row.get(5)?,
                    ping_sum: row.get(6)?,
                    ping_count: row.get(7)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(buckets)
    }

    /// Delete buckets of one resolution starting before `cutoff` (unix seconds).
    pub fn delete_buckets_before(&self, window_seconds: i64, cutoff: i64) -> Result<usize, DbError> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM uptime_buckets WHERE window_seconds = ?1 AND start < ?2",
            params![window_seconds, cutoff],
        )?;
        Ok(n)
    }
}

fn upsert_buckets(conn: &Connection, buckets: &[StoredBucket]) -> Result<(), DbError> {
    let mut stmt = conn.prepare(
        "INSERT INTO uptime_buckets (monitor_id, window_seconds, start, up_seconds, down_seconds, maintenance_seconds, ping_sum, ping_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(monitor_id, window_seconds, start) DO UPDATE SET
         up_seconds=excluded.up_seconds, down_seconds=excluded.down_seconds,
         maintenance_seconds=excluded.maintenance_seconds,
         ping_sum=excluded.ping_sum, ping_count=excluded.ping_count",
    )?;

    for b in buckets {
        stmt.execute(params![
            b.monitor_id,
            b.window_seconds,
            b.start,
            b.up_seconds,
            b.down_seconds,
            b.maintenance_seconds,
            b.ping_sum,
            b.ping_count,
        ])?;
    }
    Ok(())
}

fn row_to_monitor(row: &Row<'_>) -> SqlResult<Monitor> {
    Ok(Monitor {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        active: row.get(3)?,
        max_retries: row.get(4)?,
        upside_down: row.get(5)?,
        resend_interval: row.get(6)?,
        push_token: row.get(7)?,
    })
}

// Decoding failures of our own columns are surfaced as DbError::Corrupt rather than
// silently replaced, so the outer Result carries them.
fn row_to_heartbeat(row: &Row<'_>) -> SqlResult<Result<Heartbeat, DbError>> {
    let time_str: String = row.get(2)?;
    let end_str: String = row.get(3)?;
    let code: i64 = row.get(4)?;

    let (Some(time), Some(end_time)) = (parse_db_time(&time_str), parse_db_time(&end_str)) else {
        return Ok(Err(DbError::Corrupt(format!("bad heartbeat time: {}", time_str))));
    };
    let Some(status) = Status::from_code(code) else {
        return Ok(Err(DbError::Corrupt(format!("bad heartbeat status: {}", code))));
    };

    Ok(Ok(Heartbeat {
        id: row.get(0)?,
        monitor_id: row.get(1)?,
        time,
        end_time,
        status,
        ping: row.get(5)?,
        msg: row.get(6)?,
        duration: row.get(7)?,
        retries: row.get(8)?,
        down_count: row.get(9)?,
        important: row.get(10)?,
    }))
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn test_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    fn beat(monitor_id: i64, time: DateTime<Utc>, status: Status, important: bool) -> Heartbeat {
        Heartbeat {
            id: 0,
            monitor_id,
            time,
            end_time: time,
            status,
            ping: Some(12.5),
            msg: "OK".to_string(),
            duration: 0,
            retries: 0,
            down_count: 0,
            important,
        }
    }

    #[test]
    fn test_monitor_lookup() {
        let (_tmp, store) = test_store();

        let mut monitor = Monitor {
            name: "api".to_string(),
            push_token: "tok-1".to_string(),
            max_retries: 3,
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();
        assert!(id > 0);

        let fetched = store.get_monitor(id).unwrap();
        assert_eq!(fetched.name, "api");
        assert_eq!(fetched.max_retries, 3);

        assert!(store.find_active_monitor_by_token("tok-1").unwrap().is_some());
        assert!(store.find_active_monitor_by_token("nope").unwrap().is_none());
        assert!(matches!(store.get_monitor(id + 100), Err(DbError::NotFound)));
    }

    #[test]
    fn test_inactive_monitor_hidden_from_push_lookup() {
        let (_tmp, store) = test_store();
        let mut monitor = Monitor {
            name: "paused".to_string(),
            push_token: "tok-paused".to_string(),
            active: false,
            ..Default::default()
        };
        store.add_monitor(&mut monitor).unwrap();
        assert!(store.find_active_monitor_by_token("tok-paused").unwrap().is_none());
    }

    #[test]
    fn test_previous_and_last_important_heartbeat() {
        let (_tmp, store) = test_store();
        let mut monitor = Monitor {
            push_token: "t".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        assert!(store.get_previous_heartbeat(id).unwrap().is_none());

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        store.record_heartbeat(&beat(id, t0, Status::Up, true), &[]).unwrap();
        store
            .record_heartbeat(&beat(id, t0 + Duration::seconds(60), Status::Up, false), &[])
            .unwrap();

        let prev = store.get_previous_heartbeat(id).unwrap().unwrap();
        assert_eq!(prev.time, t0 + Duration::seconds(60));
        assert!(!prev.important);
        assert_eq!(prev.ping, Some(12.5));

        let important = store.get_last_important_heartbeat(id).unwrap().unwrap();
        assert_eq!(important.time, t0);

        let all = store.get_heartbeats(id, t0, t0 + Duration::hours(1)).unwrap();
        assert_eq!(all.len(), 2);

        // The only important beat is also the latest important one, so it survives.
        assert_eq!(store.delete_heartbeats_before(t0 + Duration::seconds(30)).unwrap(), 0);
    }

    #[test]
    fn test_purge_keeps_latest_and_latest_important() {
        let (_tmp, store) = test_store();
        let mut monitor = Monitor {
            push_token: "t".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let at = |m: i64| t0 + Duration::minutes(m);
        store.record_heartbeat(&beat(id, at(0), Status::Up, true), &[]).unwrap();
        store.record_heartbeat(&beat(id, at(1), Status::Down, true), &[]).unwrap();
        store.record_heartbeat(&beat(id, at(2), Status::Down, false), &[]).unwrap();
        store.record_heartbeat(&beat(id, at(3), Status::Down, false), &[]).unwrap();

        // Everything is older than the cutoff; only the minute-1 and minute-3 rows stay.
        assert_eq!(store.delete_heartbeats_before(at(60)).unwrap(), 2);

        let left = store.get_heartbeats(id, t0, at(60)).unwrap();
        let times: Vec<_> = left.iter().map(|h| h.time).collect();
        assert_eq!(times, vec![at(1), at(3)]);
        assert_eq!(store.get_last_important_heartbeat(id).unwrap().unwrap().status, Status::Down);
    }

    #[test]
    fn test_report_filters_and_pages() {
        let (_tmp, store) = test_store();
        let mut api = Monitor {
            name: "api_gateway".to_string(),
            push_token: "a".to_string(),
            ..Default::default()
        };
        let api_id = store.add_monitor(&mut api).unwrap();
        let mut db = Monitor {
            name: "database".to_string(),
            push_token: "d".to_string(),
            active: false,
            ..Default::default()
        };
        let db_id = store.add_monitor(&mut db).unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..5 {
            let status = if i == 2 { Status::Down } else { Status::Up };
            let mut hb = beat(api_id, t0 + Duration::minutes(i), status, false);
            hb.msg = format!("api check {}", i);
            store.record_heartbeat(&hb, &[]).unwrap();
        }
        let mut hb = beat(db_id, t0 + Duration::minutes(10), Status::Down, true);
        hb.msg = "100% disk".to_string();
        store.record_heartbeat(&hb, &[]).unwrap();

        let all = store
            .report(&ReportFilter {
                limit: None,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.total_count, 6);
        assert_eq!(all.items.len(), 6);
        assert_eq!(all.items[0].name, "database");
        assert!(!all.items[0].active);

        let page = store
            .report(&ReportFilter {
                limit: Some(2),
                page: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, 6);
        let msgs: Vec<_> = page.items.iter().map(|i| i.msg.as_str()).collect();
        assert_eq!(msgs, vec!["api check 3", "api check 2"]);

        let down = store
            .report(&ReportFilter {
                status: Some(Status::Down),
                name: Some("api".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(down.total_count, 1);
        assert_eq!(down.items[0].msg, "api check 2");

        // LIKE wildcards in the needle are matched literally.
        let literal = store
            .report(&ReportFilter {
                message: Some("0%".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(literal.total_count, 1);
        let underscore = store
            .report(&ReportFilter {
                name: Some("i_g".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(underscore.total_count, 5);
        let no_wildcard = store
            .report(&ReportFilter {
                name: Some("a_a".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(no_wildcard.total_count, 0);

        let windowed = store
            .report(&ReportFilter {
                from: Some(t0 + Duration::minutes(1)),
                to: Some(t0 + Duration::minutes(3)),
                active: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(windowed.total_count, 3);
    }

    #[test]
    fn test_maintenance_window() {
        let (_tmp, store) = test_store();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut window = MaintenanceWindow {
            id: 0,
            monitor_id: 7,
            start: t0,
            end: t0 + Duration::hours(1),
        };
        store.add_maintenance_window(&mut window).unwrap();

        assert!(store.is_under_maintenance(7, t0 + Duration::minutes(30)).unwrap());
        assert!(!store.is_under_maintenance(7, t0 + Duration::hours(1)).unwrap());
        assert!(!store.is_under_maintenance(8, t0 + Duration::minutes(30)).unwrap());
    }

    #[test]
    fn test_bucket_upsert_and_trim() {
        let (_tmp, store) = test_store();
        let mut bucket = StoredBucket {
            monitor_id: 1,
            window_seconds: 60,
            start: 120,
            up_seconds: 30.0,
            down_seconds: 0.0,
            maintenance_seconds: 0.0,
            ping_sum: 0.0,
            ping_count: 0.0,
        };
        store.save_buckets(&[bucket.clone()]).unwrap();
        bucket.up_seconds = 60.0;
        store.save_buckets(&[bucket.clone()]).unwrap();

        let loaded = store.load_buckets(1, 60, 0).unwrap();
        assert_eq!(loaded, vec![bucket]);

        assert_eq!(store.delete_buckets_before(60, 180).unwrap(), 1);
        assert!(store.load_buckets(1, 60, 0).unwrap().is_empty());
    }
}
