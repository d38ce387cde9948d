//! Reconciliation store
//!
//! SQLite-backed store that exclusively owns all persisted schedule state.
//! Schedule rows are keyed `(queue, day_date)`, daily messages by
//! `day_date`, and a key/value metadata table holds last-scrape
//! bookkeeping. `apply_snapshot` is the sole write path: one transaction
//! replaces everything stored for a date and updates `last_scrape`, so
//! readers observe either the previous or the new publication for that
//! date, never a mixture across queues.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    ClockTime, IngestHealth, IntervalKind, QueueId, ScheduleEntry, TimeInterval, TOTAL_QUEUES,
};

const META_LAST_SCRAPE: &str = "last_scrape";
const META_SOURCE_HASH: &str = "source_hash";

/// SQLite store for outage schedules
///
/// Uses a `Mutex` to ensure thread-safety for the SQLite connection; every
/// operation is short and touches local storage only.
pub struct OutageStore {
    conn: Mutex<Connection>,
}

impl OutageStore {
    /// Open (or create) the store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode lets read queries proceed during the apply transaction.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        info!(path = %path.display(), "outage store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                day_date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'base'
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_date
                ON schedules(day_date);

            CREATE INDEX IF NOT EXISTS idx_schedules_queue_date
                ON schedules(queue, day_date);

            CREATE TABLE IF NOT EXISTS daily_messages (
                day_date TEXT PRIMARY KEY,
                message TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Atomically replace everything stored for one date
    ///
    /// Deletes the date's schedule rows and message, inserts the new
    /// snapshot and updates `last_scrape`, all in a single transaction.
    pub fn apply_snapshot(
        &self,
        date: NaiveDate,
        entries: &BTreeMap<QueueId, Vec<TimeInterval>>,
        message: Option<&str>,
        scraped_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let date_str = date.to_string();

        tx.execute("DELETE FROM schedules WHERE day_date = ?1", params![date_str])?;
        tx.execute(
            "DELETE FROM daily_messages WHERE day_date = ?1",
            params![date_str],
        )?;

        let mut rows = 0usize;
        for (queue, intervals) in entries {
            for iv in intervals {
                tx.execute(
                    "INSERT INTO schedules (queue, day_date, start_time, end_time, kind)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        queue.to_string(),
                        date_str,
                        iv.start.to_string(),
                        iv.end.to_string(),
                        iv.kind.as_str()
                    ],
                )?;
                rows += 1;
            }
        }

        if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
            tx.execute(
                "INSERT INTO daily_messages (day_date, message) VALUES (?1, ?2)",
                params![date_str, message],
            )?;
        }

        upsert_metadata(&tx, META_LAST_SCRAPE, &scraped_at.to_rfc3339())?;
        tx.commit()?;

        debug!(date = %date, queues = entries.len(), rows, "snapshot applied");
        Ok(())
    }

    /// Stored entry for one queue and date; `None` when nothing is stored
    pub fn entry(&self, queue: QueueId, date: NaiveDate) -> Result<Option<ScheduleEntry>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT start_time, end_time, kind FROM schedules
             WHERE queue = ?1 AND day_date = ?2
             ORDER BY start_time",
        )?;

        let intervals = stmt
            .query_map(params![queue.to_string(), date.to_string()], row_interval)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if intervals.is_empty() {
            return Ok(None);
        }

        Ok(Some(ScheduleEntry {
            queue,
            date,
            intervals,
            message: message_locked(&conn, date)?,
            last_updated: last_scrape_locked(&conn)?,
        }))
    }

    /// All stored entries for a date, ordered by queue
    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<ScheduleEntry>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT queue, start_time, end_time, kind FROM schedules
             WHERE day_date = ?1
             ORDER BY queue, start_time",
        )?;

        let rows = stmt
            .query_map(params![date.to_string()], |row| {
                let queue: String = row.get(0)?;
                let iv = row_interval_at(row, 1)?;
                Ok((queue, iv))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let message = message_locked(&conn, date)?;
        let last_updated = last_scrape_locked(&conn)?;
        drop(stmt);
        drop(conn);

        let mut by_queue: BTreeMap<QueueId, Vec<TimeInterval>> = BTreeMap::new();
        for (queue, iv) in rows {
            let queue: QueueId = queue
                .parse()
                .map_err(|_| Error::Config(format!("corrupt queue id in store: {queue}")))?;
            by_queue.entry(queue).or_default().push(iv);
        }

        Ok(by_queue
            .into_iter()
            .map(|(queue, intervals)| ScheduleEntry {
                queue,
                date,
                intervals,
                message: message.clone(),
                last_updated,
            })
            .collect())
    }

    /// Operational message for a date
    pub fn message(&self, date: NaiveDate) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        message_locked(&conn, date)
    }

    /// All dates with at least one stored entry, most recent first
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT DISTINCT day_date FROM schedules ORDER BY day_date DESC")?;

        let dates = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        dates
            .into_iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| Error::Config(format!("corrupt date in store: {s}")))
            })
            .collect()
    }

    /// Timestamp of the last successful ingestion
    pub fn last_scrape(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        last_scrape_locked(&conn)
    }

    /// Refresh `last_scrape` without touching schedules (unchanged-content
    /// ingestion cycles)
    pub fn touch_last_scrape(&self, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        upsert_metadata(&conn, META_LAST_SCRAPE, &at.to_rfc3339())
    }

    /// Content hash of the last applied publication
    pub fn source_hash(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        metadata_locked(&conn, META_SOURCE_HASH)
    }

    pub fn set_source_hash(&self, hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        upsert_metadata(&conn, META_SOURCE_HASH, hash)
    }

    /// Ingestion health for the status endpoint
    pub fn health(&self) -> Result<IngestHealth> {
        Ok(IngestHealth {
            last_scrape: self.last_scrape()?,
            available_dates: self.list_dates()?,
            total_queues: TOTAL_QUEUES,
        })
    }
}

fn upsert_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn metadata_locked(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn last_scrape_locked(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    Ok(metadata_locked(conn, META_LAST_SCRAPE)?.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}

fn message_locked(conn: &Connection, date: NaiveDate) -> Result<Option<String>> {
    let message = conn
        .query_row(
            "SELECT message FROM daily_messages WHERE day_date = ?1",
            params![date.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(message)
}

fn row_interval(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeInterval> {
    row_interval_at(row, 0)
}

/// Rebuild an interval from `start_time, end_time, kind` columns starting
/// at the given index
fn row_interval_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<TimeInterval> {
    let corrupt = |what: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            what.into(),
        )
    };

    let start: String = row.get(idx)?;
    let end: String = row.get(idx + 1)?;
    let kind: String = row.get(idx + 2)?;

    let start =
        ClockTime::parse(&start).ok_or_else(|| corrupt(format!("bad start time: {start}")))?;
    let end = ClockTime::parse(&end).ok_or_else(|| corrupt(format!("bad end time: {end}")))?;
    let kind: IntervalKind = kind
        .parse()
        .map_err(|_| corrupt(format!("bad interval kind: {kind}")))?;

    TimeInterval::new(start, end, kind).map_err(|e| corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn iv(start: &str, end: &str) -> TimeInterval {
        TimeInterval::new(
            ClockTime::parse(start).unwrap(),
            ClockTime::parse(end).unwrap(),
            IntervalKind::Base,
        )
        .unwrap()
    }

    fn snapshot(entries: &[(&str, Vec<TimeInterval>)]) -> BTreeMap<QueueId, Vec<TimeInterval>> {
        entries
            .iter()
            .map(|(q, ivs)| (q.parse().unwrap(), ivs.clone()))
            .collect()
    }

    #[test]
    fn snapshot_roundtrip() {
        let store = OutageStore::in_memory().unwrap();
        let d = date(2026, 1, 15);
        let entries = snapshot(&[
            ("1.1", vec![iv("04:00", "09:00")]),
            ("2.1", vec![iv("06:00", "11:00"), iv("18:00", "23:00")]),
        ]);

        store
            .apply_snapshot(d, &entries, Some("тестове повідомлення"), Utc::now())
            .unwrap();

        let entry = store.entry("1.1".parse().unwrap(), d).unwrap().unwrap();
        assert_eq!(entry.intervals, vec![iv("04:00", "09:00")]);
        assert_eq!(entry.message.as_deref(), Some("тестове повідомлення"));
        assert!(entry.last_updated.is_some());

        let all = store.entries_for_date(d).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].intervals.len(), 2);
    }

    #[test]
    fn second_snapshot_fully_replaces_first() {
        let store = OutageStore::in_memory().unwrap();
        let d = date(2026, 1, 15);

        store
            .apply_snapshot(
                d,
                &snapshot(&[
                    ("1.1", vec![iv("04:00", "09:00")]),
                    ("3.1", vec![iv("08:00", "13:00")]),
                ]),
                Some("перша публікація"),
                Utc::now(),
            )
            .unwrap();

        store
            .apply_snapshot(
                d,
                &snapshot(&[("1.1", vec![iv("10:00", "12:00")])]),
                None,
                Utc::now(),
            )
            .unwrap();

        let entry = store.entry("1.1".parse().unwrap(), d).unwrap().unwrap();
        assert_eq!(entry.intervals, vec![iv("10:00", "12:00")]);

        // No residue from the first snapshot.
        assert!(store.entry("3.1".parse().unwrap(), d).unwrap().is_none());
        assert!(store.message(d).unwrap().is_none());
    }

    #[test]
    fn snapshots_for_different_dates_are_independent() {
        let store = OutageStore::in_memory().unwrap();

        store
            .apply_snapshot(
                date(2026, 1, 15),
                &snapshot(&[("1.1", vec![iv("04:00", "09:00")])]),
                None,
                Utc::now(),
            )
            .unwrap();
        store
            .apply_snapshot(
                date(2026, 1, 16),
                &snapshot(&[("1.1", vec![iv("05:00", "10:00")])]),
                None,
                Utc::now(),
            )
            .unwrap();

        let first = store.entry("1.1".parse().unwrap(), date(2026, 1, 15)).unwrap().unwrap();
        assert_eq!(first.intervals, vec![iv("04:00", "09:00")]);
    }

    #[test]
    fn list_dates_most_recent_first() {
        let store = OutageStore::in_memory().unwrap();
        for d in [date(2026, 1, 15), date(2026, 1, 17), date(2026, 1, 16)] {
            store
                .apply_snapshot(
                    d,
                    &snapshot(&[("1.1", vec![iv("04:00", "09:00")])]),
                    None,
                    Utc::now(),
                )
                .unwrap();
        }

        assert_eq!(
            store.list_dates().unwrap(),
            vec![date(2026, 1, 17), date(2026, 1, 16), date(2026, 1, 15)]
        );
    }

    #[test]
    fn missing_entry_is_none_not_error() {
        let store = OutageStore::in_memory().unwrap();
        let entry = store.entry("1.1".parse().unwrap(), date(2020, 1, 1)).unwrap();
        assert!(entry.is_none());
        assert!(store.entries_for_date(date(2020, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn day_boundary_interval_roundtrips() {
        let store = OutageStore::in_memory().unwrap();
        let d = date(2026, 1, 15);

        store
            .apply_snapshot(
                d,
                &snapshot(&[("1.1", vec![iv("22:00", "24:00")])]),
                None,
                Utc::now(),
            )
            .unwrap();

        let entry = store.entry("1.1".parse().unwrap(), d).unwrap().unwrap();
        assert_eq!(entry.intervals[0].end, ClockTime::END_OF_DAY);
    }

    #[test]
    fn metadata_roundtrip() {
        let store = OutageStore::in_memory().unwrap();
        assert!(store.last_scrape().unwrap().is_none());
        assert!(store.source_hash().unwrap().is_none());

        let at = Utc::now();
        store.touch_last_scrape(at).unwrap();
        store.set_source_hash("abc123").unwrap();

        let stored = store.last_scrape().unwrap().unwrap();
        assert_eq!(stored.timestamp(), at.timestamp());
        assert_eq!(store.source_hash().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn health_reports_dates_and_queue_count() {
        let store = OutageStore::in_memory().unwrap();
        store
            .apply_snapshot(
                date(2026, 1, 15),
                &snapshot(&[("1.1", vec![iv("04:00", "09:00")])]),
                None,
                Utc::now(),
            )
            .unwrap();

        let health = store.health().unwrap();
        assert_eq!(health.total_queues, 12);
        assert_eq!(health.available_dates, vec![date(2026, 1, 15)]);
        assert!(health.last_scrape.is_some());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outages.db");
        let d = date(2026, 1, 15);

        {
            let store = OutageStore::open(&path).unwrap();
            store
                .apply_snapshot(
                    d,
                    &snapshot(&[("1.1", vec![iv("04:00", "09:00")])]),
                    None,
                    Utc::now(),
                )
                .unwrap();
        }

        let store = OutageStore::open(&path).unwrap();
        assert!(store.entry("1.1".parse().unwrap(), d).unwrap().is_some());
    }
}
