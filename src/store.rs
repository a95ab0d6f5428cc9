//! Durable record store for finished activity segments.
//!
//! Segments live in the `activity_logs` SQLite table. The schema is shared
//! with external reporting tools and must not change shape. Every append is
//! its own committed transaction.
//!
//! Timestamps are local wall-clock text. `duration_sec` is derived from the
//! stored pair, so `duration_sec == floor(end_time - start_time)` holds for
//! every row even when the segment spans a daylight-saving change.

use crate::classifier::Category;
use crate::core::segment::ActivitySegment;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Table definition, created on first use.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time DATETIME,
    end_time DATETIME,
    window_title TEXT,
    category TEXT,
    duration_sec INTEGER
)";

/// Text layout of `start_time`/`end_time` (local wall-clock).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SELECT_COLUMNS: &str =
    "SELECT id, start_time, end_time, window_title, category, duration_sec FROM activity_logs";

/// Identifier assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Store error types.
#[derive(Debug)]
pub enum StoreError {
    /// Database could not be opened or its directory created
    Open(String),
    /// Schema initialization failed
    Schema(String),
    /// Insert or commit failed
    Write(String),
    /// Query failed or a row could not be decoded
    Read(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Open(msg) => write!(f, "Store open error: {msg}"),
            StoreError::Schema(msg) => write!(f, "Store schema error: {msg}"),
            StoreError::Write(msg) => write!(f, "Store write error: {msg}"),
            StoreError::Read(msg) => write!(f, "Store read error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Append-only sink for finished segments.
pub trait RecordStore {
    /// Durably append one segment, returning its identifier.
    fn append(&mut self, segment: &ActivitySegment) -> Result<RecordId, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn append(&mut self, segment: &ActivitySegment) -> Result<RecordId, StoreError> {
        (**self).append(segment)
    }
}

/// A row read back from `activity_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub window_title: String,
    pub category: Category,
    pub duration_sec: i64,
}

/// A segment's interval as written to `activity_logs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClockInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_sec: i64,
}

impl WallClockInterval {
    /// Render `start..end` on the wall clock of `tz`.
    ///
    /// When the local clock is set back inside the interval the end can read
    /// earlier than the start; it is clamped to the start.
    pub fn new<Tz: TimeZone>(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> Self {
        let start = wall_clock(start, tz);
        let end = wall_clock(end, tz).max(start);
        Self {
            start,
            end,
            duration_sec: (end - start).num_seconds(),
        }
    }
}

/// Aggregate time per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub segments: i64,
    pub total_secs: i64,
}

/// SQLite-backed record store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Open(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    /// Fetch one record by identifier.
    pub fn get(&self, id: RecordId) -> Result<Option<StoredRecord>, StoreError> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                read_row,
            )
            .optional()
            .map_err(|e| StoreError::Read(e.to_string()))?
            .transpose()
    }

    /// All records in insertion order.
    pub fn all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id"), params![])
    }

    /// The `limit` most recent records, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut records = self.query(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )?;
        records.reverse();
        Ok(records)
    }

    /// Seconds and segment counts per category, optionally from a start date.
    ///
    /// Error categories are grouped under `error` whatever their cause.
    pub fn category_totals(&self, since: Option<NaiveDate>) -> Result<Vec<CategoryTotal>, StoreError> {
        let since = since.map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")));

        let mut stmt = self
            .conn
            .prepare(
                "SELECT CASE WHEN category LIKE 'error: %' THEN 'error' ELSE category END AS label,
                        COUNT(*),
                        COALESCE(SUM(duration_sec), 0) AS total
                 FROM activity_logs
                 WHERE ?1 IS NULL OR start_time >= ?1
                 GROUP BY label
                 ORDER BY total DESC, label",
            )
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let rows = stmt
            .query_map(params![since], |row| {
                Ok(CategoryTotal {
                    category: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    segments: row.get(1)?,
                    total_secs: row.get(2)?,
                })
            })
            .map_err(|e| StoreError::Read(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    fn query(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let rows = stmt
            .query_map(params, read_row)
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| StoreError::Read(e.to_string()))??);
        }
        Ok(records)
    }
}

impl SqliteStore {
    /// Append `segment` with its timestamps rendered in `tz`.
    pub fn append_in<Tz: TimeZone>(
        &mut self,
        segment: &ActivitySegment,
        tz: &Tz,
    ) -> Result<RecordId, StoreError> {
        let interval = WallClockInterval::new(segment.start_time, segment.end_time, tz);
        if interval.duration_sec != segment.duration_sec {
            tracing::debug!(
                elapsed = segment.duration_sec,
                wall_clock = interval.duration_sec,
                "segment spans a local clock change"
            );
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::Write(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT INTO activity_logs (start_time, end_time, window_title, category, duration_sec)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                interval.start.format(TIMESTAMP_FORMAT).to_string(),
                interval.end.format(TIMESTAMP_FORMAT).to_string(),
                segment.window_title,
                segment.category.as_stored(),
                interval.duration_sec,
            ],
        )
        .map_err(|e| StoreError::Write(format!("failed to insert segment: {e}")))?;

        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| StoreError::Write(format!("failed to commit segment: {e}")))?;

        Ok(RecordId(id))
    }
}

impl RecordStore for SqliteStore {
    fn append(&mut self, segment: &ActivitySegment) -> Result<RecordId, StoreError> {
        self.append_in(segment, &Local)
    }
}

/// Local time of `ts` at the precision the stored layout keeps.
fn wall_clock<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    ts.with_timezone(tz).naive_local().trunc_subsecs(6)
}

/// Render a timestamp in the stored layout.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    wall_clock(ts, &Local).format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_PARSE_FORMAT)
        .map_err(|e| StoreError::Read(format!("invalid timestamp '{value}': {e}")))
}

/// Column values as SQLite hands them back, before timestamp parsing.
struct RawRow {
    id: i64,
    start: String,
    end: String,
    window_title: Option<String>,
    category: Option<String>,
    duration_sec: Option<i64>,
}

impl RawRow {
    fn decode(self) -> Result<StoredRecord, StoreError> {
        Ok(StoredRecord {
            id: RecordId(self.id),
            start_time: parse_timestamp(&self.start)?,
            end_time: parse_timestamp(&self.end)?,
            window_title: self.window_title.unwrap_or_default(),
            category: Category::from_stored(self.category.as_deref().unwrap_or_default()),
            duration_sec: self.duration_sec.unwrap_or_default(),
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredRecord, StoreError>> {
    let raw = RawRow {
        id: row.get(0)?,
        start: row.get(1)?,
        end: row.get(2)?,
        window_title: row.get(3)?,
        category: row.get(4)?,
        duration_sec: row.get(5)?,
    };
    Ok(raw.decode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segment::OpenSegment;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 250_000_000).unwrap()
    }

    fn segment(title: &str, start: i64, end: i64, category: Category) -> ActivitySegment {
        OpenSegment::new(title, at(start))
            .close(at(end))
            .with_category(category)
    }

    #[test]
    fn test_schema_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stmt = store
            .conn
            .prepare("SELECT name, type, pk FROM pragma_table_info('activity_logs') ORDER BY cid")
            .unwrap();
        let columns: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "INTEGER".to_string(), 1),
                ("start_time".to_string(), "DATETIME".to_string(), 0),
                ("end_time".to_string(), "DATETIME".to_string(), 0),
                ("window_title".to_string(), "TEXT".to_string(), 0),
                ("category".to_string(), "TEXT".to_string(), 0),
                ("duration_sec".to_string(), "INTEGER".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = store.append(&segment("A", 0, 9, Category::Work)).unwrap();
        let second = store.append(&segment("B", 9, 15, Category::Study)).unwrap();
        let third = store.append(&segment("C", 15, 16, Category::Break)).unwrap();

        assert!(first < second && second < third);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append(&segment("A", 0, 3, Category::Work)).unwrap();
        let last = store.append(&segment("B", 3, 6, Category::Work)).unwrap();

        store
            .conn
            .execute("DELETE FROM activity_logs WHERE id = ?1", params![last.0])
            .unwrap();

        let next = store.append(&segment("C", 6, 9, Category::Work)).unwrap();
        assert!(next > last);
    }

    #[test]
    fn test_stored_fields_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let original = segment(
            "Lecture notes",
            0,
            10,
            Category::Error("connection refused".to_string()),
        );
        let id = store.append(&original).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.window_title, "Lecture notes");
        assert_eq!(record.duration_sec, 10);
        assert!(record.category.is_error());
        assert_eq!(
            record.start_time,
            original.start_time.with_timezone(&Local).naive_local()
        );
        assert_eq!(
            (record.end_time - record.start_time).num_seconds(),
            record.duration_sec
        );
    }

    fn utc(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stored_in(tz: &chrono_tz::Tz, start: &str, end: &str) -> StoredRecord {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let segment = OpenSegment::new("Editor", utc(start))
            .close(utc(end))
            .with_category(Category::Work);
        let id = store.append_in(&segment, tz).unwrap();
        store.get(id).unwrap().unwrap()
    }

    #[test]
    fn test_duration_matches_stored_pair_when_clocks_go_back() {
        // 01:50 EDT, then 01:10 EST twenty minutes later.
        let record = stored_in(
            &chrono_tz::America::New_York,
            "2023-11-05T05:50:00Z",
            "2023-11-05T06:10:00Z",
        );

        assert_eq!(record.start_time.to_string(), "2023-11-05 01:50:00");
        assert_eq!(record.end_time, record.start_time);
        assert_eq!(record.duration_sec, 0);
    }

    #[test]
    fn test_duration_matches_stored_pair_when_clocks_go_forward() {
        // 01:50 EST, then 03:10 EDT twenty minutes later.
        let record = stored_in(
            &chrono_tz::America::New_York,
            "2023-03-12T06:50:00Z",
            "2023-03-12T07:10:00Z",
        );

        assert_eq!(record.end_time.to_string(), "2023-03-12 03:10:00");
        assert_eq!(
            (record.end_time - record.start_time).num_seconds(),
            record.duration_sec
        );
        assert_eq!(record.duration_sec, 4800);
    }

    #[test]
    fn test_duration_uses_stored_precision() {
        let record = stored_in(
            &chrono_tz::Europe::Berlin,
            "2024-06-01T10:00:00.0000009Z",
            "2024-06-01T10:00:01.0000001Z",
        );

        assert_eq!(
            (record.end_time - record.start_time).num_seconds(),
            record.duration_sec
        );
        assert_eq!(record.duration_sec, 1);
    }

    #[test]
    fn test_timestamp_layout() {
        let formatted = format_timestamp(at(0));
        // e.g. "2023-11-14 22:13:20.250000"
        assert_eq!(formatted.len(), 26);
        assert_eq!(&formatted[10..11], " ");
        assert!(formatted.ends_with(".250000"));
        assert!(parse_timestamp(&formatted).is_ok());
        // Rows written without fractional seconds still parse.
        assert!(parse_timestamp("2024-03-01 09:00:00").is_ok());
    }

    #[test]
    fn test_recent_returns_latest_in_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (i, title) in ["a", "b", "c", "d"].iter().enumerate() {
            let start = i as i64 * 3;
            store
                .append(&segment(title, start, start + 3, Category::Work))
                .unwrap();
        }

        let recent = store.recent(2).unwrap();
        let titles: Vec<&str> = recent.iter().map(|r| r.window_title.as_str()).collect();
        assert_eq!(titles, vec!["c", "d"]);
    }

    #[test]
    fn test_category_totals() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append(&segment("A", 0, 30, Category::Work)).unwrap();
        store.append(&segment("B", 30, 40, Category::Study)).unwrap();
        store.append(&segment("C", 40, 60, Category::Work)).unwrap();
        store
            .append(&segment("D", 60, 65, Category::Error("timeout".to_string())))
            .unwrap();
        store
            .append(&segment("E", 65, 66, Category::Error("refused".to_string())))
            .unwrap();

        let totals = store.category_totals(None).unwrap();
        assert_eq!(
            totals[0],
            CategoryTotal {
                category: "work".to_string(),
                segments: 2,
                total_secs: 50,
            }
        );
        let errors = totals.iter().find(|t| t.category == "error").unwrap();
        assert_eq!(errors.segments, 2);
        assert_eq!(errors.total_secs, 6);

        let future = (Local::now() + Duration::days(2)).date_naive();
        assert!(store.category_totals(Some(future)).unwrap().is_empty());
    }

    #[test]
    fn test_committed_records_survive_reopen() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("timesheet.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append(&segment("A", 0, 9, Category::Work)).unwrap();
        }

        let mut reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        let id = reopened.append(&segment("B", 9, 15, Category::Break)).unwrap();
        assert_eq!(id, RecordId(2));
    }
}
