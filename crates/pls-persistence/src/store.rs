//! The append-only event log and snapshot store (spec §4.7), backed by
//! SQLite via `rusqlite` — the same crate/feature pairing
//! (`rusqlite = { features = ["bundled"] }`) pinned in
//! `jackhale98-tessera/src-tauri/Cargo.toml` for its own Tauri+SQLite
//! persistence layer.
//!
//! Schema matches spec §6 "Persisted schema (logical)": an `events` table
//! `(seq, ts, kind, entity_id, payload_json)` and a `snapshots` table
//! `(snapshot_id, ts, last_applied_seq, tasks_json, calendar_json,
//! trade_partners_json)`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use pls_core::{Calendar, Task};
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::{PersistenceError, Result};
use crate::event::{Event, EventKind};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    seq INTEGER PRIMARY KEY,
    ts TEXT NOT NULL,
    kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    last_applied_seq INTEGER NOT NULL,
    tasks_json TEXT NOT NULL,
    calendar_json TEXT NOT NULL,
    trade_partners_json TEXT NOT NULL
);
";

/// A full serialization of project state, paired with the last event
/// sequence applied at capture time (spec §4.7 "Snapshots").
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub snapshot_id: i64,
    pub last_applied_seq: i64,
    pub tasks: Vec<Task>,
    pub calendar: Calendar,
    pub trade_partners: Vec<Value>,
}

/// Trigger threshold for a forced flush/snapshot irrespective of the timer
/// (spec §4.7: "flushed in batches on a short interval ... or when queue
/// size exceeds a threshold").
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Trigger threshold for an early snapshot irrespective of the timer (spec
/// §4.7: the snapshot policy "fires both on a timer ... and whenever the
/// event log's unflushed count crosses a threshold"), so recovery on a
/// long-running process never has to replay more than this many events.
pub const DEFAULT_SNAPSHOT_THRESHOLD: i64 = 5_000;

pub struct PersistenceService {
    conn: Mutex<Connection>,
    queue: Mutex<Vec<Event>>,
    next_seq: AtomicI64,
    last_flushed_seq: AtomicI64,
    last_snapshot_seq: AtomicI64,
    flush_threshold: usize,
    snapshot_threshold: i64,
}

impl PersistenceService {
    pub fn open(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let max_seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| row.get(0))
            .unwrap_or(0);
        let last_snapshot_seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(last_applied_seq), 0) FROM snapshots", [], |row| row.get(0))
            .unwrap_or(0);
        Ok(PersistenceService {
            conn: Mutex::new(conn),
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicI64::new(max_seq + 1),
            last_flushed_seq: AtomicI64::new(max_seq),
            last_snapshot_seq: AtomicI64::new(last_snapshot_seq),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(Connection::open_in_memory()?)
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn with_snapshot_threshold(mut self, threshold: i64) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    /// Whether enough events have accumulated since the last snapshot to
    /// warrant an early one, instead of waiting for the snapshot timer.
    pub fn should_snapshot(&self) -> bool {
        let unsnapshotted = self.last_flushed_seq.load(Ordering::SeqCst) - self.last_snapshot_seq.load(Ordering::SeqCst);
        unsnapshotted >= self.snapshot_threshold
    }

    /// Queue `event` for the next batch flush. Not yet durable — a crash
    /// before `flush` loses it (spec §4.7 "Crash guarantees"). Eagerly
    /// flushes once the queue crosses `flush_threshold`, rather than waiting
    /// for the next timer tick (spec §4.7 "or when queue size exceeds a
    /// threshold").
    pub fn record(&self, kind: EventKind, entity_id: impl Into<String>, payload: Value) -> i64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            seq,
            ts: Utc::now(),
            kind,
            entity_id: entity_id.into(),
            payload,
        };
        self.queue.lock().unwrap().push(event);
        if self.should_flush() {
            if let Err(error) = self.flush() {
                tracing::error!(%error, "threshold-triggered flush failed; batch retained for retry");
            }
        }
        seq
    }

    pub fn queued_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn should_flush(&self) -> bool {
        self.queued_len() >= self.flush_threshold
    }

    /// Commit every queued event in one transaction. On failure the queue
    /// is left intact so the next attempt retries the whole batch (spec
    /// §4.7 "on failure the batch is retained and retried").
    pub fn flush(&self) -> Result<usize> {
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for event in queue.iter() {
            tx.execute(
                "INSERT INTO events (seq, ts, kind, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.seq,
                    event.ts.to_rfc3339(),
                    event.kind.as_str(),
                    event.entity_id,
                    serde_json::to_string(&event.payload)?,
                ],
            )?;
        }
        tx.commit()?;
        let flushed = queue.len();
        self.last_flushed_seq.store(
            queue.last().map(|e| e.seq).unwrap_or(self.last_flushed_seq.load(Ordering::SeqCst)),
            Ordering::SeqCst,
        );
        queue.clear();
        Ok(flushed)
    }

    /// Capture a full snapshot at the current flushed sequence (spec §4.7
    /// "Snapshots ... `lastAppliedSeq` at the time of capture").
    pub fn snapshot(&self, tasks: &[Task], calendar: &Calendar, trade_partners: &[Value]) -> Result<i64> {
        let last_applied_seq = self.last_flushed_seq.load(Ordering::SeqCst);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (ts, last_applied_seq, tasks_json, calendar_json, trade_partners_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().to_rfc3339(),
                last_applied_seq,
                serde_json::to_string(tasks)?,
                serde_json::to_string(calendar)?,
                serde_json::to_string(trade_partners)?,
            ],
        )?;
        self.last_snapshot_seq.store(last_applied_seq, Ordering::SeqCst);
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT snapshot_id, last_applied_seq, tasks_json, calendar_json, trade_partners_json
             FROM snapshots ORDER BY snapshot_id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else { return Ok(None) };

        let snapshot_id: i64 = row.get(0)?;
        let last_applied_seq: i64 = row.get(1)?;
        let tasks_json: String = row.get(2)?;
        let calendar_json: String = row.get(3)?;
        let trade_partners_json: String = row.get(4)?;

        Ok(Some(Snapshot {
            snapshot_id,
            last_applied_seq,
            tasks: serde_json::from_str(&tasks_json)?,
            calendar: serde_json::from_str(&calendar_json)?,
            trade_partners: serde_json::from_str(&trade_partners_json)?,
        }))
    }

    /// Events with `seq > after`, in order.
    pub fn events_after(&self, after: i64) -> Result<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT seq, ts, kind, entity_id, payload_json FROM events WHERE seq > ?1 ORDER BY seq ASC")?;
        let rows = stmt.query_map(params![after], |row| {
            let ts_str: String = row.get(1)?;
            let kind_str: String = row.get(2)?;
            Ok((row.get::<_, i64>(0)?, ts_str, kind_str, row.get::<_, String>(3)?, row.get::<_, String>(4)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (seq, ts_str, kind_str, entity_id, payload_json) = row?;
            let ts = chrono::DateTime::parse_from_rfc3339(&ts_str)
                .map_err(|e| PersistenceError::Recovery(e.to_string()))?
                .with_timezone(&Utc);
            let kind = EventKind::parse(&kind_str)
                .ok_or_else(|| PersistenceError::Recovery(format!("unknown event kind {kind_str:?}")))?;
            let payload: Value = serde_json::from_str(&payload_json)?;
            events.push(Event { seq, ts, kind, entity_id, payload });
        }
        Ok(events)
    }
}
