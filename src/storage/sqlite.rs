//! SQLite-backed store: predictions appended to a table, stats kept as a
//! single upserted row.

use super::OutputSink;
use crate::classifier::Prediction;
use crate::error::PersistenceError;
use crate::stats::StatsSnapshot;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create DB at path
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                window_index INTEGER NOT NULL,
                window_start INTEGER NOT NULL,
                window_end INTEGER NOT NULL,
                is_threat INTEGER NOT NULL,
                threat_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                packet_count INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_ts ON predictions(ts);
            CREATE TABLE IF NOT EXISTS stats (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                updated_at INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Most recent predictions, newest first
    pub fn recent_predictions(&self, limit: usize) -> Result<Vec<Prediction>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM predictions ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for payload in rows {
            out.push(serde_json::from_str(&payload?)?);
        }
        Ok(out)
    }

    pub fn latest_stats(&self) -> Result<Option<StatsSnapshot>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM stats WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(match payload {
            Some(p) => Some(serde_json::from_str(&p)?),
            None => None,
        })
    }
}

impl OutputSink for SqliteStore {
    fn append_prediction(&mut self, p: &Prediction) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(p)?;
        self.conn.execute(
            "INSERT INTO predictions (ts, window_index, window_start, window_end, is_threat, threat_type, confidence, packet_count, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                p.timestamp.timestamp_millis(),
                p.window_index as i64,
                p.window_start.timestamp_millis(),
                p.window_end.timestamp_millis(),
                p.is_threat,
                p.threat_type.as_str(),
                p.confidence,
                p.packet_count as i64,
                payload,
            ],
        )?;
        Ok(())
    }

    fn write_stats(&mut self, stats: &StatsSnapshot) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(stats)?;
        self.conn.execute(
            "INSERT INTO stats (id, updated_at, payload) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at, payload = excluded.payload",
            params![stats.updated_at.timestamp_millis(), payload],
        )?;
        Ok(())
    }
}
