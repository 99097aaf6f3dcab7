use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::loader::{Endpoint, Payload, SnapshotStore};

/// Last successful payload per endpoint, kept between runs.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: String,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open snapshot database {}", path.display()))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                endpoint TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn save_snapshot<T: Serialize>(&self, endpoint: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize {} snapshot", endpoint))?;
        self.conn.execute(
            "INSERT INTO snapshots (endpoint, payload, fetched_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(endpoint) DO UPDATE SET payload = excluded.payload, fetched_at = excluded.fetched_at",
            params![endpoint, payload],
        )?;
        debug!("Stored snapshot for {}", endpoint);
        Ok(())
    }

    pub fn load_snapshot<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<Snapshot<T>>> {
        let result = self.conn.query_row(
            "SELECT payload, fetched_at FROM snapshots WHERE endpoint = ?1",
            [endpoint],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );
        let (payload, fetched_at) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_str(&payload)
            .with_context(|| format!("Corrupt {} snapshot", endpoint))?;
        Ok(Some(Snapshot { value, fetched_at }))
    }

    pub fn list_snapshots(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT endpoint, fetched_at FROM snapshots ORDER BY endpoint")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list snapshots")
    }

    fn save_payload(&self, payload: &Payload) -> Result<()> {
        let key = payload.endpoint().key();
        match payload {
            Payload::LastImports(p) => self.save_snapshot(key, p),
            Payload::Summary(p) => self.save_snapshot(key, p.as_ref()),
            Payload::Brief(p) => self.save_snapshot(key, p),
            Payload::FeedbackReport(p) => self.save_snapshot(key, p),
        }
    }

    fn load_payload(&self, endpoint: Endpoint) -> Result<Option<Payload>> {
        let key = endpoint.key();
        Ok(match endpoint {
            Endpoint::LastImports => self.load_snapshot(key)?.map(|s| Payload::LastImports(s.value)),
            Endpoint::Summary => self
                .load_snapshot(key)?
                .map(|s| Payload::Summary(Box::new(s.value))),
            Endpoint::Brief => self.load_snapshot(key)?.map(|s| Payload::Brief(s.value)),
            Endpoint::FeedbackReport => self
                .load_snapshot(key)?
                .map(|s| Payload::FeedbackReport(s.value)),
        })
    }
}

impl SnapshotStore for Database {
    fn save(&self, payload: &Payload) {
        if let Err(e) = self.save_payload(payload) {
            warn!("Failed to store snapshot: {:#}", e);
        }
    }

    fn load(&self, endpoint: Endpoint) -> Option<Payload> {
        self.load_payload(endpoint).unwrap_or_else(|e| {
            warn!("Failed to read snapshot: {:#}", e);
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::sample_summary;
    use crate::models::{DashboardSummary, FeedbackReport, SentimentCounts};

    #[test]
    fn test_init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        assert!(db.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let db = Database::open_in_memory().unwrap();
        let snapshot: Option<Snapshot<DashboardSummary>> =
            db.load_snapshot(Endpoint::Summary.key()).unwrap();
        assert!(snapshot.is_none());
    }

    #[test]
    fn test_snapshot_is_replaced_not_duplicated() {
        let db = Database::open_in_memory().unwrap();
        let mut summary = sample_summary();
        db.save_snapshot(Endpoint::Summary.key(), &summary).unwrap();

        summary.total_reviews = 250;
        db.save_snapshot(Endpoint::Summary.key(), &summary).unwrap();

        let stored: Snapshot<DashboardSummary> =
            db.load_snapshot(Endpoint::Summary.key()).unwrap().unwrap();
        assert_eq!(stored.value.total_reviews, 250);
        assert_eq!(stored.value.sentiment_counts(), SentimentCounts::new(45, 30, 25));
        assert!(!stored.fetched_at.is_empty());
        assert_eq!(db.list_snapshots().unwrap().len(), 1);
    }

    #[test]
    fn test_store_round_trips_payloads() {
        let db = Database::open_in_memory().unwrap();
        let report = FeedbackReport {
            feedback_analysis: Vec::new(),
            overall_proposals: vec!["Call back unhappy customers".to_string()],
        };
        db.save(&Payload::FeedbackReport(report));

        match db.load(Endpoint::FeedbackReport) {
            Some(Payload::FeedbackReport(r)) => {
                assert_eq!(r.overall_proposals, vec!["Call back unhappy customers".to_string()]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert!(db.load(Endpoint::Brief).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_reads_as_missing() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO snapshots (endpoint, payload) VALUES (?1, ?2)",
                params![Endpoint::Brief.key(), "not json"],
            )
            .unwrap();
        assert!(db.load(Endpoint::Brief).is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshots.db");
        let db = Database::open(&path).unwrap();
        db.save_snapshot("k", &vec![1, 2, 3]).unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        let stored: Snapshot<Vec<i32>> = reopened.load_snapshot("k").unwrap().unwrap();
        assert_eq!(stored.value, vec![1, 2, 3]);
        assert_eq!(reopened.path(), &path);
    }
}
