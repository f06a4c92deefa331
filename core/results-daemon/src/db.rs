//! SQLite persistence for result rows.
//!
//! Results are an append-only table keyed by rowid; reads return rows in
//! insertion order. The table does not enforce (token, test) uniqueness: the
//! completion tracker guards that.

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use std::path::PathBuf;

use results_core::{ResultRecord, ResultStore, ResultsError, StoredResult};

pub struct SqliteResultStore {
    path: PathBuf,
}

impl SqliteResultStore {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn insert_result(&self, token: &str, record: &ResultRecord) -> Result<(), String> {
        self.with_connection(|conn| {
            let payload = serde_json::to_string(record)
                .map_err(|err| format!("Failed to serialize result payload: {}", err))?;

            conn.execute(
                "INSERT INTO results (token, test, status, recorded_at, payload) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    token,
                    record.test,
                    record.status.as_str(),
                    Utc::now().to_rfc3339(),
                    payload
                ],
            )
            .map_err(|err| format!("Failed to insert result: {}", err))?;

            Ok(())
        })
    }

    pub fn list_results(&self, token: &str) -> Result<Vec<StoredResult>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT rowid, payload FROM results WHERE token = ?1 ORDER BY rowid ASC")
                .map_err(|err| format!("Failed to prepare results query: {}", err))?;

            let rows = stmt
                .query_map(params![token], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|err| format!("Failed to read result rows: {}", err))?;

            let mut results = Vec::new();
            for row in rows {
                let (rowid, payload) =
                    row.map_err(|err| format!("Failed to decode result row: {}", err))?;
                let record: ResultRecord = serde_json::from_str(&payload)
                    .map_err(|err| format!("Failed to parse result payload {}: {}", rowid, err))?;
                results.push(StoredResult {
                    id: rowid.to_string(),
                    record,
                });
            }

            Ok(results)
        })
    }

    pub fn count_results(&self, token: &str) -> Result<usize, String> {
        let count = self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM results WHERE token = ?1",
                params![token],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| format!("Failed to count results: {}", err))
        })?;
        Ok(count.max(0) as usize)
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS results (
                    token TEXT NOT NULL,
                    test TEXT NOT NULL,
                    status TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    payload TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_results_token ON results(token);
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize results schema: {}", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create results data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

impl ResultStore for SqliteResultStore {
    fn create_result(&self, token: &str, record: &ResultRecord) -> results_core::Result<()> {
        self.insert_result(token, record).map_err(ResultsError::Store)
    }

    fn get_results(&self, token: &str) -> results_core::Result<Vec<StoredResult>> {
        self.list_results(token).map_err(ResultsError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use results_core::normalize;
    use serde_json::json;

    fn record(test: &str, status: u64) -> ResultRecord {
        normalize(json!({
            "test": test,
            "status": status,
            "message": null,
            "tests": [{"name": "case", "status": 1, "message": "expected 1"}]
        }))
        .expect("normalize")
    }

    #[test]
    fn results_round_trip_in_insertion_order() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = SqliteResultStore::new(temp_dir.path().join("results.db")).expect("db init");

        db.create_result("tok", &record("/dom/b.html", 0))
            .expect("insert b");
        db.create_result("tok", &record("/dom/a.html", 2))
            .expect("insert a");
        db.create_result("other", &record("/dom/a.html", 0))
            .expect("insert other");

        let rows = db.get_results("tok").expect("list results");
        let tests: Vec<&str> = rows.iter().map(|r| r.record.test.as_str()).collect();
        assert_eq!(tests, vec!["/dom/b.html", "/dom/a.html"]);
        assert_eq!(rows[1].record, record("/dom/a.html", 2));
        assert_ne!(rows[0].id, rows[1].id);
        assert_eq!(db.count_results("other").expect("count"), 1);
    }

    #[test]
    fn reopening_keeps_rows() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("nested").join("results.db");
        {
            let db = SqliteResultStore::new(path.clone()).expect("db init");
            db.create_result("tok", &record("/fetch/a.html", 0))
                .expect("insert");
        }

        let db = SqliteResultStore::new(path).expect("db reopen");
        assert_eq!(db.count_results("tok").expect("count"), 1);
        assert!(db.get_results("missing").expect("list").is_empty());
    }
}
