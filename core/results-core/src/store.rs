//! Durable result store interface and an in-memory implementation.
//!
//! Stores do not enforce uniqueness of (token, test); the completion tracker does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Result, ResultsError};
use crate::types::{ResultRecord, StoredResult};

/// Trait for result stores.
///
/// `get_results` must return records in insertion order.
pub trait ResultStore: Send + Sync {
    fn create_result(&self, token: &str, record: &ResultRecord) -> Result<()>;

    fn get_results(&self, token: &str) -> Result<Vec<StoredResult>>;
}

#[derive(Default)]
pub struct MemoryResultStore {
    rows: Mutex<HashMap<String, Vec<StoredResult>>>,
    next_id: AtomicU64,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for `token`.
    pub fn count(&self, token: &str) -> usize {
        self.rows
            .lock()
            .map(|rows| rows.get(token).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl ResultStore for MemoryResultStore {
    fn create_result(&self, token: &str, record: &ResultRecord) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| ResultsError::Store("result rows poisoned".to_string()))?;
        rows.entry(token.to_string()).or_default().push(StoredResult {
            id: id.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    fn get_results(&self, token: &str) -> Result<Vec<StoredResult>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| ResultsError::Store("result rows poisoned".to_string()))?;
        Ok(rows.get(token).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_results_are_scoped_by_token_and_ordered() {
        let store = MemoryResultStore::new();
        let first = normalize(json!({"test": "/a/1.html", "status": 0})).unwrap();
        let second = normalize(json!({"test": "/a/2.html", "status": 1})).unwrap();
        store.create_result("t1", &first).unwrap();
        store.create_result("t2", &first).unwrap();
        store.create_result("t1", &second).unwrap();

        let rows = store.get_results("t1").unwrap();
        let tests: Vec<&str> = rows.iter().map(|r| r.record.test.as_str()).collect();
        assert_eq!(tests, vec!["/a/1.html", "/a/2.html"]);
        assert_ne!(rows[0].id, rows[1].id);
        assert_eq!(store.count("t2"), 1);
        assert!(store.get_results("unknown").unwrap().is_empty());
    }
}
