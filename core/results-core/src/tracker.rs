//! Per-test completion tracking.
//!
//! Every incoming test result goes through [`CompletionTracker::record_result`].
//! Test runners retry submissions and results may arrive after a session is
//! gone, so unknown sessions, undeclared tests and duplicates are outcomes,
//! not errors.
//!
//! The "already complete?" check and the completion mark happen under a
//! per-token lock, so two concurrent submissions of the same test store one
//! record and complete its API at most once. The session is written back
//! with the test marked complete before the record is stored; a failed store
//! write reopens the test again.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::locks::{acquire, KeyedLocks};
use crate::normalize::normalize;
use crate::registry::SessionRegistry;
use crate::report::ReportCoordinator;
use crate::store::ResultStore;
use crate::types::{api_of, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No session for the token (expired or never existed).
    UnknownSession,
    /// The session does not declare this test.
    UnknownTest,
    /// The test was already complete; nothing was stored.
    Duplicate,
    /// Stored; the API still has outstanding tests.
    Recorded { api: String },
    /// Stored, and it was the API's last outstanding test.
    ApiCompleted { api: String, bundle: PathBuf },
}

pub struct CompletionTracker {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn ResultStore>,
    reports: Arc<ReportCoordinator>,
    session_locks: KeyedLocks,
}

impl CompletionTracker {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn ResultStore>,
        reports: Arc<ReportCoordinator>,
    ) -> Self {
        Self {
            registry,
            store,
            reports,
            session_locks: KeyedLocks::new(),
        }
    }

    /// Records the raw harness result of `test` for the session `token`.
    ///
    /// If the payload has no `test` field, `test` is used.
    pub fn record_result(&self, token: &str, test: &str, payload: Value) -> Result<RecordOutcome> {
        let lock = self.session_locks.lock_for(token);
        let _guard = acquire(&lock);

        let Some(mut session) = self.registry.get_session(token)? else {
            debug!(token = %token, test = %test, "Ignoring result for unknown session");
            return Ok(RecordOutcome::UnknownSession);
        };

        if !session.test_exists(test) {
            debug!(token = %token, test = %test, "Ignoring result for undeclared test");
            return Ok(RecordOutcome::UnknownTest);
        }

        if session.is_test_complete(test) {
            debug!(token = %token, test = %test, "Ignoring duplicate result");
            self.registry.update_session(&session)?;
            return Ok(RecordOutcome::Duplicate);
        }

        let record = normalize(with_test_id(payload, test))?;

        // Flag is durable before the record is stored.
        session.complete_test(test);
        self.registry.update_session(&session)?;

        if let Err(err) = self.store.create_result(token, &record) {
            session.reopen_test(test);
            if let Err(rollback) = self.registry.update_session(&session) {
                warn!(token = %token, test = %test, error = %rollback, "Failed to reopen test");
            }
            return Err(err);
        }

        self.finish_api(&session, api_of(test))
    }

    fn finish_api(&self, session: &Session, api: &str) -> Result<RecordOutcome> {
        if !session.is_api_complete(api) {
            return Ok(RecordOutcome::Recorded {
                api: api.to_string(),
            });
        }

        info!(token = %session.token, api = %api, "API complete");
        let bundle = self.reports.save_api_results(session, api)?;
        self.reports.generate_report(session, api)?;
        Ok(RecordOutcome::ApiCompleted {
            api: api.to_string(),
            bundle,
        })
    }
}

fn with_test_id(payload: Value, test: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.entry("test")
                .or_insert_with(|| Value::String(test.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultsError;
    use crate::paths::PathResolver;
    use crate::registry::MemorySessionRegistry;
    use crate::render::RecordingRenderer;
    use crate::store::MemoryResultStore;
    use crate::types::ResultRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::tempdir;

    const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        registry: Arc<MemorySessionRegistry>,
        store: Arc<MemoryResultStore>,
        renderer: Arc<RecordingRenderer>,
        tracker: Arc<CompletionTracker>,
    }

    fn fixture(tests: &[&str]) -> Fixture {
        let temp = tempdir().unwrap();
        let root = temp.path().join("results");
        let registry = Arc::new(MemorySessionRegistry::new());
        let store = Arc::new(MemoryResultStore::new());
        let renderer = Arc::new(RecordingRenderer::new());
        registry
            .add_session(Session::new("abc123", CHROME).with_tests(tests.iter().copied()))
            .unwrap();

        let reports = Arc::new(ReportCoordinator::new(
            PathResolver::new(&root),
            registry.clone(),
            store.clone(),
            renderer.clone(),
        ));
        let tracker = Arc::new(CompletionTracker::new(
            registry.clone(),
            store.clone(),
            reports,
        ));
        Fixture {
            _temp: temp,
            root,
            registry,
            store,
            renderer,
            tracker,
        }
    }

    fn payload(test: &str) -> Value {
        json!({"test": test, "status": 0, "message": null, "tests": [{"name": "a", "status": 1, "stack": "s"}]})
    }

    #[test]
    fn test_unknown_session_is_ignored() {
        let fx = fixture(&["foo/a.html"]);
        let outcome = fx.tracker.record_result("nope", "foo/a.html", payload("foo/a.html")).unwrap();
        assert_eq!(outcome, RecordOutcome::UnknownSession);
        assert_eq!(fx.store.count("nope"), 0);
    }

    #[test]
    fn test_undeclared_test_is_ignored() {
        let fx = fixture(&["foo/a.html"]);
        let outcome = fx.tracker.record_result("abc123", "bar/x.html", payload("bar/x.html")).unwrap();
        assert_eq!(outcome, RecordOutcome::UnknownTest);
        assert_eq!(fx.store.count("abc123"), 0);
    }

    #[test]
    fn test_api_completes_on_last_test() {
        let fx = fixture(&["foo/a.html", "foo/b.html"]);

        let first = fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();
        assert_eq!(first, RecordOutcome::Recorded { api: "foo".into() });
        assert!(fx.renderer.calls().is_empty());

        let second = fx.tracker.record_result("abc123", "foo/b.html", payload("foo/b.html")).unwrap();
        let expected_bundle = fx.root.join("abc123/foo/CR120.json");
        assert_eq!(
            second,
            RecordOutcome::ApiCompleted {
                api: "foo".into(),
                bundle: expected_bundle.clone()
            }
        );

        let bundle: Value =
            serde_json::from_str(&fs_err::read_to_string(&expected_bundle).unwrap()).unwrap();
        let results: Vec<ResultRecord> =
            serde_json::from_value(bundle["results"].clone()).unwrap();
        assert_eq!(results.len(), 2);

        let calls = fx.renderer.single_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].spec_name, "foo");
    }

    #[test]
    fn test_duplicate_submission_has_no_side_effects() {
        let fx = fixture(&["foo/a.html"]);
        fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();
        let again = fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();

        assert_eq!(again, RecordOutcome::Duplicate);
        assert_eq!(fx.store.count("abc123"), 1);
        assert_eq!(fx.renderer.single_calls().len(), 1);
    }

    #[test]
    fn test_other_api_does_not_trigger_report() {
        let fx = fixture(&["foo/a.html", "bar/b.html", "bar/c.html"]);
        fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();
        fx.tracker.record_result("abc123", "bar/b.html", payload("bar/b.html")).unwrap();

        let calls = fx.renderer.single_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].spec_name, "foo");
    }

    #[test]
    fn test_completion_flag_is_written_back() {
        let fx = fixture(&["foo/a.html", "foo/b.html"]);
        fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();

        let session = fx.registry.get_session("abc123").unwrap().unwrap();
        assert!(session.is_test_complete("foo/a.html"));
        assert!(!session.is_test_complete("foo/b.html"));
    }

    #[test]
    fn test_missing_test_field_uses_identifier() {
        let fx = fixture(&["/foo/a.html"]);
        fx.tracker
            .record_result("abc123", "/foo/a.html", json!({"status": 0}))
            .unwrap();
        let stored = fx.store.get_results("abc123").unwrap();
        assert_eq!(stored[0].record.test, "/foo/a.html");
    }

    #[test]
    fn test_invalid_payload_leaves_test_open() {
        let fx = fixture(&["foo/a.html"]);
        let err = fx
            .tracker
            .record_result("abc123", "foo/a.html", json!({"test": "foo/a.html", "status": 42}))
            .unwrap_err();
        assert!(matches!(err, ResultsError::InvalidStatus { .. }));

        let outcome = fx.tracker.record_result("abc123", "foo/a.html", payload("foo/a.html")).unwrap();
        assert!(matches!(outcome, RecordOutcome::ApiCompleted { .. }));
    }

    struct FlakyStore {
        inner: MemoryResultStore,
        fail_next: AtomicBool,
    }

    impl ResultStore for FlakyStore {
        fn create_result(&self, token: &str, record: &ResultRecord) -> Result<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ResultsError::Store("disk full".to_string()));
            }
            self.inner.create_result(token, record)
        }

        fn get_results(&self, token: &str) -> Result<Vec<crate::types::StoredResult>> {
            self.inner.get_results(token)
        }
    }

    #[test]
    fn test_store_failure_allows_retry() {
        let temp = tempdir().unwrap();
        let registry = Arc::new(MemorySessionRegistry::new());
        registry
            .add_session(Session::new("t", CHROME).with_tests(["foo/a.html"]))
            .unwrap();
        let store = Arc::new(FlakyStore {
            inner: MemoryResultStore::new(),
            fail_next: AtomicBool::new(true),
        });
        let renderer = Arc::new(RecordingRenderer::new());
        let reports = Arc::new(ReportCoordinator::new(
            PathResolver::new(temp.path()),
            registry.clone(),
            store.clone(),
            renderer.clone(),
        ));
        let tracker = CompletionTracker::new(registry.clone(), store.clone(), reports);

        assert!(tracker.record_result("t", "foo/a.html", payload("foo/a.html")).is_err());
        assert!(!registry.get_session("t").unwrap().unwrap().is_test_complete("foo/a.html"));

        let outcome = tracker.record_result("t", "foo/a.html", payload("foo/a.html")).unwrap();
        assert!(matches!(outcome, RecordOutcome::ApiCompleted { .. }));
        assert_eq!(store.inner.count("t"), 1);
    }

    struct FlakyRegistry {
        inner: MemorySessionRegistry,
        fail_next_update: AtomicBool,
    }

    impl SessionRegistry for FlakyRegistry {
        fn get_session(&self, token: &str) -> Result<Option<Session>> {
            self.inner.get_session(token)
        }

        fn update_session(&self, session: &Session) -> Result<()> {
            if self.fail_next_update.swap(false, Ordering::SeqCst) {
                return Err(ResultsError::Registry("sessions file locked".to_string()));
            }
            self.inner.update_session(session)
        }

        fn add_session(&self, session: Session) -> Result<()> {
            self.inner.add_session(session)
        }
    }

    #[test]
    fn test_failed_write_back_never_stores_twice() {
        let temp = tempdir().unwrap();
        let registry = Arc::new(FlakyRegistry {
            inner: MemorySessionRegistry::new(),
            fail_next_update: AtomicBool::new(false),
        });
        registry
            .add_session(Session::new("t", CHROME).with_tests(["foo/a.html", "foo/b.html"]))
            .unwrap();
        let store = Arc::new(MemoryResultStore::new());
        let reports = Arc::new(ReportCoordinator::new(
            PathResolver::new(temp.path()),
            registry.clone(),
            store.clone(),
            Arc::new(RecordingRenderer::new()),
        ));
        let tracker = CompletionTracker::new(registry.clone(), store.clone(), reports);

        registry.fail_next_update.store(true, Ordering::SeqCst);
        assert!(tracker.record_result("t", "foo/a.html", payload("foo/a.html")).is_err());
        assert_eq!(store.count("t"), 0);

        let retry = tracker.record_result("t", "foo/a.html", payload("foo/a.html")).unwrap();
        assert_eq!(retry, RecordOutcome::Recorded { api: "foo".into() });
        let again = tracker.record_result("t", "foo/a.html", payload("foo/a.html")).unwrap();
        assert_eq!(again, RecordOutcome::Duplicate);
        assert_eq!(store.count("t"), 1);
    }

    #[test]
    fn test_concurrent_duplicates_complete_once() {
        let fx = fixture(&["foo/a.html"]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&fx.tracker);
                thread::spawn(move || {
                    tracker
                        .record_result("abc123", "foo/a.html", payload("foo/a.html"))
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<RecordOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::ApiCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(fx.store.count("abc123"), 1);
        assert_eq!(fx.renderer.single_calls().len(), 1);
    }
}
