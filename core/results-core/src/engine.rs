//! ResultsEngine - the entry point for result-submission front ends.
//!
//! Wires the tracker, report coordinator and reconciliation loader to one set
//! of collaborators. Collaborators are injected; the engine holds no global state.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use results_core::{ResultsEngine, StorageConfig};
//!
//! let engine = ResultsEngine::new(StorageConfig::default(), registry, store, renderer);
//! engine.load_results()?;
//! engine.record_result(&token, "/dom/a.html", payload)?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::aggregate::ApiResults;
use crate::error::{Result, ResultsError};
use crate::paths::{comparison_key, ComparisonKey, JsonLocation, PathResolver};
use crate::reconcile::{LoadSummary, ReconciliationLoader};
use crate::registry::SessionRegistry;
use crate::render::ReportRenderer;
use crate::report::ReportCoordinator;
use crate::storage::StorageConfig;
use crate::store::ResultStore;
use crate::tracker::{CompletionTracker, RecordOutcome};
use crate::types::Session;

pub struct ResultsEngine {
    storage: StorageConfig,
    registry: Arc<dyn SessionRegistry>,
    reports: Arc<ReportCoordinator>,
    tracker: CompletionTracker,
    loader: ReconciliationLoader,
}

impl ResultsEngine {
    pub fn new(
        storage: StorageConfig,
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn ResultStore>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        let resolver = PathResolver::new(storage.results_root());
        let reports = Arc::new(ReportCoordinator::new(
            resolver.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
            renderer,
        ));
        let tracker = CompletionTracker::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&reports),
        );
        let loader = ReconciliationLoader::new(resolver, Arc::clone(&registry), store);

        Self {
            storage,
            registry,
            reports,
            tracker,
            loader,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Imports archives left by earlier runs. Call once, before accepting submissions.
    pub fn load_results(&self) -> Result<LoadSummary> {
        self.loader.load_results()
    }

    pub fn record_result(&self, token: &str, test: &str, payload: Value) -> Result<RecordOutcome> {
        self.tracker.record_result(token, test, payload)
    }

    pub fn results(&self, token: &str) -> Result<ApiResults> {
        self.reports.aggregator().aggregate(token)
    }

    /// Rewrites the bundle of (`token`, `api`) and renders its report again.
    pub fn generate_api_report(&self, token: &str, api: &str) -> Result<PathBuf> {
        self.reports.generate_api_report(token, api)
    }

    pub fn generate_comparison_report<S: AsRef<str>>(
        &self,
        tokens: &[S],
        api: &str,
        reference: Option<&str>,
    ) -> Result<String> {
        self.reports
            .generate_comparison_report(tokens, api, reference)
    }

    pub fn comparison_key<S: AsRef<str>>(&self, tokens: &[S], reference: Option<&str>) -> ComparisonKey {
        comparison_key(tokens, reference)
    }

    pub fn comparison_tokens(&self, key: &ComparisonKey) -> Result<Vec<String>> {
        self.reports.comparison_tokens(key)
    }

    pub fn json_path(&self, token: &str, api: &str) -> Result<PathBuf> {
        let session = self.session(token)?;
        Ok(self.reports.resolver().json_path(&session, api))
    }

    pub fn json_location(&self, token: &str, api: &str) -> Result<JsonLocation> {
        let session = self.session(token)?;
        Ok(self.reports.resolver().json_location(&session, api))
    }

    pub fn single_report_path(&self, token: &str, api: &str) -> String {
        self.reports.resolver().single_report_path(token, api)
    }

    fn session(&self, token: &str) -> Result<Session> {
        self.registry
            .get_session(token)?
            .ok_or_else(|| ResultsError::SessionNotFound(token.to_string()))
    }
}
