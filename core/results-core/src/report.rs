//! Bundle persistence and report generation.
//!
//! # Single-Session Reports
//!
//! When an API completes, its results are written to
//! `{root}/{token}/{api}/{abbrev}{version}.json` and the renderer turns that
//! directory into a report in place. `info.json` is written the first time a
//! session gets a directory and never overwritten.
//!
//! # Comparison Reports
//!
//! A comparison directory `{root}/{hash}` is a cache keyed by
//! [`comparison_key`]. Every request regenerates `{hash}/{api}` from scratch:
//! the renderer writes into a staging directory next to it, and the staging
//! directory is renamed to `{api}` only once rendering succeeded. A failed
//! request leaves no `{api}` directory behind. Requests for the same key are
//! serialized.

use std::path::PathBuf;
use std::sync::Arc;

use fs_err as fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::aggregate::ResultAggregator;
use crate::error::{Result, ResultsError};
use crate::fsutil::{ensure_dir, remove_dir_if_exists, write_json_pretty};
use crate::locks::{acquire, KeyedLocks};
use crate::paths::{comparison_key, ComparisonKey, JsonLocation, PathResolver};
use crate::patterns::RE_COMPARISON_COPY;
use crate::registry::SessionRegistry;
use crate::render::{MultiReportRequest, ReportRenderer, SingleReportRequest};
use crate::store::ResultStore;
use crate::types::{ApiBundle, Session};

const STAGING_PREFIX: &str = ".staging-";

pub struct ReportCoordinator {
    resolver: PathResolver,
    registry: Arc<dyn SessionRegistry>,
    aggregator: ResultAggregator,
    renderer: Arc<dyn ReportRenderer>,
    comparison_locks: KeyedLocks,
}

impl ReportCoordinator {
    pub fn new(
        resolver: PathResolver,
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn ResultStore>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            resolver,
            registry,
            aggregator: ResultAggregator::new(store),
            renderer,
            comparison_locks: KeyedLocks::new(),
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Single-Session Reports
    // ─────────────────────────────────────────────────────────────────────────────

    /// Writes the bundle for (`token`, `api`) and renders its report.
    ///
    /// Returns the bundle path.
    pub fn generate_api_report(&self, token: &str, api: &str) -> Result<PathBuf> {
        let session = self
            .registry
            .get_session(token)?
            .ok_or_else(|| ResultsError::SessionNotFound(token.to_string()))?;
        let bundle_path = self.save_api_results(&session, api)?;
        self.generate_report(&session, api)?;
        Ok(bundle_path)
    }

    /// Writes `{results: [...]}` for one API of `session`.
    pub fn save_api_results(&self, session: &Session, api: &str) -> Result<PathBuf> {
        let bundle = ApiBundle {
            results: self.aggregator.aggregate_api(&session.token, api)?,
        };

        self.ensure_session_layout(session, api)?;

        let path = self.resolver.json_path(session, api);
        write_json_pretty(&path, &bundle)?;
        info!(
            token = %session.token,
            api = %api,
            results = bundle.results.len(),
            path = %path.display(),
            "Saved API results"
        );
        Ok(path)
    }

    /// Renders the report for an API directory in place.
    pub fn generate_report(&self, session: &Session, api: &str) -> Result<()> {
        let dir = self.resolver.json_location(session, api).dir();
        let request = SingleReportRequest {
            input_dir: dir.clone(),
            output_dir: dir,
            spec_name: api.to_string(),
        };
        self.renderer.generate_report(&request)?;
        info!(token = %session.token, api = %api, "Generated report");
        Ok(())
    }

    fn ensure_session_layout(&self, session: &Session, api: &str) -> Result<()> {
        ensure_dir(self.resolver.root())?;
        ensure_dir(&self.resolver.session_dir(&session.token))?;

        let info_file = self.resolver.info_file(&session.token);
        if !info_file.exists() {
            write_json_pretty(&info_file, &session.info())?;
            debug!(token = %session.token, "Wrote session info");
        }

        ensure_dir(&self.resolver.api_dir(&session.token, api))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Comparison Reports
    // ─────────────────────────────────────────────────────────────────────────────

    /// Regenerates the comparison report of `tokens` for `api`.
    ///
    /// Bundles are expected to exist already; missing ones are the renderer's
    /// concern. Returns the report path relative to the results root.
    pub fn generate_comparison_report<S: AsRef<str>>(
        &self,
        tokens: &[S],
        api: &str,
        reference: Option<&str>,
    ) -> Result<String> {
        let key = comparison_key(tokens, reference);
        let lock = self.comparison_locks.lock_for(key.as_str());
        let _guard = acquire(&lock);

        let result_locations = self.result_locations(tokens, api)?;
        let reference_dir = reference.map(|token| self.resolver.api_dir(token, api));

        let comparison_dir = self.resolver.comparison_dir(&key);
        ensure_dir(&comparison_dir)?;
        let api_dir = self.resolver.comparison_api_dir(&key, api);
        remove_dir_if_exists(&api_dir)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&comparison_dir)
            .map_err(|e| {
                ResultsError::io(format!("create staging dir in {}", comparison_dir.display()), e)
            })?;

        let request = MultiReportRequest {
            output_dir: staging.path().to_path_buf(),
            spec_name: api.to_string(),
            result_locations,
            reference_dir,
        };
        self.renderer.generate_multi_report(&request)?;

        fs::rename(staging.path(), &api_dir)
            .map_err(|e| ResultsError::io(format!("publish {}", api_dir.display()), e))?;

        let report = self
            .resolver
            .comparison_report_path(&key, api, reference.is_some());
        info!(
            key = %key,
            api = %api,
            tokens = request.result_locations.len(),
            reference = ?reference,
            report = %report,
            "Generated comparison report"
        );
        Ok(report)
    }

    fn result_locations<S: AsRef<str>>(&self, tokens: &[S], api: &str) -> Result<Vec<JsonLocation>> {
        let mut locations: Vec<JsonLocation> = Vec::with_capacity(tokens.len());
        for token in tokens.iter().map(|token| token.as_ref()) {
            if locations.iter().any(|l| l.token == token) {
                continue;
            }
            let session = self
                .registry
                .get_session(token)?
                .ok_or_else(|| ResultsError::SessionNotFound(token.to_string()))?;
            locations.push(self.resolver.json_location(&session, api));
        }
        Ok(locations)
    }

    /// Tokens compared in the report directory for `key`.
    ///
    /// Read back from the per-token bundle copies (`{token}-{abbrev}{version}.json`)
    /// the renderer leaves in the first API directory. Empty when the directory is missing.
    pub fn comparison_tokens(&self, key: &ComparisonKey) -> Result<Vec<String>> {
        let comparison_dir = self.resolver.comparison_dir(key);
        if !comparison_dir.is_dir() {
            return Ok(Vec::new());
        }

        let first_api_dir = WalkDir::new(&comparison_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .find(|e| !e.file_name().to_string_lossy().starts_with('.'));
        let Some(api_dir) = first_api_dir else {
            return Ok(Vec::new());
        };

        let mut tokens: Vec<String> = WalkDir::new(api_dir.path())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                RE_COMPARISON_COPY
                    .captures(&name)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .collect();
        tokens.sort();
        tokens.dedup();
        Ok(tokens)
    }
}
