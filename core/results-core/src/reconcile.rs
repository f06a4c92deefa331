//! Startup import of result archives written by earlier runs.
//!
//! Each `{root}/{token}/` directory with an `info.json` is an archive. Tokens
//! the registry doesn't know yet are registered as completed sessions and their
//! bundles are replayed into the result store. Archives are trusted on first
//! sight: a token the registry already knows is skipped without comparing
//! contents.
//!
//! Every token gets its own [`LoadOutcome`]; one bad archive never stops the
//! scan. All bundles of a token are parsed and replayed into the store before
//! the session is registered, so a failure at any step leaves the token
//! unknown and the next pass retries it. Records whose test already has a
//! stored row are not replayed again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ResultsError};
use crate::fsutil::read_json;
use crate::normalize::normalize;
use crate::paths::{PathResolver, INFO_FILE};
use crate::patterns::RE_ARCHIVE_FILE;
use crate::registry::SessionRegistry;
use crate::store::ResultStore;
use crate::types::{ResultRecord, Session, SessionInfo, SessionStatus};
use crate::user_agent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotADirectory,
    MissingInfo,
    AlreadyKnown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Imported { apis: usize, results: usize },
    Skipped(SkipReason),
    Failed(String),
}

/// Per-entry outcomes of one reconciliation pass, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub entries: Vec<(String, LoadOutcome)>,
}

impl LoadSummary {
    pub fn imported(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Imported { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Failed(_)))
    }

    pub fn outcome(&self, token: &str) -> Option<&LoadOutcome> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&LoadOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[derive(Deserialize)]
struct ArchivedBundle {
    results: Vec<Value>,
}

struct ArchivedApi {
    api: String,
    results: Vec<ResultRecord>,
}

pub struct ReconciliationLoader {
    resolver: PathResolver,
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn ResultStore>,
}

impl ReconciliationLoader {
    pub fn new(
        resolver: PathResolver,
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            resolver,
            registry,
            store,
        }
    }

    /// Imports every archive under the results root not yet known to the registry.
    ///
    /// A missing root is an empty summary. Only failing to list the root is an error.
    pub fn load_results(&self) -> Result<LoadSummary> {
        let root = self.resolver.root();
        let mut summary = LoadSummary::default();
        if !root.exists() {
            debug!(root = %root.display(), "Results directory missing, nothing to load");
            return Ok(summary);
        }

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                ResultsError::io(format!("list {}", root.display()), e.into())
            })?;
            let token = entry.file_name().to_string_lossy().into_owned();

            let outcome = if entry.file_type().is_dir() {
                self.load_token(&token, entry.path())
                    .unwrap_or_else(|err| {
                        warn!(token = %token, error = %err, "Failed to load archived results");
                        LoadOutcome::Failed(err.to_string())
                    })
            } else {
                LoadOutcome::Skipped(SkipReason::NotADirectory)
            };
            summary.entries.push((token, outcome));
        }

        info!(
            imported = summary.imported(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Reconciled archived results"
        );
        Ok(summary)
    }

    fn load_token(&self, token: &str, dir: &Path) -> Result<LoadOutcome> {
        let info_file = dir.join(INFO_FILE);
        if !info_file.exists() {
            return Ok(LoadOutcome::Skipped(SkipReason::MissingInfo));
        }
        let info: SessionInfo = read_json(&info_file)?;

        if self.registry.get_session(token)?.is_some() {
            debug!(token = %token, "Archive already known");
            return Ok(LoadOutcome::Skipped(SkipReason::AlreadyKnown));
        }

        let browser = user_agent::parse(&info.user_agent);
        info!(
            token = %token,
            browser = %browser.name,
            version = %browser.version,
            "Loading archived results"
        );

        let apis = read_archived_apis(dir)?;

        let mut session = Session::new(token, info.user_agent).with_status(SessionStatus::Completed);
        session.path = info.path;
        session.types = info.types;
        for archived in &apis {
            for record in &archived.results {
                if !session.test_exists(&record.test) {
                    session.tests.push(record.test.clone());
                }
                session.complete_test(&record.test);
            }
        }

        let mut stored: HashSet<String> = self
            .store
            .get_results(token)?
            .into_iter()
            .map(|row| row.record.test)
            .collect();
        let mut replayed = 0;
        for archived in &apis {
            for record in &archived.results {
                if stored.insert(record.test.clone()) {
                    self.store.create_result(token, record)?;
                }
                replayed += 1;
            }
            debug!(token = %token, api = %archived.api, results = archived.results.len(), "Replayed API");
        }

        self.registry.add_session(session)?;

        info!(token = %token, apis = apis.len(), results = replayed, "Loaded archived results");
        Ok(LoadOutcome::Imported {
            apis: apis.len(),
            results: replayed,
        })
    }
}

fn read_archived_apis(dir: &Path) -> Result<Vec<ArchivedApi>> {
    let mut apis = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ResultsError::io(format!("list {}", dir.display()), e.into()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let api = entry.file_name().to_string_lossy().into_owned();
        let Some(bundle_path) = find_archive_file(entry.path())? else {
            debug!(api = %api, dir = %entry.path().display(), "No archived bundle");
            continue;
        };

        let bundle: ArchivedBundle = read_json(&bundle_path)?;
        let results = bundle
            .results
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                ResultsError::InvalidRecord(format!("{}: {}", bundle_path.display(), e))
            })?;
        apis.push(ArchivedApi { api, results });
    }
    Ok(apis)
}

fn find_archive_file(api_dir: &Path) -> Result<Option<PathBuf>> {
    for entry in WalkDir::new(api_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.map_err(|e| ResultsError::io(format!("list {}", api_dir.display()), e.into()))?;
        if entry.file_type().is_file() && RE_ARCHIVE_FILE.is_match(&entry.file_name().to_string_lossy()) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}
