//! Deterministic locations for bundles, reports and comparison directories.
//!
//! # Layout
//!
//! ```text
//! {root}/{token}/info.json                      session metadata, written once
//! {root}/{token}/{api}/{abbrev}{version}.json   API bundle
//! {root}/{hash}/{api}/all.html                  comparison report
//! {root}/{hash}/{api}/all_filtered.html         comparison filtered by a reference token
//! ```
//!
//! # Comparison Keys
//!
//! `{hash}` is the SHA-256 of the canonical byte sequence: the distinct tokens
//! in ascending byte order, concatenated, then `,` and the reference token when
//! one is given. Input order never changes the key; a reference token always
//! does, even when it equals one of the compared tokens.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::types::Session;
use crate::user_agent::result_file_name;

pub const INFO_FILE: &str = "info.json";
pub const COMPARISON_REPORT_FILE: &str = "all.html";
pub const FILTERED_REPORT_FILE: &str = "all_filtered.html";
const REFERENCE_SEPARATOR: u8 = b',';

/// Content address of a comparison: a set of tokens plus an optional reference token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparisonKey(String);

impl ComparisonKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComparisonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the comparison key for `tokens` and an optional `reference` token.
pub fn comparison_key<S: AsRef<str>>(tokens: &[S], reference: Option<&str>) -> ComparisonKey {
    let sorted: BTreeSet<&str> = tokens.iter().map(|token| token.as_ref()).collect();

    let mut canonical = Vec::new();
    for token in sorted {
        canonical.extend_from_slice(token.as_bytes());
    }
    if let Some(reference) = reference {
        canonical.push(REFERENCE_SEPARATOR);
        canonical.extend_from_slice(reference.as_bytes());
    }

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    ComparisonKey(format!("{:x}", hasher.finalize()))
}

/// A bundle location split into its fragments, for renderers that take them separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonLocation {
    pub root: PathBuf,
    pub token: String,
    pub api: String,
    pub filename: String,
}

impl JsonLocation {
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.token).join(&self.api)
    }

    pub fn path(&self) -> PathBuf {
        self.dir().join(&self.filename)
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Session Paths
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn session_dir(&self, token: &str) -> PathBuf {
        self.root.join(token)
    }

    pub fn info_file(&self, token: &str) -> PathBuf {
        self.session_dir(token).join(INFO_FILE)
    }

    pub fn api_dir(&self, token: &str, api: &str) -> PathBuf {
        self.session_dir(token).join(api)
    }

    /// Bundle location for `session` and `api`, in descriptor form.
    pub fn json_location(&self, session: &Session, api: &str) -> JsonLocation {
        JsonLocation {
            root: self.root.clone(),
            token: session.token.clone(),
            api: api.to_string(),
            filename: result_file_name(&session.user_agent),
        }
    }

    /// Bundle path: `{root}/{token}/{api}/{abbrev}{version}.json`.
    pub fn json_path(&self, session: &Session, api: &str) -> PathBuf {
        self.json_location(session, api).path()
    }

    /// Single-session report, relative to the results root.
    pub fn single_report_path(&self, token: &str, api: &str) -> String {
        format!("{}/{}/{}", token, api, COMPARISON_REPORT_FILE)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Comparison Paths
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn comparison_dir(&self, key: &ComparisonKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    pub fn comparison_api_dir(&self, key: &ComparisonKey, api: &str) -> PathBuf {
        self.comparison_dir(key).join(api)
    }

    /// Comparison report, relative to the results root.
    pub fn comparison_report_path(&self, key: &ComparisonKey, api: &str, filtered: bool) -> String {
        let file = if filtered {
            FILTERED_REPORT_FILE
        } else {
            COMPARISON_REPORT_FILE
        };
        format!("{}/{}/{}", key, api, file)
    }
}
