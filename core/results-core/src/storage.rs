//! Storage configuration and path management for WAVE results.
//!
//! `StorageConfig` centralizes where results, the result database and the
//! session registry live, so tests can inject a temp directory.

use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = ".wave";

/// Central configuration for all result storage paths.
///
/// Production code uses `StorageConfig::default()` which points to `~/.wave/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all data (default: ~/.wave)
    root: PathBuf,
    /// Directory holding per-session archives and comparison reports
    /// (default: ~/.wave/results)
    results_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(DATA_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME));
        Self::with_root(root)
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Results go to `{root}/results`.
    pub fn with_root(root: PathBuf) -> Self {
        let results_root = root.join("results");
        Self { root, results_root }
    }

    /// Creates a StorageConfig with an explicit results directory.
    pub fn with_roots(root: PathBuf, results_root: PathBuf) -> Self {
        Self { root, results_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `{token}/` archives and `{hash}/` comparison reports.
    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Path to results.db (durable result rows).
    pub fn database_file(&self) -> PathBuf {
        self.root.join("results.db")
    }

    /// Path to sessions.json (session registry).
    pub fn sessions_file(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// Path to results.toml (optional service configuration).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("results.toml")
    }
}
