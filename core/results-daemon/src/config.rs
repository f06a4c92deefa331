//! Service configuration loaded from `~/.wave/results.toml`.
//!
//! Every section is optional; a missing file means all defaults.

use std::path::PathBuf;

use serde::Deserialize;

use results_core::StorageConfig;

use crate::renderer::DEFAULT_PROGRAM;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub sessions: SessionsSection,
    #[serde(default)]
    pub renderer: RendererSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct StorageSection {
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct DatabaseSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct SessionsSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RendererSection {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            extra_args: Vec::new(),
        }
    }
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

impl ServiceConfig {
    pub fn storage(&self, base: &StorageConfig) -> StorageConfig {
        match &self.storage.results_dir {
            Some(dir) => StorageConfig::with_roots(base.root().to_path_buf(), dir.clone()),
            None => base.clone(),
        }
    }

    pub fn database_path(&self, storage: &StorageConfig) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| storage.database_file())
    }

    pub fn sessions_path(&self, storage: &StorageConfig) -> PathBuf {
        self.sessions
            .path
            .clone()
            .unwrap_or_else(|| storage.sessions_file())
    }
}

pub fn load_config(path: Option<PathBuf>, storage: &StorageConfig) -> Result<ServiceConfig, String> {
    let config_path = path.unwrap_or_else(|| storage.config_file());

    if !config_path.exists() {
        return Ok(ServiceConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read results config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<ServiceConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse results config {}: {}",
            config_path.display(),
            err
        )
    })
}
