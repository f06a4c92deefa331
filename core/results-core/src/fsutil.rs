//! File-system helpers mapping I/O failures into [`ResultsError`].

use std::io::Write;
use std::path::Path;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{Result, ResultsError};

pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .map_err(|e| ResultsError::io(format!("create directory {}", path.display()), e))
}

pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .map_err(|e| ResultsError::io(format!("remove directory {}", path.display()), e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ResultsError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| ResultsError::io(format!("read {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| ResultsError::json(path.display().to_string(), e))
}

/// Writes `value` as indented JSON via temp file + rename.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| ResultsError::json(format!("serialize {}", path.display()), e))?;
    let parent = path.parent().ok_or_else(|| {
        ResultsError::io(
            format!("resolve parent of {}", path.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        )
    })?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| ResultsError::io(format!("create temp file in {}", parent.display()), e))?;
    temp_file
        .write_all(content.as_bytes())
        .and_then(|_| temp_file.flush())
        .map_err(|e| ResultsError::io(format!("write temp file for {}", path.display()), e))?;
    temp_file
        .persist(path)
        .map_err(|e| ResultsError::io(format!("write {}", path.display()), e.error))?;
    Ok(())
}
