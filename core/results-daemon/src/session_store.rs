//! File-backed session registry.
//!
//! Sessions live in one JSON file keyed by token. Every operation takes the
//! sidecar `.lock` file and reads the file fresh, so registries in separate
//! processes never write back a stale copy. Writes go through a temp file in
//! the same directory, then rename over the old one.
//!
//! A file that cannot be parsed, or carries another schema version, is moved
//! aside to `{name}.corrupt-{timestamp}` before the registry starts empty.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use results_core::{ResultsError, Session, SessionRegistry};

use crate::file_lock::FileLock;

const SESSIONS_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionsFile {
    version: u32,
    sessions: BTreeMap<String, Session>,
}

pub struct FileSessionRegistry {
    file_path: PathBuf,
    lock_path: PathBuf,
    local: Mutex<()>,
}

impl FileSessionRegistry {
    /// Binds the registry to `file_path`, reading it once to surface I/O errors early.
    pub fn load(file_path: &Path) -> Result<Self, String> {
        let registry = Self {
            file_path: file_path.to_path_buf(),
            lock_path: file_path.with_extension("lock"),
            local: Mutex::new(()),
        };
        registry.with_sessions(|_| Ok(()))?;
        Ok(registry)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn tokens(&self) -> Result<Vec<String>, String> {
        self.with_sessions(|sessions| Ok(sessions.keys().cloned().collect()))
    }

    fn get(&self, token: &str) -> Result<Option<Session>, String> {
        self.with_sessions(|sessions| Ok(sessions.get(token).cloned()))
    }

    fn upsert(&self, session: Session) -> Result<(), String> {
        self.with_sessions(|sessions| {
            sessions.insert(session.token.clone(), session);
            self.save(sessions)
        })
    }

    /// Runs `op` on a fresh read of the file while holding both locks.
    fn with_sessions<T>(
        &self,
        op: impl FnOnce(&mut BTreeMap<String, Session>) -> Result<T, String>,
    ) -> Result<T, String> {
        let _local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        let _file = FileLock::acquire(&self.lock_path)?;
        let mut sessions = read_sessions(&self.file_path)?;
        op(&mut sessions)
    }

    fn save(&self, sessions: &BTreeMap<String, Session>) -> Result<(), String> {
        let file = SessionsFile {
            version: SESSIONS_FILE_VERSION,
            sessions: sessions.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| format!("Failed to serialize sessions: {}", e))?;

        let parent_dir = self
            .file_path
            .parent()
            .ok_or_else(|| "Sessions file path has no parent directory".to_string())?;
        fs_err::create_dir_all(parent_dir)
            .map_err(|e| format!("Failed to create sessions dir: {}", e))?;

        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| format!("Temp file error: {}", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write temp sessions file: {}", e))?;
        temp_file
            .flush()
            .map_err(|e| format!("Failed to flush temp sessions file: {}", e))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|e| format!("Failed to write sessions file: {}", e.error))?;

        Ok(())
    }
}

fn read_sessions(file_path: &Path) -> Result<BTreeMap<String, Session>, String> {
    if !file_path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs_err::read_to_string(file_path)
        .map_err(|e| format!("Failed to read sessions file: {}", e))?;

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    match serde_json::from_str::<SessionsFile>(&content) {
        Ok(file) if file.version == SESSIONS_FILE_VERSION => Ok(file.sessions),
        Ok(file) => {
            let moved_to = quarantine(file_path)?;
            tracing::warn!(
                version = file.version,
                expected = SESSIONS_FILE_VERSION,
                moved_to = %moved_to.display(),
                "Unsupported sessions file version, moved aside"
            );
            Ok(BTreeMap::new())
        }
        Err(e) => {
            let moved_to = quarantine(file_path)?;
            tracing::warn!(
                error = %e,
                moved_to = %moved_to.display(),
                "Failed to parse sessions file, moved aside"
            );
            Ok(BTreeMap::new())
        }
    }
}

fn quarantine(file_path: &Path) -> Result<PathBuf, String> {
    let mut name = file_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("sessions.json"));
    name.push(format!(
        ".corrupt-{}",
        Utc::now().format("%Y%m%dT%H%M%S%.6fZ")
    ));
    let target = file_path.with_file_name(name);
    fs_err::rename(file_path, &target)
        .map_err(|e| format!("Failed to move unreadable sessions file aside: {}", e))?;
    Ok(target)
}

impl SessionRegistry for FileSessionRegistry {
    fn get_session(&self, token: &str) -> results_core::Result<Option<Session>> {
        self.get(token).map_err(ResultsError::Registry)
    }

    fn update_session(&self, session: &Session) -> results_core::Result<()> {
        self.upsert(session.clone()).map_err(ResultsError::Registry)
    }

    fn add_session(&self, session: Session) -> results_core::Result<()> {
        self.upsert(session).map_err(ResultsError::Registry)
    }
}
