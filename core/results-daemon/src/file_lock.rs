//! Advisory file locks shared between `wave-results` processes.
//!
//! The lock is held for as long as the returned [`FileLock`] lives and is
//! released when its file handle closes, including on crash.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Blocks until the exclusive lock on `path` is held.
    pub fn acquire(path: &Path) -> Result<Self, String> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .map_err(|e| format!("Failed to lock {}: {}", path.display(), e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Takes the lock only if no other handle holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, String> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(format!("Failed to lock {}: {}", path.display(), e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File, String> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)
            .map_err(|e| format!("Failed to create lock dir: {}", e))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| format!("Failed to open lock file {}: {}", path.display(), e))
}
