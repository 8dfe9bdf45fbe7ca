//! Advisory repository lock
//!
//! Index and log updates are whole-file read-modify-write cycles. Holding an
//! exclusive OS lock on `.regit/lock` for the duration of a cycle serializes
//! concurrent invocations. The lock blocks until available and is released
//! when the guard drops.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Exclusive lock on a repository, released on drop
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Block until the lock file at `path` can be locked exclusively
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| RepoError::Lock(format!("cannot open {}: {}", path.display(), e)))?;

        file.lock_exclusive()
            .map_err(|e| RepoError::Lock(format!("cannot lock {}: {}", path.display(), e)))?;
        tracing::debug!("Acquired repository lock {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    /// A guard that holds nothing, used when locking is disabled
    pub fn disabled(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lock");

        let lock = RepoLock::acquire(&path).unwrap();
        assert!(lock.is_held());

        let other = File::open(&path).unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(lock);
        other.try_lock_exclusive().unwrap();
        FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_disabled_lock_holds_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lock");
        let lock = RepoLock::disabled(&path);
        assert!(!lock.is_held());
        assert!(!path.exists());
    }
}
