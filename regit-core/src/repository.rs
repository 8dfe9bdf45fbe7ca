//! Repository facade
//!
//! Ties the working tree, object store, index, stash and log together.
//! Every mutation of the index, stash or log loads the file, edits it in
//! memory and writes it back while holding the repository lock.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::RepoConfig;
use crate::error::{RepoError, Result};
use crate::index::{Index, IndexEntry};
use crate::layout::RepoPaths;
use crate::lock::RepoLock;
use crate::log::HistoryLog;
use crate::object::ObjectId;
use crate::refs;
use crate::store::{FsObjectStore, ObjectStore};

/// Result of staging a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// A new entry was appended with this object
    Added(ObjectId),
    /// The path already had an entry; nothing was written
    AlreadyStaged,
}

/// A repository rooted at a working tree
#[derive(Debug, Clone)]
pub struct Repository {
    paths: RepoPaths,
    store: FsObjectStore,
    config: RepoConfig,
}

impl Repository {
    /// Create the repository layout under `work_dir` and open it
    pub fn init(work_dir: &Path) -> Result<Self> {
        let paths = RepoPaths::new(work_dir);
        paths.create()?;
        tracing::info!("Initialized empty repository in {}", paths.repo_dir().display());
        Self::open(work_dir)
    }

    /// Open an existing repository
    pub fn open(work_dir: &Path) -> Result<Self> {
        let paths = RepoPaths::new(work_dir);
        if !paths.exists() {
            return Err(RepoError::NotARepository(work_dir.to_path_buf()));
        }
        let config = RepoConfig::load(&paths.config_file())?;
        let store = FsObjectStore::new(paths.objects_dir());
        Ok(Self {
            paths,
            store,
            config,
        })
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn work_dir(&self) -> &Path {
        self.paths.work_dir()
    }

    pub fn store(&self) -> &FsObjectStore {
        &self.store
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Replace and persist the configuration
    pub fn set_config(&mut self, config: RepoConfig) -> Result<()> {
        config.save(&self.paths.config_file())?;
        self.config = config;
        Ok(())
    }

    /// Take the repository lock, or a no-op guard if locking is off
    pub(crate) fn lock(&self) -> Result<RepoLock> {
        let path = self.paths.lock_file();
        if self.config.locking {
            RepoLock::acquire(&path)
        } else {
            Ok(RepoLock::disabled(&path))
        }
    }

    pub fn load_index(&self) -> Result<Index> {
        Index::load(&self.paths.index_file())
    }

    fn save_index(&self, index: &Index) -> Result<()> {
        index.save(&self.paths.index_file())
    }

    /// Load the commit history
    pub fn history(&self) -> Result<HistoryLog> {
        HistoryLog::open(&self.paths.log_file())
    }

    pub(crate) fn read_worktree_file(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(self.paths.worktree_path(path)).map_err(|e| RepoError::unreadable(path, e))
    }

    pub(crate) fn write_worktree_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.paths.worktree_path(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
        Ok(())
    }

    // ==================== Staging ====================

    /// Stage a working-tree file
    pub fn add(&self, path: &str) -> Result<StageOutcome> {
        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        if index.contains(path) {
            tracing::debug!("{} already staged", path);
            return Ok(StageOutcome::AlreadyStaged);
        }

        let data = self.read_worktree_file(path)?;
        let oid = self.store.put(&data)?;
        index.insert(IndexEntry::new(path, oid));
        self.save_index(&index)?;
        tracing::info!("Added {} as {}", path, oid);
        Ok(StageOutcome::Added(oid))
    }

    /// Unstage a path; returns false if it was not staged
    pub fn remove(&self, path: &str) -> Result<bool> {
        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        if index.remove(path).is_none() {
            return Ok(false);
        }
        self.save_index(&index)?;
        tracing::info!("Removed {} from staging", path);
        Ok(true)
    }

    /// Clear the staging area
    pub fn reset(&self) -> Result<()> {
        let _lock = self.lock()?;
        self.save_index(&Index::new())?;
        tracing::info!("Staging area cleared");
        Ok(())
    }

    /// Rename a staged file in the working tree and the index
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        if !index.contains(old) {
            return Err(RepoError::NotStaged(old.to_string()));
        }
        if old != new && index.contains(new) {
            return Err(RepoError::AlreadyStaged(new.to_string()));
        }
        fs::rename(self.paths.worktree_path(old), self.paths.worktree_path(new))?;
        index.rename(old, new);
        self.save_index(&index)?;
        tracing::info!("Renamed {} to {}", old, new);
        Ok(())
    }

    /// Move a staged file into `new_dir`, keeping its file name.
    ///
    /// Returns the new path.
    pub fn move_file(&self, file: &str, new_dir: &str) -> Result<String> {
        let name = Path::new(file)
            .file_name()
            .ok_or_else(|| RepoError::NotStaged(file.to_string()))?;
        let new_path = PathBuf::from(new_dir)
            .join(name)
            .to_string_lossy()
            .into_owned();
        self.rename(file, &new_path)?;
        Ok(new_path)
    }

    /// Staged content of a path
    pub fn show(&self, path: &str) -> Result<Bytes> {
        let index = self.load_index()?;
        let entry = index
            .get(path)
            .ok_or_else(|| RepoError::NotStaged(path.to_string()))?;
        self.store.get(&entry.oid)
    }

    /// Currently staged paths
    pub fn status(&self) -> Result<Vec<String>> {
        Ok(self.load_index()?.paths())
    }

    // ==================== Commits ====================

    /// Record the index as a new commit stamped with the current time
    pub fn commit(&self, message: &str) -> Result<usize> {
        self.commit_at(message, Utc::now())
    }

    /// Record the index as a new commit with an explicit timestamp.
    ///
    /// Returns the commit index and clears the staging area.
    pub fn commit_at(&self, message: &str, timestamp: DateTime<Utc>) -> Result<usize> {
        let _lock = self.lock()?;
        let index = self.load_index()?;
        if index.is_empty() {
            return Err(RepoError::NothingStaged);
        }
        let mut log = self.history()?;
        let idx = log.append(message, index.snapshot(), timestamp)?;
        self.save_index(&Index::new())?;
        tracing::info!("Committed {} files as commit {}: {}", index.len(), idx, message);
        Ok(idx)
    }

    // ==================== Stash ====================

    /// Move the index into the stash slot, replacing what was there
    pub fn stash_save(&self) -> Result<()> {
        let _lock = self.lock()?;
        let index = self.load_index()?;
        if index.is_empty() {
            return Err(RepoError::NothingStaged);
        }
        index.save(&self.paths.stash_file())?;
        self.save_index(&Index::new())?;
        tracing::info!("Stashed {} staged files", index.len());
        Ok(())
    }

    /// Overwrite the index with the stash slot (the slot is kept)
    pub fn stash_apply(&self) -> Result<()> {
        let _lock = self.lock()?;
        let stash = Index::load(&self.paths.stash_file())?;
        if stash.is_empty() {
            return Err(RepoError::NoStash);
        }
        self.save_index(&stash)?;
        tracing::info!("Applied stash ({} files)", stash.len());
        Ok(())
    }

    /// Empty the stash slot
    pub fn stash_drop(&self) -> Result<()> {
        let _lock = self.lock()?;
        Index::new().save(&self.paths.stash_file())?;
        tracing::info!("Dropped stash");
        Ok(())
    }

    // ==================== Objects ====================

    /// Every stored object id
    pub fn list_objects(&self) -> Result<Vec<ObjectId>> {
        self.store.list()
    }

    /// Delete an object regardless of references
    pub fn remove_object(&self, oid: &ObjectId) -> Result<()> {
        self.store.remove(oid)?;
        tracing::info!("Removed object {}", oid);
        Ok(())
    }

    /// Delete every object no commit refers to.
    ///
    /// Objects that are only staged or stashed are not protected.
    pub fn purge_unreferenced_objects(&self) -> Result<Vec<ObjectId>> {
        let _lock = self.lock()?;
        let live = self.history()?.referenced_objects();
        let purged = self.store.purge(&live)?;
        tracing::info!("Purged {} unreferenced objects", purged.len());
        Ok(purged)
    }

    /// Whether the working file's current bytes exist as an object
    pub fn is_tracked(&self, path: &str) -> Result<bool> {
        match fs::read(self.paths.worktree_path(path)) {
            Ok(data) => Ok(self.store.exists(&ObjectId::from_data(&data))),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                Ok(false)
            }
            Err(e) => Err(RepoError::unreadable(path, e)),
        }
    }

    // ==================== Branches ====================

    pub fn create_branch(&self, name: &str) -> Result<()> {
        refs::create_branch(&self.paths, name)
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        refs::delete_branch(&self.paths, name)
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        refs::list_branches(&self.paths)
    }

    pub fn current_branch(&self) -> Result<Option<String>> {
        refs::current_branch(&self.paths)
    }

    pub fn switch_branch(&self, name: &str) -> Result<()> {
        refs::switch_branch(&self.paths, name)
    }

    // ==================== Tags ====================

    /// Tag an existing commit
    pub fn create_tag(&self, name: &str, commit: usize) -> Result<()> {
        self.history()?.at(commit)?;
        refs::create_tag(&self.paths, name, commit)
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        refs::list_tags(&self.paths)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        refs::delete_tag(&self.paths, name)
    }

    pub fn show_tag(&self, name: &str) -> Result<usize> {
        refs::show_tag(&self.paths, name)
    }

    // ==================== Config ====================

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.config.get(key)
    }

    /// Update one config key and persist the file
    pub fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.set(key, value)?;
        self.set_config(config)?;
        tracing::info!("Set config {}={}", key, value);
        Ok(())
    }
}
