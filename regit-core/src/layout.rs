//! On-disk layout of a repository
//!
//! ```text
//! {worktree}/
//!   .regit/
//!     objects/{hex}  content-addressed blobs
//!     index          staged entries
//!     stash          single saved index
//!     log            commit records
//!     HEAD           current branch ref
//!     refs/heads/{name}  branch refs
//!     refs/tags/{name}   tags, each holding a commit index
//!     config.json    optional settings
//!     lock           advisory lock file
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Name of the repository directory inside a working tree
pub const REPO_DIR: &str = ".regit";

/// Branch created by `init`
pub const DEFAULT_BRANCH: &str = "master";

/// Paths of every repository file, derived from the working-tree root
#[derive(Debug, Clone)]
pub struct RepoPaths {
    work_dir: PathBuf,
    repo_dir: PathBuf,
}

impl RepoPaths {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let repo_dir = work_dir.join(REPO_DIR);
        Self { work_dir, repo_dir }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.repo_dir.join("objects")
    }

    pub fn index_file(&self) -> PathBuf {
        self.repo_dir.join("index")
    }

    pub fn stash_file(&self) -> PathBuf {
        self.repo_dir.join("stash")
    }

    pub fn log_file(&self) -> PathBuf {
        self.repo_dir.join("log")
    }

    pub fn head_file(&self) -> PathBuf {
        self.repo_dir.join("HEAD")
    }

    pub fn heads_dir(&self) -> PathBuf {
        self.repo_dir.join("refs").join("heads")
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.repo_dir.join("refs").join("tags")
    }

    pub fn config_file(&self) -> PathBuf {
        self.repo_dir.join("config.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.repo_dir.join("lock")
    }

    /// Working-tree location of a tracked path
    pub fn worktree_path(&self, path: &str) -> PathBuf {
        self.work_dir.join(path)
    }

    /// Whether the object store directory is present
    pub fn exists(&self) -> bool {
        self.objects_dir().is_dir()
    }

    /// Create the directories and empty files of a fresh repository.
    ///
    /// Existing files are left alone, so running it twice is harmless.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(self.objects_dir())?;
        fs::create_dir_all(self.heads_dir())?;
        for file in [self.index_file(), self.log_file()] {
            if !file.exists() {
                fs::write(&file, b"")?;
            }
        }
        if !self.head_file().exists() {
            fs::write(
                self.head_file(),
                format!("ref: refs/heads/{}\n", DEFAULT_BRANCH),
            )?;
        }
        let default_ref = self.heads_dir().join(DEFAULT_BRANCH);
        if !default_ref.exists() {
            fs::write(default_ref, b"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_layout() {
        let tmp = TempDir::new().unwrap();
        let paths = RepoPaths::new(tmp.path());
        assert!(!paths.exists());

        paths.create().unwrap();
        assert!(paths.exists());
        assert!(paths.index_file().is_file());
        assert!(paths.log_file().is_file());
        assert_eq!(
            fs::read_to_string(paths.head_file()).unwrap(),
            "ref: refs/heads/master\n"
        );
        assert!(paths.heads_dir().join("master").is_file());
    }

    #[test]
    fn test_create_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let paths = RepoPaths::new(tmp.path());
        paths.create().unwrap();
        fs::write(paths.log_file(), "keep me").unwrap();
        paths.create().unwrap();
        assert_eq!(fs::read_to_string(paths.log_file()).unwrap(), "keep me");
    }
}
