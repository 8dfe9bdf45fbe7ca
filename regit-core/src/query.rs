//! History queries and working-tree restores
//!
//! Read-only lookups over the log and object store, plus the operations that
//! write committed content back into the working tree (checkout, restore,
//! revert, cherry-pick).

use bytes::Bytes;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

use crate::error::{RepoError, Result};
use crate::index::IndexEntry;
use crate::log::{CommitRecord, HistoryLog};
use crate::object::ObjectId;
use crate::repository::Repository;
use crate::store::ObjectStore;

/// Header fields of one commit, as printed by `list-commits`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub index: usize,
    pub timestamp: String,
    pub date: String,
}

/// One difference between the index and the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    /// The staged path no longer exists in the working tree
    MissingInWorkingTree { path: String },
    /// Staged and working contents differ; both are reported whole
    Modified {
        path: String,
        staged: Bytes,
        working: Bytes,
    },
}

impl DiffEntry {
    pub fn path(&self) -> &str {
        match self {
            DiffEntry::MissingInWorkingTree { path } | DiffEntry::Modified { path, .. } => path,
        }
    }
}

/// A line of the last known version of a file and the commit credited with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameLine {
    pub line_no: usize,
    pub commit: usize,
    pub message: String,
    pub text: String,
}

/// Contents of one path at two commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDiff {
    pub path: String,
    pub from_index: usize,
    pub to_index: usize,
    pub from: Bytes,
    pub to: Bytes,
}

impl CommitDiff {
    pub fn is_identical(&self) -> bool {
        self.from == self.to
    }
}

/// Paths written to the working tree, and paths skipped for missing objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
}

impl Repository {
    /// Every commit record, in log order
    pub fn log(&self) -> Result<Vec<CommitRecord>> {
        Ok(self.history()?.records().to_vec())
    }

    pub fn commit_count(&self) -> Result<usize> {
        Ok(self.history()?.count())
    }

    pub fn list_commits(&self) -> Result<Vec<CommitSummary>> {
        Ok(self
            .history()?
            .iter()
            .map(|(index, r)| CommitSummary {
                index,
                timestamp: r.timestamp.clone(),
                date: r.date.clone(),
            })
            .collect())
    }

    /// Compare every staged entry against the working tree
    pub fn diff(&self) -> Result<Vec<DiffEntry>> {
        let index = self.load_index()?;
        let mut diffs = Vec::new();

        for entry in index.iter() {
            let staged = match self.store().get(&entry.oid) {
                Ok(data) => data,
                Err(RepoError::ObjectNotFound(oid)) => {
                    tracing::warn!("Skipping {}: object {} missing", entry.path, oid);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let working = match fs::read(self.paths().worktree_path(&entry.path)) {
                Ok(data) => Bytes::from(data),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    diffs.push(DiffEntry::MissingInWorkingTree {
                        path: entry.path.clone(),
                    });
                    continue;
                }
                Err(e) => return Err(RepoError::unreadable(entry.path.as_str(), e)),
            };

            if staged != working {
                diffs.push(DiffEntry::Modified {
                    path: entry.path.clone(),
                    staged,
                    working,
                });
            }
        }
        Ok(diffs)
    }

    /// Commits that recorded `path`, in commit order
    pub fn file_history(&self, path: &str) -> Result<Vec<(usize, CommitRecord)>> {
        Ok(self
            .history()?
            .iter()
            .filter(|(_, r)| r.touches(path))
            .map(|(i, r)| (i, r.clone()))
            .collect())
    }

    /// Attribute each line of the latest recorded version of `path`.
    ///
    /// Every commit that recorded the file claims all line positions of its
    /// version, so the newest commit owns even lines it did not change.
    pub fn blame(&self, path: &str) -> Result<Vec<BlameLine>> {
        let log = self.history()?;
        let mut latest: Option<(usize, Vec<String>)> = None;

        for (idx, record) in log.iter() {
            let Some(entry) = record.entry(path) else {
                continue;
            };
            match self.store().get(&entry.oid) {
                Ok(data) => {
                    let lines = String::from_utf8_lossy(&data)
                        .lines()
                        .map(str::to_string)
                        .collect();
                    latest = Some((idx, lines));
                }
                Err(RepoError::ObjectNotFound(_)) => {
                    tracing::warn!("Blame skipping commit {}: object {} missing", idx, entry.oid);
                }
                Err(e) => return Err(e),
            }
        }

        let Some((commit, lines)) = latest else {
            return Ok(Vec::new());
        };
        let message = log.at(commit)?.message.clone();
        Ok(lines
            .into_iter()
            .enumerate()
            .map(|(line_no, text)| BlameLine {
                line_no,
                commit,
                message: message.clone(),
                text,
            })
            .collect())
    }

    fn entry_at(log: &HistoryLog, path: &str, index: usize) -> Result<IndexEntry> {
        log.at(index)?
            .entry(path)
            .cloned()
            .ok_or_else(|| RepoError::FileNotInCommit {
                path: path.to_string(),
                index,
            })
    }

    /// Object id recorded for `path` by commit `index`
    pub fn get_commit_oid_for_file(&self, path: &str, index: usize) -> Result<ObjectId> {
        Ok(Self::entry_at(&self.history()?, path, index)?.oid)
    }

    /// Content of `path` as recorded by commit `index`
    pub fn get_file_version(&self, path: &str, index: usize) -> Result<Bytes> {
        let oid = self.get_commit_oid_for_file(path, index)?;
        self.store().get(&oid)
    }

    /// Overwrite the working file with its content at commit `index`
    pub fn restore_file_from_commit(&self, path: &str, index: usize) -> Result<()> {
        let data = self.get_file_version(path, index)?;
        self.write_worktree_file(path, &data)?;
        tracing::info!("Restored {} from commit {}", path, index);
        Ok(())
    }

    pub fn get_commit_message(&self, index: usize) -> Result<String> {
        Ok(self.history()?.at(index)?.message.clone())
    }

    pub fn get_commit_date(&self, index: usize) -> Result<String> {
        Ok(self.history()?.at(index)?.date.clone())
    }

    /// Entries recorded by commit `index`
    pub fn commit_files(&self, index: usize) -> Result<Vec<IndexEntry>> {
        Ok(self.history()?.at(index)?.entries.clone())
    }

    /// Content of `path` at two commits
    pub fn show_commit_diff(&self, path: &str, from: usize, to: usize) -> Result<CommitDiff> {
        let log = self.history()?;
        let from_entry = Self::entry_at(&log, path, from)?;
        let to_entry = Self::entry_at(&log, path, to)?;
        Ok(CommitDiff {
            path: path.to_string(),
            from_index: from,
            to_index: to,
            from: self.store().get(&from_entry.oid)?,
            to: self.store().get(&to_entry.oid)?,
        })
    }

    /// Commits whose raw record text contains `needle`
    pub fn find_commit_by_message(&self, needle: &str) -> Result<Vec<usize>> {
        Ok(self.history()?.search(|text| text.contains(needle)))
    }

    /// Every oid recorded for `path`, in commit order
    pub fn find_file_oids(&self, path: &str) -> Result<Vec<ObjectId>> {
        Ok(self
            .history()?
            .records()
            .iter()
            .filter_map(|r| r.entry(path).map(|e| e.oid))
            .collect())
    }

    /// Every path any commit recorded, sorted and de-duplicated
    pub fn list_all_tracked_files(&self) -> Result<Vec<String>> {
        let paths: BTreeSet<String> = self
            .history()?
            .records()
            .iter()
            .flat_map(|r| r.entries.iter().map(|e| e.path.clone()))
            .collect();
        Ok(paths.into_iter().collect())
    }

    fn write_entries(&self, entries: &[IndexEntry]) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        for entry in entries {
            match self.store().get(&entry.oid) {
                Ok(data) => {
                    self.write_worktree_file(&entry.path, &data)?;
                    tracing::debug!("Wrote {} from {}", entry.path, entry.oid);
                    report.restored.push(entry.path.clone());
                }
                Err(RepoError::ObjectNotFound(oid)) => {
                    tracing::warn!("Skipping {}: object {} missing", entry.path, oid);
                    report.skipped.push(entry.path.clone());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Write every entry of the latest commit into the working tree.
    ///
    /// Uncommitted edits to those paths are overwritten without warning.
    pub fn checkout(&self) -> Result<RestoreReport> {
        let log = self.history()?;
        let latest = log.latest()?;
        let report = self.write_entries(&latest.entries)?;
        tracing::info!(
            "Checked out commit {} ({} files, {} skipped)",
            log.count() - 1,
            report.restored.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Delete every path recorded by commit `index` from the working tree.
    ///
    /// Returns the paths actually removed.
    pub fn revert(&self, index: usize) -> Result<Vec<String>> {
        let record = self.history()?.at(index)?.clone();
        let mut removed = Vec::new();
        for entry in &record.entries {
            match fs::remove_file(self.paths().worktree_path(&entry.path)) {
                Ok(()) => removed.push(entry.path.clone()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("Reverted commit {}: removed {} files", index, removed.len());
        Ok(removed)
    }

    /// Write the files of commit `index` into the working tree
    pub fn cherry_pick(&self, index: usize) -> Result<RestoreReport> {
        let record = self.history()?.at(index)?.clone();
        let report = self.write_entries(&record.entries)?;
        tracing::info!(
            "Cherry-picked commit {} ({} files)",
            index,
            report.restored.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Repository) {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        (tmp, repo)
    }

    fn commit_file(repo: &Repository, path: &str, data: &str, message: &str) -> usize {
        repo.write_worktree_file(path, data.as_bytes()).unwrap();
        repo.add(path).unwrap();
        repo.commit(message).unwrap()
    }

    #[test]
    fn test_file_version_roundtrip() {
        let (_tmp, repo) = setup();
        let idx = commit_file(&repo, "a.txt", "version one", "first");
        commit_file(&repo, "a.txt", "version two", "second");

        assert_eq!(repo.get_file_version("a.txt", idx).unwrap().as_ref(), b"version one");
        assert_eq!(repo.get_file_version("a.txt", 1).unwrap().as_ref(), b"version two");
        assert_eq!(repo.get_commit_message(1).unwrap(), "second");
        assert!(matches!(
            repo.get_file_version("b.txt", 0),
            Err(RepoError::FileNotInCommit { index: 0, .. })
        ));
        assert!(matches!(
            repo.get_file_version("a.txt", 7),
            Err(RepoError::InvalidCommitIndex { index: 7, count: 2 })
        ));
    }

    #[test]
    fn test_diff_reports_missing_and_modified() {
        let (tmp, repo) = setup();
        repo.write_worktree_file("same.txt", b"same").unwrap();
        repo.write_worktree_file("edit.txt", b"before").unwrap();
        repo.write_worktree_file("gone.txt", b"gone").unwrap();
        for p in ["same.txt", "edit.txt", "gone.txt"] {
            repo.add(p).unwrap();
        }
        repo.write_worktree_file("edit.txt", b"after").unwrap();
        fs::remove_file(tmp.path().join("gone.txt")).unwrap();

        let diffs = repo.diff().unwrap();
        assert_eq!(
            diffs,
            vec![
                DiffEntry::Modified {
                    path: "edit.txt".into(),
                    staged: Bytes::from_static(b"before"),
                    working: Bytes::from_static(b"after"),
                },
                DiffEntry::MissingInWorkingTree {
                    path: "gone.txt".into()
                },
            ]
        );
    }

    #[test]
    fn test_diff_skips_missing_object() {
        let (_tmp, repo) = setup();
        repo.write_worktree_file("a.txt", b"a").unwrap();
        repo.add("a.txt").unwrap();
        let oid = repo.load_index().unwrap().get("a.txt").unwrap().oid;
        repo.store().remove(&oid).unwrap();
        assert!(repo.diff().unwrap().is_empty());
    }

    #[test]
    fn test_blame_latest_commit_owns_every_line() {
        let (_tmp, repo) = setup();
        commit_file(&repo, "f.txt", "a\nb\n", "one");
        commit_file(&repo, "other.txt", "x", "unrelated");
        commit_file(&repo, "f.txt", "a\nb\nc\n", "three");

        let blame = repo.blame("f.txt").unwrap();
        assert_eq!(blame.len(), 3);
        assert!(blame.iter().all(|l| l.commit == 2 && l.message == "three"));
        assert_eq!(blame[2].text, "c");
        assert!(repo.blame("nope.txt").unwrap().is_empty());
    }

    #[test]
    fn test_history_queries() {
        let (_tmp, repo) = setup();
        commit_file(&repo, "a.txt", "1", "fix a");
        commit_file(&repo, "b.txt", "2", "add b");
        commit_file(&repo, "a.txt", "3", "fix a again");

        let history: Vec<usize> = repo
            .file_history("a.txt")
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(history, vec![0, 2]);
        assert_eq!(repo.find_commit_by_message("fix").unwrap(), vec![0, 2]);
        assert_eq!(
            repo.find_file_oids("a.txt").unwrap(),
            vec![ObjectId::from_data(b"1"), ObjectId::from_data(b"3")]
        );
        assert_eq!(repo.list_all_tracked_files().unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(repo.commit_count().unwrap(), 3);
        assert_eq!(repo.list_commits().unwrap()[1].index, 1);
    }

    #[test]
    fn test_checkout_restores_latest() {
        let (tmp, repo) = setup();
        assert!(matches!(repo.checkout(), Err(RepoError::NoCommits)));

        commit_file(&repo, "a.txt", "committed", "c");
        repo.write_worktree_file("a.txt", b"scribble").unwrap();
        fs::write(tmp.path().join("untracked.txt"), "stay").unwrap();

        let report = repo.checkout().unwrap();
        assert_eq!(report.restored, vec!["a.txt"]);
        assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "committed");
        assert!(tmp.path().join("untracked.txt").exists());
    }

    #[test]
    fn test_checkout_skips_missing_objects() {
        let (_tmp, repo) = setup();
        commit_file(&repo, "a.txt", "a", "c");
        repo.store().remove(&ObjectId::from_data(b"a")).unwrap();
        let report = repo.checkout().unwrap();
        assert!(report.restored.is_empty());
        assert_eq!(report.skipped, vec!["a.txt"]);
    }

    #[test]
    fn test_restore_into_missing_directory() {
        let (tmp, repo) = setup();
        commit_file(&repo, "dir/a.txt", "nested", "c");
        fs::remove_dir_all(tmp.path().join("dir")).unwrap();
        repo.restore_file_from_commit("dir/a.txt", 0).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("dir/a.txt")).unwrap(), "nested");
    }

    #[test]
    fn test_revert_and_cherry_pick() {
        let (tmp, repo) = setup();
        commit_file(&repo, "a.txt", "a", "c");
        assert_eq!(repo.revert(0).unwrap(), vec!["a.txt"]);
        assert!(!tmp.path().join("a.txt").exists());
        // Already gone: nothing to remove, no error.
        assert!(repo.revert(0).unwrap().is_empty());

        let report = repo.cherry_pick(0).unwrap();
        assert_eq!(report.restored, vec!["a.txt"]);
        assert_eq!(repo.commit_count().unwrap(), 1);
    }

    #[test]
    fn test_show_commit_diff() {
        let (_tmp, repo) = setup();
        commit_file(&repo, "a.txt", "old", "one");
        commit_file(&repo, "a.txt", "new", "two");
        let diff = repo.show_commit_diff("a.txt", 0, 1).unwrap();
        assert_eq!(diff.from.as_ref(), b"old");
        assert_eq!(diff.to.as_ref(), b"new");
        assert!(!diff.is_identical());
        assert!(repo.show_commit_diff("a.txt", 0, 5).is_err());
    }
}
