//! Repository synchronization
//!
//! Moves whole objects and whole log text between two repository roots on
//! reachable filesystems. Objects are copied only when missing at the
//! destination. Logs are reconciled by appending the source log to the
//! destination log; there is no common-ancestor detection.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use crate::config::MergeMode;
use crate::error::{RepoError, Result};
use crate::layout::RepoPaths;
use crate::log::{split_records, RECORD_DELIMITER};
use crate::object::ObjectId;
use crate::repository::Repository;
use crate::store::ObjectStore;

/// Statistics for one sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Objects written to the destination
    pub objects_copied: u64,
    /// Objects already present at the destination
    pub objects_skipped: u64,
    /// Payload bytes written
    pub bytes_copied: u64,
    /// Log records added to the destination
    pub records_appended: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "Copied {} objects ({} skipped, {}), appended {} log records in {}ms",
            self.objects_copied,
            self.objects_skipped,
            format_size(self.bytes_copied),
            self.records_appended,
            self.duration_ms
        )
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Copy every object of `src` that `dst` lacks
pub fn copy_missing_objects<S, D>(src: &S, dst: &D, report: &mut SyncReport) -> Result<()>
where
    S: ObjectStore + ?Sized,
    D: ObjectStore + ?Sized,
{
    for id in src.list()? {
        if dst.exists(&id) {
            report.objects_skipped += 1;
            continue;
        }
        let data = src.get(&id)?;
        let written: ObjectId = dst.put(&data)?;
        if written != id {
            tracing::warn!("Object {} content hashes to {}", id, written);
        }
        report.objects_copied += 1;
        report.bytes_copied += data.len() as u64;
        tracing::debug!("Copied object {} ({} bytes)", id, data.len());
    }
    Ok(())
}

/// Combine `incoming` log text into `base`.
///
/// Returns the new text and the number of records added.
pub fn merge_text(base: &str, incoming: &str, mode: MergeMode) -> (String, usize) {
    match mode {
        MergeMode::Concatenate => (
            format!("{base}{incoming}"),
            split_records(incoming).len(),
        ),
        MergeMode::Deduplicate => {
            let existing = split_records(base);
            let mut merged = base.to_string();
            let mut added = 0;
            for record in split_records(incoming) {
                if existing.contains(&record) {
                    continue;
                }
                merged.push_str(record);
                merged.push_str(RECORD_DELIMITER);
                added += 1;
            }
            (merged, added)
        }
    }
}

fn read_log_text(paths: &RepoPaths) -> Result<String> {
    match fs::read_to_string(paths.log_file()) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

fn open_remote(remote: &Path) -> Result<Repository> {
    Repository::open(remote).map_err(|e| match e {
        RepoError::NotARepository(path) => RepoError::RemoteUnreachable(path),
        other => other,
    })
}

/// Sync operations run from a local repository against a peer root
pub struct SyncEngine<'a> {
    local: &'a Repository,
    mode: MergeMode,
}

impl<'a> SyncEngine<'a> {
    /// Engine using the local repository's configured merge mode
    pub fn new(local: &'a Repository) -> Self {
        Self {
            local,
            mode: local.config().merge_mode,
        }
    }

    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    /// Copy objects from `src` to `dst` and append `src`'s log to `dst`'s.
    ///
    /// Only `dst` is locked.
    fn transfer(&self, src: &Repository, dst: &Repository, with_log: bool) -> Result<SyncReport> {
        let start = Instant::now();
        let mut report = SyncReport::default();
        let _lock = dst.lock()?;

        copy_missing_objects(src.store(), dst.store(), &mut report)?;

        if with_log {
            let base = read_log_text(dst.paths())?;
            let incoming = read_log_text(src.paths())?;
            let (merged, added) = merge_text(&base, &incoming, self.mode);
            if added > 0 {
                fs::write(dst.paths().log_file(), merged)?;
            }
            report.records_appended = added;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Send local objects and log to the remote
    pub fn push(&self, remote: &Path) -> Result<SyncReport> {
        let remote_repo = open_remote(remote)?;
        let report = self.transfer(self.local, &remote_repo, true)?;
        tracing::info!("Pushed to {}: {}", remote.display(), report);
        Ok(report)
    }

    /// Bring remote objects and log into the local repository
    pub fn pull(&self, remote: &Path) -> Result<SyncReport> {
        let remote_repo = open_remote(remote)?;
        let report = self.transfer(&remote_repo, self.local, true)?;
        tracing::info!("Pulled from {}: {}", remote.display(), report);
        Ok(report)
    }

    /// Copy remote objects only; the local log is untouched
    pub fn fetch(&self, remote: &Path) -> Result<SyncReport> {
        let remote_repo = open_remote(remote)?;
        let report = self.transfer(&remote_repo, self.local, false)?;
        tracing::info!("Fetched from {}: {}", remote.display(), report);
        Ok(report)
    }

    /// Same effect as pull
    pub fn merge(&self, remote: &Path) -> Result<SyncReport> {
        let remote_repo = open_remote(remote)?;
        let report = self.transfer(&remote_repo, self.local, true)?;
        tracing::info!("Merged from {}: {}", remote.display(), report);
        Ok(report)
    }

    /// Push, creating the remote layout first if needed
    pub fn merge_to_remote(&self, remote: &Path) -> Result<SyncReport> {
        RepoPaths::new(remote).create()?;
        let remote_repo = Repository::open(remote)?;
        let report = self.transfer(self.local, &remote_repo, true)?;
        tracing::info!("Merged into {}: {}", remote.display(), report);
        Ok(report)
    }
}

/// Initialize `target` and copy every object and the whole log of `remote`.
///
/// The target's log is replaced by the remote's verbatim.
pub fn clone_repository(remote: &Path, target: &Path) -> Result<(Repository, SyncReport)> {
    let start = Instant::now();
    let remote_repo = open_remote(remote)?;
    let local = Repository::init(target)?;
    let mut report = SyncReport::default();
    {
        let _lock = local.lock()?;
        copy_missing_objects(remote_repo.store(), local.store(), &mut report)?;
        let text = read_log_text(remote_repo.paths())?;
        fs::write(local.paths().log_file(), &text)?;
        report.records_appended = split_records(&text).len();
    }
    report.duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Cloned {} to {}: {}",
        remote.display(),
        target.display(),
        report
    );
    Ok((local, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_with_commits(n: usize) -> (TempDir, Repository) {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        for i in 0..n {
            let name = format!("file{i}.txt");
            fs::write(tmp.path().join(&name), format!("content {i}")).unwrap();
            repo.add(&name).unwrap();
            repo.commit(&format!("commit {i}")).unwrap();
        }
        (tmp, repo)
    }

    #[test]
    fn test_merge_text_modes() {
        let a = "commit 1\n---\n";
        let b = "commit 2\n---\n";
        let base = format!("{a}{b}");
        let incoming = format!("{b}commit 3\n---\n");

        let (cat, added) = merge_text(&base, &incoming, MergeMode::Concatenate);
        assert_eq!(cat, format!("{base}{incoming}"));
        assert_eq!(added, 2);

        let (dedup, added) = merge_text(&base, &incoming, MergeMode::Deduplicate);
        assert_eq!(dedup, format!("{a}{b}commit 3\n---\n"));
        assert_eq!(added, 1);
    }

    #[test]
    fn test_remote_must_exist() {
        let (_tmp, local) = repo_with_commits(1);
        let missing = TempDir::new().unwrap();
        let engine = SyncEngine::new(&local);
        assert!(matches!(
            engine.push(missing.path()),
            Err(RepoError::RemoteUnreachable(_))
        ));
        assert!(matches!(
            clone_repository(missing.path(), &missing.path().join("t")),
            Err(RepoError::RemoteUnreachable(_))
        ));
    }

    #[test]
    fn test_push_twice_duplicates_records() {
        let (_tmp, local) = repo_with_commits(3);
        let remote_dir = TempDir::new().unwrap();
        let remote = Repository::init(remote_dir.path()).unwrap();

        let engine = SyncEngine::new(&local);
        let first = engine.push(remote_dir.path()).unwrap();
        assert_eq!(first.objects_copied, 3);
        assert_eq!(first.records_appended, 3);

        let second = engine.push(remote_dir.path()).unwrap();
        assert_eq!(second.objects_copied, 0);
        assert_eq!(second.objects_skipped, 3);
        assert_eq!(remote.commit_count().unwrap(), 6);
    }

    #[test]
    fn test_push_twice_with_dedup() {
        let (_tmp, local) = repo_with_commits(3);
        let remote_dir = TempDir::new().unwrap();
        let remote = Repository::init(remote_dir.path()).unwrap();

        let engine = SyncEngine::new(&local).with_mode(MergeMode::Deduplicate);
        engine.push(remote_dir.path()).unwrap();
        let second = engine.push(remote_dir.path()).unwrap();
        assert_eq!(second.records_appended, 0);
        assert_eq!(remote.commit_count().unwrap(), 3);
    }

    #[test]
    fn test_fetch_leaves_log_alone() {
        let (_src_tmp, source) = repo_with_commits(2);
        let (_tmp, local) = repo_with_commits(0);

        let report = SyncEngine::new(&local).fetch(source.work_dir()).unwrap();
        assert_eq!(report.objects_copied, 2);
        assert_eq!(report.records_appended, 0);
        assert_eq!(local.commit_count().unwrap(), 0);
        assert_eq!(local.list_objects().unwrap(), source.list_objects().unwrap());
    }

    #[test]
    fn test_merge_to_remote_creates_layout() {
        let (_tmp, local) = repo_with_commits(2);
        let remote_dir = TempDir::new().unwrap();
        let target = remote_dir.path().join("fresh");

        let report = SyncEngine::new(&local).merge_to_remote(&target).unwrap();
        assert_eq!(report.records_appended, 2);
        let remote = Repository::open(&target).unwrap();
        assert_eq!(remote.commit_count().unwrap(), 2);
        assert_eq!(remote.get_file_version("file1.txt", 1).unwrap().as_ref(), b"content 1");
    }

    #[test]
    fn test_clone_copies_everything() {
        let (_src_tmp, source) = repo_with_commits(2);
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clone");

        let (cloned, report) = clone_repository(source.work_dir(), &target).unwrap();
        assert_eq!(report.records_appended, 2);
        assert_eq!(cloned.commit_count().unwrap(), 2);
        assert_eq!(
            fs::read_to_string(cloned.paths().log_file()).unwrap(),
            fs::read_to_string(source.paths().log_file()).unwrap()
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(10), "10 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
