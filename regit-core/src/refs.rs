//! Branch and tag refs
//!
//! Named files under `refs/heads` plus a symbolic `HEAD`. History is a single
//! flat log, so a branch is only a name; it does not point at a commit.
//! Tags live under `refs/tags` and each holds a commit index as decimal text.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{RepoError, Result};
use crate::layout::RepoPaths;

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(RepoError::InvalidRefName(name.to_string()));
    }
    Ok(())
}

fn list_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Create an empty branch ref
pub fn create_branch(paths: &RepoPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    let ref_path = paths.heads_dir().join(name);
    if ref_path.exists() {
        return Err(RepoError::BranchExists(name.to_string()));
    }
    fs::create_dir_all(paths.heads_dir())?;
    fs::write(&ref_path, b"")?;
    tracing::info!("Created branch {}", name);
    Ok(())
}

/// Delete a branch ref
pub fn delete_branch(paths: &RepoPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    let ref_path = paths.heads_dir().join(name);
    if !ref_path.is_file() {
        return Err(RepoError::BranchMissing(name.to_string()));
    }
    fs::remove_file(&ref_path)?;
    tracing::info!("Deleted branch {}", name);
    Ok(())
}

/// Branch names, sorted
pub fn list_branches(paths: &RepoPaths) -> Result<Vec<String>> {
    list_names(&paths.heads_dir())
}

/// Point `HEAD` at an existing branch
pub fn switch_branch(paths: &RepoPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    if !paths.heads_dir().join(name).is_file() {
        return Err(RepoError::BranchMissing(name.to_string()));
    }
    fs::write(paths.head_file(), format!("ref: refs/heads/{}\n", name))?;
    tracing::info!("Switched to branch {}", name);
    Ok(())
}

/// Branch named by `HEAD`, if it is a symbolic ref
pub fn current_branch(paths: &RepoPaths) -> Result<Option<String>> {
    let head = match fs::read_to_string(paths.head_file()) {
        Ok(h) => h,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(head
        .trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_string))
}

/// Create a tag naming commit `commit`
pub fn create_tag(paths: &RepoPaths, name: &str, commit: usize) -> Result<()> {
    validate_name(name)?;
    let tag_path = paths.tags_dir().join(name);
    if tag_path.exists() {
        return Err(RepoError::TagExists(name.to_string()));
    }
    fs::create_dir_all(paths.tags_dir())?;
    fs::write(&tag_path, commit.to_string())?;
    tracing::info!("Created tag {} at commit {}", name, commit);
    Ok(())
}

/// Tag names, sorted
pub fn list_tags(paths: &RepoPaths) -> Result<Vec<String>> {
    list_names(&paths.tags_dir())
}

pub fn delete_tag(paths: &RepoPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    match fs::remove_file(paths.tags_dir().join(name)) {
        Ok(()) => {
            tracing::info!("Deleted tag {}", name);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RepoError::TagMissing(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Commit index a tag points at
pub fn show_tag(paths: &RepoPaths, name: &str) -> Result<usize> {
    validate_name(name)?;
    let contents = match fs::read_to_string(paths.tags_dir().join(name)) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RepoError::TagMissing(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    contents.trim().parse().map_err(|_| RepoError::InvalidTag {
        name: name.to_string(),
        contents,
    })
}
