//! Error taxonomy for repository operations
//!
//! Every core operation reports one of these to its caller; turning them into
//! messages and exit codes is left to the front end.

use std::path::PathBuf;

use crate::object::ObjectId;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors that can occur while operating on a repository
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Error reading file: {path}")]
    FileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Invalid commit index {index} (repository has {count} commits)")]
    InvalidCommitIndex { index: usize, count: usize },

    #[error("File {path} not found in commit {index}")]
    FileNotInCommit { path: String, index: usize },

    #[error("Nothing staged")]
    NothingStaged,

    #[error("No commits found")]
    NoCommits,

    #[error("{0} not staged")]
    NotStaged(String),

    #[error("{0} already staged")]
    AlreadyStaged(String),

    #[error("No stash found")]
    NoStash,

    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("Branch not found: {0}")]
    BranchMissing(String),

    #[error("Invalid ref name: {0:?}")]
    InvalidRefName(String),

    #[error("Tag already exists: {0}")]
    TagExists(String),

    #[error("Tag not found: {0}")]
    TagMissing(String),

    #[error("Tag {name} does not hold a commit index: {contents:?}")]
    InvalidTag { name: String, contents: String },

    #[error("Remote repository unreachable: {}", .0.display())]
    RemoteUnreachable(PathBuf),

    #[error("Not a regit repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to lock repository: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub(crate) fn unreadable(path: impl Into<String>, source: std::io::Error) -> Self {
        RepoError::FileUnreadable {
            path: path.into(),
            source,
        }
    }
}
