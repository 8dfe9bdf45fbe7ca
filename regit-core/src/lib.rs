//! Regit Core Library
//!
//! A minimal local version-control engine:
//! - Content-addressed object store (SHA-256)
//! - Staging index and single-slot stash
//! - Append-only history log addressed by commit position
//! - History queries, diff, blame and working-tree restores
//! - Filesystem sync between peer repositories
//! - Informational branch refs, config and advisory locking

pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod lock;
pub mod log;
pub mod object;
pub mod query;
pub mod refs;
pub mod repository;
pub mod store;
pub mod sync;

pub use config::{MergeMode, RepoConfig};
pub use error::{RepoError, Result};
pub use index::{Index, IndexEntry};
pub use layout::{RepoPaths, DEFAULT_BRANCH, REPO_DIR};
pub use log::{CommitRecord, HistoryLog, RECORD_DELIMITER};
pub use object::ObjectId;
pub use query::{BlameLine, CommitDiff, CommitSummary, DiffEntry, RestoreReport};
pub use repository::{Repository, StageOutcome};
pub use store::{FsObjectStore, ObjectStore};
pub use sync::{clone_repository, SyncEngine, SyncReport};
