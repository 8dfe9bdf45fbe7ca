//! Content-addressed object store
//!
//! Objects live as raw files named by their hex digest, no header or
//! envelope. Writes are idempotent: the same bytes always land under the same
//! name, so a second `put` is a no-op.

use bytes::Bytes;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};
use crate::object::ObjectId;

/// Generic object store interface
///
/// The sync engine copies between any two implementations.
pub trait ObjectStore {
    /// Get object data by ID
    fn get(&self, id: &ObjectId) -> Result<Bytes>;

    /// Check if object exists
    fn exists(&self, id: &ObjectId) -> bool;

    /// Put object data (returns the object ID)
    fn put(&self, data: &[u8]) -> Result<ObjectId>;

    /// Delete an object
    fn remove(&self, id: &ObjectId) -> Result<()>;

    /// List all object IDs, sorted
    fn list(&self) -> Result<Vec<ObjectId>>;

    /// Delete every object not in `live`, returning what was deleted
    fn purge(&self, live: &HashSet<ObjectId>) -> Result<Vec<ObjectId>> {
        let mut purged = Vec::new();
        for id in self.list()? {
            if !live.contains(&id) {
                self.remove(&id)?;
                tracing::debug!("Purged unreferenced object {}", id);
                purged.push(id);
            }
        }
        Ok(purged)
    }
}

/// Filesystem-backed store: `{root}/{hex}`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at an existing objects directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the objects
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.to_hex())
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, id: &ObjectId) -> Result<Bytes> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RepoError::ObjectNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    fn put(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        let path = self.object_path(&id);
        if !path.exists() {
            fs::write(&path, data)?;
            tracing::debug!("Stored object {} ({} bytes)", id, data.len());
        }
        Ok(id)
    }

    fn remove(&self, id: &ObjectId) -> Result<()> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RepoError::ObjectNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match ObjectId::from_hex(&name) {
                Ok(id) => ids.push(id),
                Err(_) => tracing::warn!("Ignoring stray file in object store: {}", name),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn test_put_get() {
        let (_tmp, store) = store();
        let id = store.put(b"hello").unwrap();
        assert_eq!(store.get(&id).unwrap().as_ref(), b"hello");
        assert!(store.exists(&id));
    }

    #[test]
    fn test_get_missing() {
        let (_tmp, store) = store();
        let id = ObjectId::from_data(b"never stored");
        assert!(matches!(store.get(&id), Err(RepoError::ObjectNotFound(x)) if x == id));
    }

    #[test]
    fn test_remove() {
        let (_tmp, store) = store();
        let id = store.put(b"bye").unwrap();
        store.remove(&id).unwrap();
        assert!(!store.exists(&id));
        assert!(matches!(store.remove(&id), Err(RepoError::ObjectNotFound(_))));
    }

    #[test]
    fn test_list_skips_stray_files() {
        let (tmp, store) = store();
        let a = store.put(b"a").unwrap();
        let b = store.put(b"b").unwrap();
        fs::write(tmp.path().join("README"), b"not an object").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.list().unwrap(), expected);
    }

    #[test]
    fn test_purge_keeps_live_set() {
        let (_tmp, store) = store();
        let keep = store.put(b"keep").unwrap();
        let stale = store.put(b"stale").unwrap();

        let live: HashSet<_> = [keep].into_iter().collect();
        let purged = store.purge(&live).unwrap();

        assert_eq!(purged, vec![stale]);
        assert!(store.exists(&keep));
        assert!(!store.exists(&stale));
    }

    proptest! {
        #[test]
        fn prop_put_is_idempotent(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let (_tmp, store) = store();
            let first = store.put(&data).unwrap();
            let second = store.put(&data).unwrap();
            prop_assert_eq!(first, second);
            let got = store.get(&first).unwrap();
            prop_assert_eq!(got.as_ref(), data.as_slice());
            prop_assert_eq!(store.list().unwrap().len(), 1);
        }
    }
}
