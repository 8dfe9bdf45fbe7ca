//! Staging index
//!
//! An ordered list of `(path, oid)` pairs with at most one entry per path.
//! On disk it is plain text, one `<path> <oid>\n` line per entry. The same
//! format backs the single-slot stash.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;
use crate::object::ObjectId;

/// A staged `(path, oid)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Working-tree path, relative to the repository root
    pub path: String,
    /// Object holding the staged content
    pub oid: ObjectId,
}

impl IndexEntry {
    pub fn new(path: impl Into<String>, oid: ObjectId) -> Self {
        Self {
            path: path.into(),
            oid,
        }
    }

    /// Parse a single `<path> <oid>` line.
    ///
    /// The oid is taken from the last space so paths may contain spaces.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (path, oid) = line.rsplit_once(' ')?;
        if path.is_empty() {
            return None;
        }
        let oid = ObjectId::from_hex(oid).ok()?;
        Some(Self::new(path, oid))
    }

    /// Render as a `<path> <oid>` line (without newline)
    pub fn to_line(&self) -> String {
        format!("{} {}", self.path, self.oid)
    }
}

/// Ordered staging area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries, keeping the first entry seen for each path
    pub fn from_entries(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    /// Parse index text, skipping blank and malformed lines
    pub fn parse(text: &str) -> Self {
        Self::from_entries(text.lines().filter(|l| !l.trim().is_empty()).filter_map(|line| {
            let entry = IndexEntry::parse_line(line);
            if entry.is_none() {
                tracing::warn!("Skipping malformed index line: {:?}", line);
            }
            entry
        }))
    }

    /// Serialize to the on-disk text form
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        text
    }

    /// Load from a file; a missing file is an empty index
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the file with this index
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Append an entry unless the path is already staged.
    ///
    /// Returns false (and leaves the index untouched) for a duplicate path.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        if self.contains(&entry.path) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry for `path`, returning it if present
    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        let pos = self.entries.iter().position(|e| e.path == path)?;
        Some(self.entries.remove(pos))
    }

    /// Rewrite the path of an entry in place, keeping its position.
    ///
    /// Returns false if `old` is not staged or `new` already has an entry.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old != new && self.contains(new) {
            return false;
        }
        match self.entries.iter_mut().find(|e| e.path == old) {
            Some(entry) => {
                entry.path = new.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ordered copy of the entries, as recorded by a commit
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Staged paths in index order
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}
