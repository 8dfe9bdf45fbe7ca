//! History log
//!
//! Append-only text file of commit records addressed by position. Each
//! record is
//!
//! ```text
//! commit <ts>
//! Date: <ts>
//!
//! <message>
//! <path> <oid>      (one line per staged entry)
//!
//! ---
//! ```
//!
//! Splitting the file on `"---\n"` yields `count + 1` fragments, the last one
//! empty. A message or path containing the delimiter therefore corrupts the
//! count; no escaping is attempted.
//!
//! Entries are recovered by taking trailing `<path> <oid>` lines off the end
//! of the body. A message whose last lines have that shape is read back as
//! entries, shortening the message. This is not escaped either.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};
use crate::index::{Index, IndexEntry};
use crate::object::ObjectId;

/// Record separator in the log file
pub const RECORD_DELIMITER: &str = "---\n";

/// Split raw log text into record fragments (delimiter stripped).
///
/// Text after the final delimiter is not a record.
pub fn split_records(text: &str) -> Vec<&str> {
    let mut fragments: Vec<&str> = text.split(RECORD_DELIMITER).collect();
    fragments.pop();
    fragments
}

/// One commit: timestamp, message and the index snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Value of the `commit` header line
    pub timestamp: String,
    /// Value of the `Date:` header line
    pub date: String,
    pub message: String,
    pub entries: Vec<IndexEntry>,
    text: String,
}

impl CommitRecord {
    /// Build a record for a new commit
    pub fn new(message: &str, entries: Vec<IndexEntry>, timestamp: DateTime<Utc>) -> Self {
        let ts = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let index_text = Index::from_entries(entries.iter().cloned()).to_text();
        let text = format!("commit {ts}\nDate: {ts}\n\n{message}\n{index_text}\n");
        Self {
            timestamp: ts.clone(),
            date: ts,
            message: message.to_string(),
            entries,
            text,
        }
    }

    /// Parse one fragment of the log.
    ///
    /// Never fails: a mangled fragment still occupies its position, it just
    /// has empty fields.
    pub fn parse(fragment: &str) -> Self {
        let lines: Vec<&str> = fragment.split('\n').collect();
        let mut timestamp = String::new();
        let mut date = String::new();
        let mut body_start = 0;

        for (i, line) in lines.iter().enumerate() {
            if let Some(ts) = line.strip_prefix("commit ") {
                if timestamp.is_empty() && date.is_empty() {
                    timestamp = ts.to_string();
                    body_start = i + 1;
                    continue;
                }
            }
            if let Some(d) = line.strip_prefix("Date:") {
                date = d.trim_start().to_string();
                body_start = i + 1;
                if lines.get(i + 1).is_some_and(|l| l.is_empty()) {
                    body_start += 1;
                }
                break;
            }
            if !timestamp.is_empty() {
                break;
            }
        }

        let mut body: Vec<&str> = lines.get(body_start..).unwrap_or_default().to_vec();
        while body.last().is_some_and(|l| l.is_empty()) {
            body.pop();
        }

        let mut entries = Vec::new();
        while let Some(entry) = body.last().and_then(|l| IndexEntry::parse_line(l)) {
            entries.push(entry);
            body.pop();
        }
        entries.reverse();

        Self {
            timestamp,
            date,
            message: body.join("\n"),
            entries,
            text: fragment.to_string(),
        }
    }

    /// Raw record text as stored (without the delimiter)
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Record text followed by the delimiter, ready to append
    pub fn to_log_text(&self) -> String {
        format!("{}{}", self.text, RECORD_DELIMITER)
    }

    /// Entry for `path`, if this commit recorded it
    pub fn entry(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn touches(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Parsed `Date:` header, when it is valid RFC 3339
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

/// The log file plus its parsed records
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    records: Vec<CommitRecord>,
}

impl HistoryLog {
    /// Load the log; a missing file is an empty history
    pub fn open(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: Self::parse_records(&text),
        })
    }

    pub fn parse_records(text: &str) -> Vec<CommitRecord> {
        split_records(text).into_iter().map(CommitRecord::parse).collect()
    }

    /// Append a record to the file, never touching earlier bytes.
    ///
    /// Returns the new record's index.
    pub fn append(
        &mut self,
        message: &str,
        entries: Vec<IndexEntry>,
        timestamp: DateTime<Utc>,
    ) -> Result<usize> {
        let record = CommitRecord::new(message, entries, timestamp);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.to_log_text().as_bytes())?;

        // A delimiter inside the message splits the record on reload, so
        // re-read instead of trusting the in-memory push.
        if record.text.contains(RECORD_DELIMITER) {
            *self = Self::open(&self.path)?;
        } else {
            self.records.push(record);
        }
        Ok(self.records.len() - 1)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`
    pub fn at(&self, index: usize) -> Result<&CommitRecord> {
        self.records.get(index).ok_or(RepoError::InvalidCommitIndex {
            index,
            count: self.records.len(),
        })
    }

    /// Most recent record
    pub fn latest(&self) -> Result<&CommitRecord> {
        self.records.last().ok_or(RepoError::NoCommits)
    }

    /// Indices of records whose text matches, in log order
    pub fn search<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate(r.text()))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn records(&self) -> &[CommitRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &CommitRecord)> {
        self.records.iter().enumerate()
    }

    /// Every object id named by any record
    pub fn referenced_objects(&self) -> HashSet<ObjectId> {
        self.records
            .iter()
            .flat_map(|r| r.entries.iter().map(|e| e.oid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry(path: &str, data: &[u8]) -> IndexEntry {
        IndexEntry::new(path, ObjectId::from_data(data))
    }

    #[test]
    fn test_record_text_format() {
        let e = entry("a.txt", b"a");
        let record = CommitRecord::new("first", vec![e.clone()], ts(0));
        assert_eq!(
            record.to_log_text(),
            format!(
                "commit 1970-01-01T00:00:00Z\nDate: 1970-01-01T00:00:00Z\n\nfirst\na.txt {}\n\n---\n",
                e.oid
            )
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let entries = vec![entry("a.txt", b"a"), entry("dir/b c.txt", b"b")];
        let record = CommitRecord::new("multi word message", entries.clone(), ts(1000));
        let parsed = CommitRecord::parse(record.text());
        assert_eq!(parsed, record);
        assert_eq!(parsed.message, "multi word message");
        assert_eq!(parsed.entries, entries);
        assert_eq!(parsed.parsed_date(), Some(ts(1000)));
    }

    #[test]
    fn test_parse_empty_message() {
        let record = CommitRecord::new("", vec![entry("x", b"x")], ts(5));
        let parsed = CommitRecord::parse(record.text());
        assert_eq!(parsed.message, "");
        assert_eq!(parsed.paths(), vec!["x"]);
    }

    #[test]
    fn test_split_records_counts() {
        assert!(split_records("").is_empty());
        let one = CommitRecord::new("m", vec![entry("a", b"a")], ts(1)).to_log_text();
        assert_eq!(split_records(&one).len(), 1);
        assert_eq!(split_records(&format!("{one}{one}")).len(), 2);
    }

    #[test]
    fn test_append_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log");
        let mut log = HistoryLog::open(&path).unwrap();
        assert!(matches!(log.latest(), Err(RepoError::NoCommits)));

        assert_eq!(log.append("one", vec![entry("a", b"1")], ts(1)).unwrap(), 0);
        assert_eq!(log.append("two", vec![entry("a", b"2")], ts(2)).unwrap(), 1);

        let reopened = HistoryLog::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.at(0).unwrap().message, "one");
        assert_eq!(reopened.latest().unwrap().message, "two");
        assert!(matches!(
            reopened.at(2),
            Err(RepoError::InvalidCommitIndex { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_append_never_rewrites_prefix() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log");
        let mut log = HistoryLog::open(&path).unwrap();
        log.append("one", vec![entry("a", b"1")], ts(1)).unwrap();
        let before = fs::read_to_string(&path).unwrap();
        log.append("two", vec![entry("b", b"2")], ts(2)).unwrap();
        let after = fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&before));
    }

    #[test]
    fn test_search_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let mut log = HistoryLog::open(&tmp.path().join("log")).unwrap();
        log.append("fix parser", vec![entry("a", b"1")], ts(1)).unwrap();
        log.append("add docs", vec![entry("b", b"2")], ts(2)).unwrap();
        log.append("fix lexer", vec![entry("c", b"3")], ts(3)).unwrap();
        assert_eq!(log.search(|t| t.contains("fix")), vec![0, 2]);
    }

    #[test]
    fn test_entry_shaped_message_tail_is_read_as_entry() {
        let lookalike = ObjectId::from_data(b"elsewhere");
        let message = format!("revert x {lookalike}");
        let record = CommitRecord::new(&message, vec![entry("a", b"1")], ts(1));
        let parsed = CommitRecord::parse(record.text());

        assert_eq!(parsed.message, "");
        assert_eq!(parsed.paths(), vec!["revert x", "a"]);
        assert_eq!(parsed.entries[0].oid, lookalike);
    }

    #[test]
    fn test_delimiter_in_message_corrupts_count() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log");
        let mut log = HistoryLog::open(&path).unwrap();
        log.append("before\n---\nafter", vec![entry("a", b"1")], ts(1)).unwrap();

        // One commit was made, but the delimiter splits it in two.
        assert_eq!(log.count(), 2);
        assert_eq!(HistoryLog::open(&path).unwrap().count(), 2);
        assert!(log.at(0).unwrap().entries.is_empty());
        assert_eq!(log.at(1).unwrap().paths(), vec!["a"]);
    }
}
