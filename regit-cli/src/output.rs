//! Human-readable rendering of core results on stdout

use std::io::{self, Write};

use regit_core::{BlameLine, CommitDiff, CommitRecord, DiffEntry, RestoreReport};

/// Write object bytes to stdout unchanged
pub fn print_bytes(data: &[u8]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(data)?;
    out.flush()
}

pub fn print_log(records: &[CommitRecord]) {
    for (idx, record) in records.iter().enumerate() {
        println!("commit {} ({})", idx, record.timestamp);
        println!("Date: {}", record.date);
        println!();
        for line in record.message.lines() {
            println!("    {}", line);
        }
        println!();
        for entry in &record.entries {
            println!("    {}", entry.path);
        }
        println!();
    }
}

pub fn print_diff(diffs: &[DiffEntry]) {
    for diff in diffs {
        match diff {
            DiffEntry::MissingInWorkingTree { path } => {
                println!("{}: file missing in working directory", path);
            }
            DiffEntry::Modified {
                path,
                staged,
                working,
            } => {
                println!("Diff for {}:", path);
                println!("--- staged");
                println!("{}", String::from_utf8_lossy(staged));
                println!("--- working");
                println!("{}", String::from_utf8_lossy(working));
            }
        }
    }
}

pub fn print_commit_diff(diff: &CommitDiff) {
    println!(
        "Diff for {} between commit {} and {}:",
        diff.path, diff.from_index, diff.to_index
    );
    if diff.is_identical() {
        println!("(identical)");
    }
    println!("--- commit {}", diff.from_index);
    println!("{}", String::from_utf8_lossy(&diff.from));
    println!("--- commit {}", diff.to_index);
    println!("{}", String::from_utf8_lossy(&diff.to));
}

pub fn print_blame(lines: &[BlameLine]) {
    for line in lines {
        println!("{} {} | {}", line.commit, line.message, line.text);
    }
}

pub fn print_restore(verb: &str, report: &RestoreReport) {
    for path in &report.restored {
        println!("{} {}", verb, path);
    }
    for path in &report.skipped {
        eprintln!("skipped {}: object missing", path);
    }
}
