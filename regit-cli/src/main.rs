//! regit: a minimal local version-control tool.
//!
//! # Usage
//!
//! ```bash
//! regit init
//! regit add notes.txt
//! regit commit "first draft"
//! regit log
//! regit get-file-version notes.txt 0
//! regit push /path/to/peer
//! ```
//!
//! Every command operates on the working tree given by `-C <dir>`, or the
//! current directory.

mod output;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use regit_core::{
    clone_repository, MergeMode, ObjectId, Repository, StageOutcome, SyncEngine, SyncReport,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "regit")]
#[command(author = "Regit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Minimal local version control")]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init,

    /// Copy a peer repository into a new working tree
    Clone { remote: PathBuf, target: PathBuf },

    #[command(flatten)]
    Repo(RepoCommands),
}

/// Commands that run inside an existing repository
#[derive(Subcommand, Debug)]
enum RepoCommands {
    /// Stage files
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Record the staged files as a new commit
    Commit {
        /// Commit message
        message: String,
    },

    /// List staged files
    Status,

    /// Show the commit history
    Log,

    /// Unstage a file
    Remove { path: String },

    /// Print the staged content of a file
    Show { path: String },

    /// List stored object ids
    LsObjects,

    /// Restore the files of the latest commit
    Checkout,

    /// Compare staged files with the working tree
    Diff,

    /// List commit indices and dates
    ListCommits,

    /// List commits that recorded a file
    FileHistory { path: String },

    /// Clear the staging area
    Reset,

    /// Check whether a file's current content is stored
    Istracked { path: String },

    /// Print a file as recorded by a commit
    GetFileVersion { path: String, commit: usize },

    /// List the paths recorded by a commit
    CommitFiles { commit: usize },

    /// Delete an object from the store
    RemoveObject { oid: ObjectId },

    /// Print the number of commits
    CommitCount,

    /// Find commits whose record contains a string
    FindCommitByMessage { needle: String },

    /// List every object id recorded for a file
    FindFileOids { path: String },

    /// Overwrite a working file with its content at a commit
    RestoreFileFromCommit { path: String, commit: usize },

    /// Delete objects no commit refers to
    PurgeUnreferencedObjects,

    /// Print a commit's message
    GetCommitMessage { commit: usize },

    /// Print a commit's date
    GetCommitDate { commit: usize },

    /// Print the object id a commit recorded for a file
    GetCommitOidForFile { path: String, commit: usize },

    /// List every path recorded by any commit
    ListAllTrackedFiles,

    /// Send objects and log to a peer repository
    Push {
        remote: Option<PathBuf>,
        /// Skip log records the peer already has
        #[arg(long)]
        dedup: bool,
    },

    /// Bring objects and log from a peer repository
    Pull {
        remote: Option<PathBuf>,
        #[arg(long)]
        dedup: bool,
    },

    /// Copy objects from a peer repository without touching the log
    Fetch { remote: Option<PathBuf> },

    /// Merge a peer repository's objects and log into this one
    Merge {
        remote: Option<PathBuf>,
        #[arg(long)]
        dedup: bool,
    },

    /// Merge this repository into a peer, creating it if needed
    MergeToRemote {
        remote: Option<PathBuf>,
        #[arg(long)]
        dedup: bool,
    },

    /// Move the staged files into the stash
    StashSave,

    /// Restore the stash into the staging area
    StashApply,

    /// Discard the stash
    StashDrop,

    /// Show which commit last recorded each line of a file
    Blame { path: String },

    /// Delete the files of a commit from the working tree
    Revert { commit: usize },

    /// Write the files of a commit into the working tree
    CherryPick { commit: usize },

    /// Rename a staged file
    Rename { old: String, new: String },

    /// Move a staged file into a directory
    Move { path: String, new_dir: String },

    /// List the paths and object ids recorded by a commit
    ShowCommitFiles { commit: usize },

    /// Show a file's content at two commits
    ShowCommitDiff {
        path: String,
        from: usize,
        to: usize,
    },

    /// Create a branch ref
    Branch { name: String },

    /// List branch refs
    Branches,

    /// Delete a branch ref
    DeleteBranch { name: String },

    /// Point HEAD at an existing branch
    SwitchBranch { name: String },

    /// Tag a commit
    Tag { name: String, commit: usize },

    /// List tags
    Tags,

    /// Delete a tag
    DeleteTag { name: String },

    /// Print the commit a tag points at
    ShowTag { name: String },

    /// Print a configuration value
    ConfigGet { key: String },

    /// Set a configuration value (an empty value unsets default_remote)
    ConfigSet { key: String, value: String },
}

/// Which sync operation to run against a remote
#[derive(Debug, Clone, Copy)]
enum SyncOp {
    Push,
    Pull,
    Fetch,
    Merge,
    MergeToRemote,
}

impl SyncOp {
    fn label(self) -> &'static str {
        match self {
            SyncOp::Push => "Push to",
            SyncOp::Pull => "Pull from",
            SyncOp::Fetch => "Fetch from",
            SyncOp::Merge => "Merge from",
            SyncOp::MergeToRemote => "Merge into",
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "regit=debug,regit_core=debug"
    } else {
        "regit=warn,regit_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let work_dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    tracing::debug!("Working directory: {}", work_dir.display());

    match cli.command {
        Commands::Init => cmd_init(work_dir),
        Commands::Clone { remote, target } => cmd_clone(remote, target),
        Commands::Repo(command) => {
            let mut repo = Repository::open(&work_dir)
                .with_context(|| format!("cannot open repository at {}", work_dir.display()))?;
            run(&mut repo, command)
        }
    }
}

fn run(repo: &mut Repository, command: RepoCommands) -> Result<()> {
    match command {
        RepoCommands::Add { paths } => cmd_add(repo, &paths),
        RepoCommands::Commit { message } => {
            let idx = repo.commit(&message)?;
            println!("Committed as commit {}", idx);
            Ok(())
        }
        RepoCommands::Status => {
            let staged = repo.status()?;
            if staged.is_empty() {
                println!("Nothing staged");
            } else {
                println!("Staged files:");
                for path in staged {
                    println!("  {}", path);
                }
            }
            Ok(())
        }
        RepoCommands::Log => {
            output::print_log(&repo.log()?);
            Ok(())
        }
        RepoCommands::Remove { path } => {
            if repo.remove(&path)? {
                println!("Removed {} from staging", path);
            } else {
                println!("{} not staged", path);
            }
            Ok(())
        }
        RepoCommands::Show { path } => Ok(output::print_bytes(&repo.show(&path)?)?),
        RepoCommands::LsObjects => {
            for oid in repo.list_objects()? {
                println!("{}", oid);
            }
            Ok(())
        }
        RepoCommands::Checkout => {
            let report = repo.checkout()?;
            output::print_restore("Restored", &report);
            Ok(())
        }
        RepoCommands::Diff => {
            output::print_diff(&repo.diff()?);
            Ok(())
        }
        RepoCommands::ListCommits => {
            for c in repo.list_commits()? {
                println!("{}: {}", c.index, c.date);
            }
            Ok(())
        }
        RepoCommands::FileHistory { path } => {
            for (idx, record) in repo.file_history(&path)? {
                println!("{} {} {}", idx, record.date, record.message);
            }
            Ok(())
        }
        RepoCommands::Reset => {
            repo.reset()?;
            println!("Staging area cleared");
            Ok(())
        }
        RepoCommands::Istracked { path } => {
            let tracked = repo.is_tracked(&path)?;
            println!("{}: {}", path, if tracked { "tracked" } else { "not tracked" });
            Ok(())
        }
        RepoCommands::GetFileVersion { path, commit } => {
            Ok(output::print_bytes(&repo.get_file_version(&path, commit)?)?)
        }
        RepoCommands::CommitFiles { commit } => {
            for entry in repo.commit_files(commit)? {
                println!("{}", entry.path);
            }
            Ok(())
        }
        RepoCommands::RemoveObject { oid } => {
            repo.remove_object(&oid)?;
            println!("Removed object {}", oid);
            Ok(())
        }
        RepoCommands::CommitCount => {
            println!("{}", repo.commit_count()?);
            Ok(())
        }
        RepoCommands::FindCommitByMessage { needle } => {
            for idx in repo.find_commit_by_message(&needle)? {
                println!("{}", idx);
            }
            Ok(())
        }
        RepoCommands::FindFileOids { path } => {
            for oid in repo.find_file_oids(&path)? {
                println!("{}", oid);
            }
            Ok(())
        }
        RepoCommands::RestoreFileFromCommit { path, commit } => {
            repo.restore_file_from_commit(&path, commit)?;
            println!("Restored {} from commit {}", path, commit);
            Ok(())
        }
        RepoCommands::PurgeUnreferencedObjects => {
            let purged = repo.purge_unreferenced_objects()?;
            for oid in &purged {
                println!("Purged {}", oid);
            }
            println!("{} objects purged", purged.len());
            Ok(())
        }
        RepoCommands::GetCommitMessage { commit } => {
            println!("{}", repo.get_commit_message(commit)?);
            Ok(())
        }
        RepoCommands::GetCommitDate { commit } => {
            println!("{}", repo.get_commit_date(commit)?);
            Ok(())
        }
        RepoCommands::GetCommitOidForFile { path, commit } => {
            println!("{}", repo.get_commit_oid_for_file(&path, commit)?);
            Ok(())
        }
        RepoCommands::ListAllTrackedFiles => {
            for path in repo.list_all_tracked_files()? {
                println!("{}", path);
            }
            Ok(())
        }

        RepoCommands::Push { remote, dedup } => cmd_sync(repo, SyncOp::Push, remote, dedup),
        RepoCommands::Pull { remote, dedup } => cmd_sync(repo, SyncOp::Pull, remote, dedup),
        RepoCommands::Fetch { remote } => cmd_sync(repo, SyncOp::Fetch, remote, false),
        RepoCommands::Merge { remote, dedup } => cmd_sync(repo, SyncOp::Merge, remote, dedup),
        RepoCommands::MergeToRemote { remote, dedup } => {
            cmd_sync(repo, SyncOp::MergeToRemote, remote, dedup)
        }

        RepoCommands::StashSave => {
            repo.stash_save()?;
            println!("Stashed staged files");
            Ok(())
        }
        RepoCommands::StashApply => {
            repo.stash_apply()?;
            println!("Applied stash");
            Ok(())
        }
        RepoCommands::StashDrop => {
            repo.stash_drop()?;
            println!("Dropped stash");
            Ok(())
        }
        RepoCommands::Blame { path } => {
            output::print_blame(&repo.blame(&path)?);
            Ok(())
        }
        RepoCommands::Revert { commit } => {
            for path in repo.revert(commit)? {
                println!("Removed {}", path);
            }
            Ok(())
        }
        RepoCommands::CherryPick { commit } => {
            let report = repo.cherry_pick(commit)?;
            output::print_restore("Wrote", &report);
            Ok(())
        }
        RepoCommands::Rename { old, new } => {
            repo.rename(&old, &new)?;
            println!("Renamed {} to {}", old, new);
            Ok(())
        }
        RepoCommands::Move { path, new_dir } => {
            let new_path = repo.move_file(&path, &new_dir)?;
            println!("Moved {} to {}", path, new_path);
            Ok(())
        }
        RepoCommands::ShowCommitFiles { commit } => {
            for entry in repo.commit_files(commit)? {
                println!("{} {}", entry.path, entry.oid);
            }
            Ok(())
        }
        RepoCommands::ShowCommitDiff { path, from, to } => {
            output::print_commit_diff(&repo.show_commit_diff(&path, from, to)?);
            Ok(())
        }
        RepoCommands::Branch { name } => {
            repo.create_branch(&name)?;
            println!("Created branch {}", name);
            Ok(())
        }
        RepoCommands::Branches => {
            let current = repo.current_branch()?;
            for name in repo.list_branches()? {
                let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{} {}", marker, name);
            }
            Ok(())
        }
        RepoCommands::DeleteBranch { name } => {
            repo.delete_branch(&name)?;
            println!("Deleted branch {}", name);
            Ok(())
        }
        RepoCommands::SwitchBranch { name } => {
            repo.switch_branch(&name)?;
            println!("Switched to branch {}", name);
            Ok(())
        }
        RepoCommands::Tag { name, commit } => {
            repo.create_tag(&name, commit)?;
            println!("Created tag {} at commit {}", name, commit);
            Ok(())
        }
        RepoCommands::Tags => {
            for name in repo.list_tags()? {
                println!("{}", name);
            }
            Ok(())
        }
        RepoCommands::DeleteTag { name } => {
            repo.delete_tag(&name)?;
            println!("Deleted tag {}", name);
            Ok(())
        }
        RepoCommands::ShowTag { name } => {
            println!("{} -> commit {}", name, repo.show_tag(&name)?);
            Ok(())
        }
        RepoCommands::ConfigGet { key } => {
            match repo.config_get(&key)? {
                Some(value) => println!("{}={}", key, value),
                None => println!("{} is not set", key),
            }
            Ok(())
        }
        RepoCommands::ConfigSet { key, value } => {
            repo.config_set(&key, &value)?;
            println!("Set {}={}", key, value);
            Ok(())
        }
    }
}

fn cmd_init(work_dir: PathBuf) -> Result<()> {
    let repo = Repository::init(&work_dir)
        .with_context(|| format!("cannot initialize repository at {}", work_dir.display()))?;
    println!(
        "Initialized empty repository in {}",
        repo.paths().repo_dir().display()
    );
    Ok(())
}

fn cmd_add(repo: &Repository, paths: &[String]) -> Result<()> {
    for path in paths {
        match repo.add(path)? {
            StageOutcome::Added(oid) => println!("Added {} ({})", path, oid),
            StageOutcome::AlreadyStaged => println!("{} already staged", path),
        }
    }
    Ok(())
}

fn cmd_clone(remote: PathBuf, target: PathBuf) -> Result<()> {
    let (_repo, report) = clone_repository(&remote, &target)
        .with_context(|| format!("cannot clone {}", remote.display()))?;
    println!("Cloned {} to {}", remote.display(), target.display());
    print_report(&report);
    Ok(())
}

fn cmd_sync(repo: &Repository, op: SyncOp, remote: Option<PathBuf>, dedup: bool) -> Result<()> {
    let remote = remote
        .or_else(|| repo.config().default_remote.clone())
        .ok_or_else(|| anyhow!("no remote given and no default_remote configured"))?;
    tracing::debug!("Resolved remote {} for {:?}", remote.display(), op);

    let mut engine = SyncEngine::new(repo);
    if dedup {
        engine = engine.with_mode(MergeMode::Deduplicate);
    }

    let report = match op {
        SyncOp::Push => engine.push(&remote)?,
        SyncOp::Pull => engine.pull(&remote)?,
        SyncOp::Fetch => engine.fetch(&remote)?,
        SyncOp::Merge => engine.merge(&remote)?,
        SyncOp::MergeToRemote => engine.merge_to_remote(&remote)?,
    };
    println!("{} {} complete", op.label(), remote.display());
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("  Objects:  {} copied, {} skipped", report.objects_copied, report.objects_skipped);
    println!("  Bytes:    {}", regit_core::sync::format_size(report.bytes_copied));
    println!("  Records:  {} appended", report.records_appended);
    println!("  Time:     {}ms", report.duration_ms);
}
