//! Repository configuration stored at `.regit/config.json`.
//!
//! The file is optional; a repository without one uses the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// How incoming log records are combined with the existing log during sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Plain text concatenation; repeated syncs duplicate records
    #[default]
    Concatenate,
    /// Skip incoming records whose text already appears in the log
    Deduplicate,
}

/// Settings for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Log reconciliation used by push/pull/merge
    #[serde(default)]
    pub merge_mode: MergeMode,
    /// Hold an advisory lock around index and log rewrites
    #[serde(default = "default_locking")]
    pub locking: bool,
    /// Remote used when a sync command is given no path
    #[serde(default)]
    pub default_remote: Option<PathBuf>,
}

fn default_locking() -> bool {
    true
}

fn unknown_key(key: &str) -> RepoError {
    RepoError::Config(format!(
        "unknown key {:?} (expected one of {})",
        key,
        RepoConfig::KEYS.join(", ")
    ))
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            merge_mode: MergeMode::default(),
            locking: default_locking(),
            default_remote: None,
        }
    }
}

impl RepoConfig {
    /// Load config from a file, falling back to defaults when absent
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(config_path)?;
        serde_json::from_str(&data).map_err(|e| {
            RepoError::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })
    }

    /// Keys accepted by [`RepoConfig::get`] and [`RepoConfig::set`]
    pub const KEYS: [&'static str; 3] = ["merge_mode", "locking", "default_remote"];

    /// Value of `key` as text; `None` for an unset optional key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match key {
            "merge_mode" => Ok(Some(
                match self.merge_mode {
                    MergeMode::Concatenate => "concatenate",
                    MergeMode::Deduplicate => "deduplicate",
                }
                .to_string(),
            )),
            "locking" => Ok(Some(self.locking.to_string())),
            "default_remote" => Ok(self
                .default_remote
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())),
            _ => Err(unknown_key(key)),
        }
    }

    /// Parse `value` into `key`. An empty value unsets `default_remote`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "merge_mode" => {
                self.merge_mode = match value {
                    "concatenate" => MergeMode::Concatenate,
                    "deduplicate" => MergeMode::Deduplicate,
                    _ => {
                        return Err(RepoError::Config(format!(
                            "merge_mode must be concatenate or deduplicate, got {:?}",
                            value
                        )));
                    }
                };
            }
            "locking" => {
                self.locking = value.parse().map_err(|_| {
                    RepoError::Config(format!("locking must be true or false, got {:?}", value))
                })?;
            }
            "default_remote" => {
                self.default_remote = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Save config, writing through a temp file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| RepoError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, config_path)?;
        Ok(())
    }
}
