use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Default ceiling for a single inbox file (25 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 25_000_000;

/// Default absolute tolerance for reconciliation sums.
pub const DEFAULT_RECONCILE_TOLERANCE: f64 = 0.01;

/// How the run reacts to a required report group without a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPolicy {
    /// Any missing required report aborts the whole run.
    Strict,
    /// Missing reports are recorded as warnings and the run proceeds.
    Partial,
}

impl fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPolicy::Strict => f.write_str("strict"),
            RunPolicy::Partial => f.write_str("partial"),
        }
    }
}

impl FromStr for RunPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(RunPolicy::Strict),
            "partial" => Ok(RunPolicy::Partial),
            other => Err(IngestError::Config(format!(
                "unknown run policy '{other}': expected 'strict' or 'partial'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inbox: InboxConfig,
    pub run: RunConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    /// Watched directory tree operators drop exports into.
    pub root: PathBuf,
    /// Per-file size ceiling enforced before any read.
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Where per-run output directories are created.
    pub output_root: PathBuf,
    pub policy: RunPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Absolute tolerance when comparing TOTAL vs itemized gross sums.
    pub tolerance: f64,
    /// Escalate a reconciliation mismatch from a warning to a run failure.
    pub strict: bool,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/inbox"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("data/runs"),
            policy: RunPolicy::Strict,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_RECONCILE_TOLERANCE,
            strict: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, else from `ingest.toml` when present,
    /// else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new("ingest.toml");
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
