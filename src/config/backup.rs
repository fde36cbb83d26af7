//! Backup (preserve-before-delete) configuration.
//!
//! # Example
//!
//! ```toml
//! [backup]
//! enabled = true
//! type = "batch"
//! dest_dir = "backups"
//! gzip = true
//! on_failure = "continue"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Backup configuration.
///
/// When enabled, documents are exported with an external dump tool before
/// they are deleted, either once for the whole filter or once per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Whether to take backups at all.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Backup scope.
    /// Default: full_query
    #[serde(default, rename = "type")]
    pub kind: BackupKind,

    /// Directory that receives the dump output. Mandatory when enabled.
    /// Relative paths resolve against `paths.base_dir`.
    #[serde(default)]
    pub dest_dir: Option<PathBuf>,

    /// Pass `--gzip` to the dump tool.
    /// Default: false
    #[serde(default)]
    pub gzip: bool,

    /// What to do when the dump tool fails.
    /// Default: continue (archive anyway)
    #[serde(default)]
    pub on_failure: BackupFailurePolicy,

    /// Name or path of the dump tool.
    /// Default: "mongodump"
    #[serde(default = "default_tool")]
    pub tool: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: BackupKind::default(),
            dest_dir: None,
            gzip: false,
            on_failure: BackupFailurePolicy::default(),
            tool: default_tool(),
        }
    }
}

fn default_tool() -> String {
    "mongodump".to_string()
}

/// Which data a backup covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// One export of everything the filter matches, before the first batch.
    #[default]
    #[serde(alias = "fullQuery")]
    FullQuery,
    /// One export per batch, scoped to exactly that batch's identifiers.
    Batch,
}

/// Whether a failed backup stops the run.
///
/// `Continue` keeps deleting even though the export failed, which trades
/// durability for completion. Operators must opt in to `Abort`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupFailurePolicy {
    #[default]
    Continue,
    Abort,
}
