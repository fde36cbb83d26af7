use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Event log and progress snapshot locations.
///
/// ```toml
/// [log]
/// file = "logs/archive.log"
/// progress_file = "logs/progress.json"
/// include_timestamp = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Append-only JSON-lines event log.
    /// Default: logs/archive.log
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Snapshot of the latest progress, overwritten in place.
    /// Default: logs/progress.json
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Stamp each event with an RFC 3339 timestamp.
    /// Default: true
    #[serde(default = "default_true")]
    pub include_timestamp: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            progress_file: default_progress_file(),
            include_timestamp: true,
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs").join("archive.log")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("logs").join("progress.json")
}

fn default_true() -> bool {
    true
}
