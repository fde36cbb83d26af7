use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{archiver::RunOutcome, window::WindowReport};

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub event: Event,
}

/// Everything the archiver writes to the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    RunStart {
        dry_run: bool,
        config_file: String,
    },
    ConfigLoaded {
        config: Value,
    },
    DryRunStart,
    PreflightCheck {
        check: String,
        status: CheckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    ValidateQuery {
        namespace: String,
        total_documents: u64,
        expected_batches: u64,
    },
    DryRunEnd {
        ok: bool,
        warnings: Vec<String>,
        errors: Vec<String>,
    },
    ArchivalInit {
        namespace: String,
        total_documents: u64,
        total_batches: u64,
        batch_size: u32,
    },
    NoData {
        namespace: String,
    },
    FullBackupStart {
        total_documents: u64,
    },
    BackupCommand {
        scope: BackupScope,
        command: String,
    },
    BackupComplete {
        scope: BackupScope,
        destination: String,
    },
    BackupFailed {
        scope: BackupScope,
        destination: String,
        error: String,
    },
    BatchDeleted(ProgressSnapshot),
    WindowEndReached(WindowReport),
    NotificationFailed {
        message: String,
        error: String,
    },
    ArchivalComplete {
        total_deleted: u64,
        batches_completed: u64,
        duration_sec: f64,
    },
    RunComplete {
        outcome: RunOutcome,
        total_deleted: u64,
        batches_completed: u64,
    },
    Error {
        stage: String,
        message: String,
    },
}

impl Event {
    /// Whether this event also replaces the progress snapshot.
    pub fn updates_snapshot(&self) -> bool {
        matches!(
            self,
            Event::RunStart { .. }
                | Event::ConfigLoaded { .. }
                | Event::DryRunStart
                | Event::ValidateQuery { .. }
                | Event::DryRunEnd { .. }
                | Event::NoData { .. }
                | Event::BackupComplete { .. }
                | Event::BackupFailed { .. }
                | Event::BatchDeleted(_)
                | Event::WindowEndReached(_)
                | Event::ArchivalComplete { .. }
                | Event::RunComplete { .. }
                | Event::Error { .. }
        )
    }

    /// The snake_case tag written to the `event` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RunStart { .. } => "run_start",
            Event::ConfigLoaded { .. } => "config_loaded",
            Event::DryRunStart => "dry_run_start",
            Event::PreflightCheck { .. } => "preflight_check",
            Event::ValidateQuery { .. } => "validate_query",
            Event::DryRunEnd { .. } => "dry_run_end",
            Event::ArchivalInit { .. } => "archival_init",
            Event::NoData { .. } => "no_data",
            Event::FullBackupStart { .. } => "full_backup_start",
            Event::BackupCommand { .. } => "backup_command",
            Event::BackupComplete { .. } => "backup_complete",
            Event::BackupFailed { .. } => "backup_failed",
            Event::BatchDeleted(_) => "batch_deleted",
            Event::WindowEndReached(_) => "window_end_reached",
            Event::NotificationFailed { .. } => "notification_failed",
            Event::ArchivalComplete { .. } => "archival_complete",
            Event::RunComplete { .. } => "run_complete",
            Event::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Warning,
    Failed,
}

/// What a backup invocation covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackupScope {
    FullQuery,
    Batch { batch_number: u64 },
}

impl std::fmt::Display for BackupScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupScope::FullQuery => f.write_str("full query"),
            BackupScope::Batch { batch_number } => write!(f, "batch {batch_number}"),
        }
    }
}

/// Result of one completed batch. Created once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_number: u64,
    pub batch_deleted: u64,
    /// Cumulative documents deleted so far.
    pub deleted: u64,
    /// Initial count minus `deleted`, floored at zero.
    pub remaining: u64,
    pub batch_time_sec: f64,
    pub avg_time_per_batch_sec: f64,
}

/// Latest batch outcome plus run-level totals.
///
/// Totals come from the initial count and go stale if other writers touch
/// the collection during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    pub total_documents: u64,
    pub total_batches: u64,
    pub completed_batches: u64,
    pub remaining_batches: u64,
}

impl ProgressSnapshot {
    pub fn new(outcome: BatchOutcome, total_documents: u64, total_batches: u64) -> Self {
        let completed_batches = outcome.batch_number;
        Self {
            outcome,
            total_documents,
            total_batches,
            completed_batches,
            remaining_batches: total_batches.saturating_sub(completed_batches),
        }
    }
}
