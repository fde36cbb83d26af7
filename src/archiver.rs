//! The batch-delete control loop.
//!
//! ```text
//! count ─┬─ 0 ──────────────────────────────────────────────▶ NoData
//!        └─ n ─▶ window check ─▶ [full backup ─▶ window check] ─▶ loop {
//!                   fetch ids ── empty ─────────────────────▶ Completed
//!                   [batch backup] ─▶ delete ids ─▶ record ─▶ pause
//!                   window check ── past deadline ──────────▶ WindowExceeded
//!                }
//! ```
//!
//! The loop ends on an empty fetch, not when the initial count is reached,
//! so it adapts to documents added or removed by other writers. The totals
//! reported in progress records come from the initial count and may drift.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    backup::{BackupCoordinator, BackupError, BackupOutcome},
    config::{BackupFailurePolicy, BackupPolicy},
    context::RunContext,
    notify::templates,
    progress::{BackupScope, BatchOutcome, Event, ProgressError, ProgressSnapshot},
    store::StoreError,
    window::{MaintenanceWindowGuard, RunTotals, WindowDecision, WindowReport},
};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Progress log error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Backup of {scope} failed: {source}")]
    BackupFailed {
        scope: BackupScope,
        #[source]
        source: BackupError,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The filter stopped matching anything.
    Completed,
    /// Nothing matched at the start.
    NoData,
    /// The maintenance window closed before the filter was drained.
    WindowExceeded,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunOutcome::Completed => "completed",
            RunOutcome::NoData => "no data",
            RunOutcome::WindowExceeded => "maintenance window exceeded",
        })
    }
}

/// Terminal summary handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total_deleted: u64,
    pub batches_completed: u64,
    pub outcome: RunOutcome,
    /// Present when the window closed the run.
    pub window: Option<WindowReport>,
}

impl RunReport {
    fn no_data() -> Self {
        Self {
            total_deleted: 0,
            batches_completed: 0,
            outcome: RunOutcome::NoData,
            window: None,
        }
    }
}

pub struct BatchArchiver<'a> {
    ctx: &'a RunContext,
    guard: MaintenanceWindowGuard,
}

/// Counters carried across loop iterations.
struct LoopState {
    total_documents: u64,
    total_batches: u64,
    batches: u64,
    deleted: u64,
    loop_started: DateTime<Utc>,
}

impl LoopState {
    fn totals(&self) -> RunTotals {
        RunTotals {
            total_documents: self.total_documents,
            total_batches: self.total_batches,
            completed_batches: self.batches,
            deleted: self.deleted,
        }
    }

    fn report(&self, outcome: RunOutcome, window: Option<WindowReport>) -> RunReport {
        RunReport {
            total_deleted: self.deleted,
            batches_completed: self.batches,
            outcome,
            window,
        }
    }
}

impl<'a> BatchArchiver<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self {
            ctx,
            guard: MaintenanceWindowGuard::new(ctx.config.window),
        }
    }

    /// Archive until the filter matches nothing or the window closes.
    ///
    /// Runtime failures are recorded as an `error` event before being
    /// returned. Batches already deleted stay deleted.
    pub async fn run(&self) -> Result<RunReport, ArchiveError> {
        match self.run_loop().await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(error = %e, "Archival aborted");
                self.ctx
                    .progress
                    .emit(Event::Error {
                        stage: "archive".to_string(),
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_loop(&self) -> Result<RunReport, ArchiveError> {
        let config = &self.ctx.config;
        let store = &self.ctx.store;
        let progress = &self.ctx.progress;
        let namespace = config.namespace.to_string();

        let total_documents = store.count(&config.filter).await?;
        let total_batches = config.expected_batches(total_documents);
        progress
            .emit(Event::ArchivalInit {
                namespace: namespace.clone(),
                total_documents,
                total_batches,
                batch_size: config.batch_size.get(),
            })
            .await;
        tracing::info!(
            namespace = %namespace,
            total_documents,
            total_batches,
            batch_size = config.batch_size.get(),
            window_end = ?self.guard.deadline(),
            "Archival starting"
        );

        if total_documents == 0 {
            progress.emit(Event::NoData { namespace }).await;
            tracing::info!("No documents match the filter");
            return Ok(RunReport::no_data());
        }

        let mut state = LoopState {
            total_documents,
            total_batches,
            batches: 0,
            deleted: 0,
            loop_started: self.ctx.clock.now(),
        };

        if let Some(report) = self.window_closed(&state).await {
            return Ok(state.report(RunOutcome::WindowExceeded, Some(report)));
        }

        let coordinator = BackupCoordinator::new(self.ctx);
        if let BackupPolicy::FullBeforeRun(target) = &config.backup {
            progress
                .emit(Event::FullBackupStart { total_documents })
                .await;
            let outcome = coordinator.backup_full().await;
            apply_failure_policy(outcome, target.on_failure, BackupScope::FullQuery)?;

            // A large export can outlast the window on its own.
            if let Some(report) = self.window_closed(&state).await {
                return Ok(state.report(RunOutcome::WindowExceeded, Some(report)));
            }
        }

        state.loop_started = self.ctx.clock.now();
        loop {
            let batch_started = self.ctx.clock.now();
            let ids = store.find_ids(&config.filter, config.batch_size.get()).await?;
            if ids.is_empty() {
                break;
            }
            let batch_number = state.batches + 1;

            if let BackupPolicy::PerBatch(target) = &config.backup {
                let outcome = coordinator.backup_batch(&ids, batch_number).await;
                apply_failure_policy(
                    outcome,
                    target.on_failure,
                    BackupScope::Batch { batch_number },
                )?;
            }

            let batch_deleted = store.delete_ids(&ids).await?;
            state.batches = batch_number;
            state.deleted += batch_deleted;

            let batch_ended = self.ctx.clock.now();
            let outcome = BatchOutcome {
                batch_number,
                batch_deleted,
                deleted: state.deleted,
                remaining: total_documents.saturating_sub(state.deleted),
                batch_time_sec: seconds_between(batch_started, batch_ended),
                avg_time_per_batch_sec: round2(
                    seconds_between(state.loop_started, batch_ended) / batch_number as f64,
                ),
            };
            tracing::info!(
                batch_number,
                batch_deleted,
                deleted = state.deleted,
                remaining = outcome.remaining,
                "Batch deleted"
            );
            progress
                .record_batch(ProgressSnapshot::new(outcome, total_documents, total_batches))
                .await?;

            if !config.pause.is_zero() {
                tokio::time::sleep(config.pause).await;
            }

            if let Some(report) = self.window_closed(&state).await {
                return Ok(state.report(RunOutcome::WindowExceeded, Some(report)));
            }
        }

        let duration_sec = seconds_between(state.loop_started, self.ctx.clock.now());
        progress
            .emit(Event::ArchivalComplete {
                total_deleted: state.deleted,
                batches_completed: state.batches,
                duration_sec,
            })
            .await;
        tracing::info!(
            total_deleted = state.deleted,
            batches = state.batches,
            duration_sec,
            "Archival complete"
        );

        Ok(state.report(RunOutcome::Completed, None))
    }

    /// Consult the guard. When the window has closed, record it and notify.
    async fn window_closed(&self, state: &LoopState) -> Option<WindowReport> {
        let WindowDecision::Exceeded(report) =
            self.guard.check(self.ctx.clock.now(), state.totals())
        else {
            return None;
        };

        tracing::warn!(
            window_end = %report.window_end,
            completed_batches = report.completed_batches,
            remaining_documents = report.remaining_documents,
            "Maintenance window ended, stopping"
        );
        self.ctx
            .progress
            .emit(Event::WindowEndReached(report.clone()))
            .await;
        self.ctx
            .notify(&templates::window_message(&self.ctx.config, &report))
            .await;
        Some(report)
    }
}

fn apply_failure_policy(
    outcome: BackupOutcome,
    policy: BackupFailurePolicy,
    scope: BackupScope,
) -> Result<(), ArchiveError> {
    match (outcome, policy) {
        (BackupOutcome::Failed { error, .. }, BackupFailurePolicy::Abort) => {
            Err(ArchiveError::BackupFailed {
                scope,
                source: error,
            })
        }
        (BackupOutcome::Failed { .. }, BackupFailurePolicy::Continue) => {
            tracing::warn!(scope = %scope, "Continuing without a backup");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    round2(millis as f64 / 1000.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
