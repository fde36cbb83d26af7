//! Maintenance window enforcement.
//!
//! The guard is consulted at batch boundaries only. A batch already in
//! flight when the deadline passes runs to completion, so a run can overshoot
//! the window by up to one batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MaintenanceWindow;

/// Run totals at the moment of a window check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub total_documents: u64,
    pub total_batches: u64,
    pub completed_batches: u64,
    pub deleted: u64,
}

/// What was left undone when the window closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window_end: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
    pub total_batches: u64,
    pub completed_batches: u64,
    pub remaining_batches: u64,
    pub deleted: u64,
    pub remaining_documents: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowDecision {
    Continue,
    Exceeded(WindowReport),
}

impl WindowDecision {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, WindowDecision::Exceeded(_))
    }
}

/// Compares the current time against an optional deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceWindowGuard {
    window: Option<MaintenanceWindow>,
}

impl MaintenanceWindowGuard {
    pub fn new(window: Option<MaintenanceWindow>) -> Self {
        Self { window }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.window.map(|w| w.end)
    }

    /// `Continue` while `now` is at or before the deadline, or when no
    /// window is configured.
    pub fn check(&self, now: DateTime<Utc>, totals: RunTotals) -> WindowDecision {
        let Some(window) = self.window else {
            return WindowDecision::Continue;
        };
        if now <= window.end {
            return WindowDecision::Continue;
        }

        WindowDecision::Exceeded(WindowReport {
            window_end: window.end,
            checked_at: now,
            total_batches: totals.total_batches,
            completed_batches: totals.completed_batches,
            remaining_batches: totals
                .total_batches
                .saturating_sub(totals.completed_batches),
            deleted: totals.deleted,
            remaining_documents: totals.total_documents.saturating_sub(totals.deleted),
        })
    }
}
