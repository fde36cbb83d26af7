//! Operator-facing message texts.

use chrono::{DateTime, Utc};

use crate::{archiver::RunReport, config::RunConfig, window::WindowReport};

pub const PREFLIGHT_TEST_MESSAGE: &str = "DRY RUN: Telegram test message OK";

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn start_message(config: &RunConfig, at: DateTime<Utc>) -> String {
    format!(
        "📢 Document archival STARTED\n\
         Host: {host}\n\
         DB: {db}\n\
         Collection: {coll}\n\
         Timestamp: {ts}",
        host = config.host_label(),
        db = config.namespace.database,
        coll = config.namespace.collection,
        ts = stamp(at),
    )
}

pub fn end_message(config: &RunConfig, report: &RunReport, at: DateTime<Utc>) -> String {
    format!(
        "✅ Document archival COMPLETED\n\
         Host: {host}\n\
         DB: {db}\n\
         Collection: {coll}\n\
         Deleted documents: {deleted}\n\
         Batches processed: {batches}\n\
         Outcome: {outcome}\n\
         Timestamp: {ts}",
        host = config.host_label(),
        db = config.namespace.database,
        coll = config.namespace.collection,
        deleted = report.total_deleted,
        batches = report.batches_completed,
        outcome = report.outcome,
        ts = stamp(at),
    )
}

pub fn window_message(config: &RunConfig, report: &WindowReport) -> String {
    format!(
        "⚠️ Document archival MAINTENANCE WINDOW HIT\n\
         Host: {host}\n\
         Maintenance end time: {end}\n\
         Docs per batch: {batch_size}\n\
         Total batches: {total}\n\
         Batches processed: {done}\n\
         Pending batches: {pending}\n\
         Pending documents: {docs}\n\
         Timestamp: {ts}\n\
         Archival stopped to respect the maintenance window.",
        host = config.host_label(),
        end = stamp(report.window_end),
        batch_size = config.batch_size,
        total = report.total_batches,
        done = report.completed_batches,
        pending = report.remaining_batches,
        docs = report.remaining_documents,
        ts = stamp(report.checked_at),
    )
}
