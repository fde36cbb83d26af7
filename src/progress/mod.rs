//! Durable record of run progress.
//!
//! Two files are maintained:
//!
//! - the **event log**, append-only JSON lines, which is the audit trail;
//! - the **snapshot**, a single JSON object replaced after every batch and
//!   after a fixed set of important events, polled by dashboards.
//!
//! The log is written first. If the process dies between the two writes the
//! snapshot lags by one record, which is acceptable because the log is
//! authoritative.

mod events;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub use events::{
    BackupScope, BatchOutcome, CheckStatus, Event, EventRecord, ProgressSnapshot,
};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{
    clock::{Clock, SystemClock},
    config::ArchiverConfig,
};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ProgressResult<T> = Result<T, ProgressError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProgressError + '_ {
    move |source| ProgressError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writer for the event log and progress snapshot.
///
/// A single writer is assumed; the internal lock only keeps concurrent
/// callers within one process from interleaving lines.
pub struct ProgressStore {
    log_path: PathBuf,
    snapshot_path: PathBuf,
    include_timestamp: bool,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(log_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            snapshot_path: snapshot_path.into(),
            include_timestamp: true,
            clock: Arc::new(SystemClock),
            write_lock: Mutex::new(()),
        }
    }

    /// Build from the `[log]` and `[paths]` sections.
    pub fn from_config(config: &ArchiverConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.event_log_path(), config.snapshot_path())
            .with_timestamps(config.log.include_timestamp)
            .with_clock(clock)
    }

    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Record a completed batch.
    pub async fn record_batch(&self, snapshot: ProgressSnapshot) -> ProgressResult<()> {
        self.record_event(Event::BatchDeleted(snapshot)).await
    }

    /// Append an event to the log, and replace the snapshot if the event
    /// is on the snapshot allow-list.
    ///
    /// Only log failures are returned. A failed snapshot write is logged.
    pub async fn record_event(&self, event: Event) -> ProgressResult<()> {
        let record = EventRecord {
            timestamp: self.include_timestamp.then(|| self.clock.now()),
            event,
        };
        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().await;
        self.append_line(&line).await?;

        if record.event.updates_snapshot()
            && let Err(e) = self.write_snapshot(&record).await
        {
            tracing::warn!(
                path = %self.snapshot_path.display(),
                event = record.event.kind(),
                error = %e,
                "Failed to write progress snapshot"
            );
        }

        Ok(())
    }

    /// Like [`record_event`](Self::record_event) but never fails.
    ///
    /// Used for informational events where losing the record must not stop
    /// the run.
    pub async fn emit(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.record_event(event).await {
            tracing::warn!(
                path = %self.log_path.display(),
                event = kind,
                error = %e,
                "Failed to append to event log"
            );
        }
    }

    /// Replay the event log.
    pub async fn read_log(&self) -> ProgressResult<Vec<EventRecord>> {
        let contents = match tokio::fs::read_to_string(&self.log_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.log_path)(e)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(ProgressError::from))
            .collect()
    }

    /// The current snapshot, if one has been written.
    pub async fn read_snapshot(&self) -> ProgressResult<Option<EventRecord>> {
        match tokio::fs::read_to_string(&self.snapshot_path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&self.snapshot_path)(e)),
        }
    }

    async fn append_line(&self, line: &str) -> ProgressResult<()> {
        ensure_parent(&self.log_path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .map_err(io_error(&self.log_path))?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf)
            .await
            .map_err(io_error(&self.log_path))?;
        file.flush().await.map_err(io_error(&self.log_path))?;
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the snapshot.
    async fn write_snapshot(&self, record: &EventRecord) -> ProgressResult<()> {
        ensure_parent(&self.snapshot_path).await?;

        let json = serde_json::to_vec_pretty(record)?;
        let tmp = temp_path(&self.snapshot_path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &self.snapshot_path)
            .await
            .map_err(io_error(&self.snapshot_path))?;
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> ProgressResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_error(parent))?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::clock::ManualClock;

    fn store(dir: &TempDir) -> ProgressStore {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap());
        ProgressStore::new(
            dir.path().join("logs/archive.log"),
            dir.path().join("logs/progress.json"),
        )
        .with_clock(Arc::new(clock))
    }

    fn snapshot(batch_number: u64, deleted: u64) -> ProgressSnapshot {
        ProgressSnapshot::new(
            BatchOutcome {
                batch_number,
                batch_deleted: 10,
                deleted,
                remaining: 30 - deleted,
                batch_time_sec: 0.5,
                avg_time_per_batch_sec: 0.5,
            },
            30,
            3,
        )
    }

    #[tokio::test]
    async fn test_snapshot_equals_last_batch_line() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for k in 1..=3 {
            store.record_batch(snapshot(k, k * 10)).await.unwrap();

            let log = tokio::fs::read_to_string(store.log_path()).await.unwrap();
            let last: serde_json::Value =
                serde_json::from_str(log.lines().last().unwrap()).unwrap();
            let snap: serde_json::Value = serde_json::from_str(
                &tokio::fs::read_to_string(store.snapshot_path())
                    .await
                    .unwrap(),
            )
            .unwrap();
            assert_eq!(snap, last, "snapshot diverged after batch {k}");
            assert_eq!(log.lines().count() as u64, k);
        }
    }

    #[tokio::test]
    async fn test_non_allow_listed_event_leaves_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.record_batch(snapshot(1, 10)).await.unwrap();
        store
            .record_event(Event::BackupCommand {
                scope: BackupScope::FullQuery,
                command: "mongodump --db=a".into(),
            })
            .await
            .unwrap();

        let log = store.read_log().await.unwrap();
        assert_eq!(log.len(), 2);
        let snap = store.read_snapshot().await.unwrap().unwrap();
        assert!(matches!(snap.event, Event::BatchDeleted(_)));
    }

    #[tokio::test]
    async fn test_timestamps_optional() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_timestamps(false);

        store.record_event(Event::DryRunStart).await.unwrap();

        let log = tokio::fs::read_to_string(store.log_path()).await.unwrap();
        assert_eq!(log, "{\"event\":\"dry_run_start\"}\n");
    }

    #[tokio::test]
    async fn test_timestamp_from_clock() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.record_event(Event::DryRunStart).await.unwrap();

        let records = store.read_log().await.unwrap();
        assert_eq!(
            records[0].timestamp,
            Some(Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.read_log().await.unwrap().is_empty());
        assert!(store.read_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_log_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A regular file where the log directory should be.
        let blocker = dir.path().join("logs");
        tokio::fs::write(&blocker, b"").await.unwrap();

        let store = store(&dir);
        let err = store.record_event(Event::DryRunStart).await.unwrap_err();
        assert!(matches!(err, ProgressError::Io { .. }));

        // emit swallows the same failure
        store.emit(Event::DryRunStart).await;
    }

    #[test]
    fn test_temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("/x/logs/progress.json")),
            PathBuf::from("/x/logs/progress.json.tmp")
        );
    }
}
