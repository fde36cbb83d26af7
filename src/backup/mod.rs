//! Preserve-before-delete coordination.
//!
//! The coordinator decides what to export and where, runs the dump tool
//! and reports the result. It never fails past its own boundary: a failed
//! export comes back as [`BackupOutcome::Failed`] and the archiver applies
//! the configured failure policy.

mod command;

use std::path::{Path, PathBuf};

pub use command::{CommandRunner, DumpCommand, ProcessRunner};
use thiserror::Error;

use crate::{
    config::{BackupPolicy, BackupTarget},
    context::RunContext,
    identifier::{DocumentId, id_in_query, normalize_query},
    progress::{BackupScope, Event},
};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dump tool exited with {}{}", fmt_code(.code), fmt_stderr(.stderr))]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode backup query: {0}")]
    Query(#[from] serde_json::Error),
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn fmt_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result of one backup attempt.
#[derive(Debug)]
pub enum BackupOutcome {
    /// The policy does not call for a backup here.
    Skipped,
    Completed { destination: PathBuf },
    Failed {
        destination: PathBuf,
        error: BackupError,
    },
}

impl BackupOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, BackupOutcome::Failed { .. })
    }
}

pub struct BackupCoordinator<'a> {
    ctx: &'a RunContext,
}

impl<'a> BackupCoordinator<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Export everything the filter matches. Only runs under
    /// [`BackupPolicy::FullBeforeRun`].
    pub async fn backup_full(&self) -> BackupOutcome {
        let BackupPolicy::FullBeforeRun(target) = &self.ctx.config.backup else {
            return BackupOutcome::Skipped;
        };
        let destination = target.dest_dir.join(format!(
            "archive_fullQuery_backup_{}",
            self.ctx.clock.now().timestamp_millis()
        ));
        let query = normalize_query(&self.ctx.config.filter);
        self.execute(target, BackupScope::FullQuery, destination, &query)
            .await
    }

    /// Export exactly the documents of one batch. Only runs under
    /// [`BackupPolicy::PerBatch`].
    pub async fn backup_batch(&self, ids: &[DocumentId], batch_number: u64) -> BackupOutcome {
        let BackupPolicy::PerBatch(target) = &self.ctx.config.backup else {
            return BackupOutcome::Skipped;
        };
        let destination = target.dest_dir.join(format!(
            "archive_batch_{batch_number}_{}",
            self.ctx.clock.now().timestamp_millis()
        ));
        let query = id_in_query(ids);
        self.execute(
            target,
            BackupScope::Batch { batch_number },
            destination,
            &query,
        )
        .await
    }

    async fn execute(
        &self,
        target: &BackupTarget,
        scope: BackupScope,
        destination: PathBuf,
        query: &serde_json::Map<String, serde_json::Value>,
    ) -> BackupOutcome {
        match self.try_execute(target, scope, &destination, query).await {
            Ok(()) => {
                tracing::info!(
                    scope = %scope,
                    destination = %destination.display(),
                    "Backup complete"
                );
                self.ctx
                    .progress
                    .emit(Event::BackupComplete {
                        scope,
                        destination: destination.display().to_string(),
                    })
                    .await;
                BackupOutcome::Completed { destination }
            }
            Err(error) => {
                tracing::error!(
                    scope = %scope,
                    destination = %destination.display(),
                    error = %error,
                    "Backup failed"
                );
                self.ctx
                    .progress
                    .emit(Event::BackupFailed {
                        scope,
                        destination: destination.display().to_string(),
                        error: error.to_string(),
                    })
                    .await;
                BackupOutcome::Failed { destination, error }
            }
        }
    }

    async fn try_execute(
        &self,
        target: &BackupTarget,
        scope: BackupScope,
        destination: &Path,
        query: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), BackupError> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| BackupError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        let config = &self.ctx.config;
        let mut command =
            DumpCommand::new(&target.tool, &config.uri, &config.namespace, destination);
        if !query.is_empty() {
            command = command.with_query(query)?;
        }
        let command = command.with_gzip(target.gzip);

        self.ctx
            .progress
            .emit(Event::BackupCommand {
                scope,
                command: command.display(),
            })
            .await;

        self.ctx.runner.run(&command).await
    }
}
