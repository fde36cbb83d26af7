//! The validated, immutable configuration consumed by the archival engine.

use std::{num::NonZeroU32, path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{
    ArchiverConfig, BackupFailurePolicy, BackupKind, ConfigError, Namespace, TelegramConfig,
};

/// Everything a run needs, with every mandatory value present.
///
/// Built once by [`ArchiverConfig::resolve`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Connection string for the target deployment.
    pub uri: String,
    pub namespace: Namespace,
    /// Archival predicate. Always a JSON object.
    pub filter: Map<String, Value>,
    pub batch_size: NonZeroU32,
    /// Pause after each batch.
    pub pause: Duration,
    pub backup: BackupPolicy,
    pub window: Option<MaintenanceWindow>,
    /// Present only when the Telegram channel is enabled.
    pub telegram: Option<TelegramConfig>,
    /// Host label for notifications.
    pub env_label: Option<String>,
}

impl RunConfig {
    /// Number of batches needed for `total` documents, rounded up.
    ///
    /// Used for reporting only; the loop itself stops on an empty fetch.
    pub fn expected_batches(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.batch_size.get()))
    }

    /// The label used to identify this host in notifications.
    pub fn host_label(&self) -> &str {
        self.env_label.as_deref().unwrap_or("unknown")
    }
}

/// When, if ever, documents are exported before deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupPolicy {
    Disabled,
    /// One export of the whole filter before the first batch.
    FullBeforeRun(BackupTarget),
    /// One export per batch, scoped to that batch's identifiers.
    PerBatch(BackupTarget),
}

impl BackupPolicy {
    pub fn target(&self) -> Option<&BackupTarget> {
        match self {
            BackupPolicy::Disabled => None,
            BackupPolicy::FullBeforeRun(target) | BackupPolicy::PerBatch(target) => Some(target),
        }
    }
}

/// Where and how backups are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    /// Destination root, already resolved against `paths.base_dir`.
    pub dest_dir: PathBuf,
    pub gzip: bool,
    pub on_failure: BackupFailurePolicy,
    /// Dump tool program name or path.
    pub tool: String,
}

/// An enabled maintenance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub end: DateTime<Utc>,
}

impl ArchiverConfig {
    /// Validate mandatory fields and build the immutable [`RunConfig`].
    ///
    /// Every missing field is reported, not just the first one.
    pub fn resolve(&self) -> Result<RunConfig, ConfigError> {
        let mut missing = Vec::new();

        let uri = self
            .mongodb
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty());
        if uri.is_none() {
            missing.push("mongodb.uri");
        }

        if self.mongodb.namespace.is_none() {
            missing.push("mongodb.namespace");
        }

        let filter = self.mongodb.filter.as_ref().filter(|f| !f.is_blank());
        if filter.is_none() {
            missing.push("mongodb.filter");
        }

        let batch_size = self.archival.batch_size.and_then(NonZeroU32::new);
        if batch_size.is_none() {
            missing.push("archival.batch_size");
        }

        if self.backup.enabled && self.backup.dest_dir.is_none() {
            missing.push("backup.dest_dir");
        }

        if self.maintenance_window.enabled && self.maintenance_window.end.is_none() {
            missing.push("maintenance_window.end");
        }

        let (Some(uri), Some(namespace), Some(filter), Some(batch_size)) =
            (uri, self.mongodb.namespace.as_ref(), filter, batch_size)
        else {
            return Err(missing_fields(missing));
        };
        if !missing.is_empty() {
            return Err(missing_fields(missing));
        }

        let backup = match (self.backup.enabled, self.backup.dest_dir.as_ref()) {
            (true, Some(dest_dir)) => {
                let target = BackupTarget {
                    dest_dir: self.paths.resolve(dest_dir),
                    gzip: self.backup.gzip,
                    on_failure: self.backup.on_failure,
                    tool: self.backup.tool.clone(),
                };
                match self.backup.kind {
                    BackupKind::FullQuery => BackupPolicy::FullBeforeRun(target),
                    BackupKind::Batch => BackupPolicy::PerBatch(target),
                }
            }
            _ => BackupPolicy::Disabled,
        };

        let window = match (self.maintenance_window.enabled, self.maintenance_window.end) {
            (true, Some(end)) => Some(MaintenanceWindow { end }),
            _ => None,
        };

        Ok(RunConfig {
            uri: uri.to_string(),
            namespace: namespace.resolve()?,
            filter: filter.to_predicate()?,
            batch_size,
            pause: self.archival.pause(),
            backup,
            window,
            telegram: self
                .notification
                .telegram
                .enabled
                .then(|| self.notification.telegram.clone()),
            env_label: self.mongodb.env.clone(),
        })
    }
}

fn missing_fields(fields: Vec<&str>) -> ConfigError {
    ConfigError::MissingFields(fields.into_iter().map(String::from).collect())
}
