//! Non-destructive go/no-go checks run before any deletion.
//!
//! Checks run in a fixed order. A fatal check stops the sequence; warnings
//! are collected and do not block the run. Every check is recorded as a
//! `preflight_check` event, and the whole report as `dry_run_end`.

mod disk;
mod tool;

use std::{ffi::OsString, fmt::Write as _, path::Path, sync::Arc};

pub use disk::{DiskProbe, DiskSpace, UnavailableDiskProbe, default_disk_probe};
#[cfg(feature = "disk-check")]
pub use disk::SysinfoDiskProbe;
use serde::Serialize;
pub use tool::locate;

use crate::{
    clock::{Clock, SystemClock},
    config::{ArchiverConfig, ConfigError, RunConfig},
    notify::{Notifier, TelegramNotifier, templates::PREFLIGHT_TEST_MESSAGE},
    progress::{CheckStatus, Event, ProgressStore},
    store::StoreConnector,
};

/// Free space below this percentage of the backup volume is a warning.
pub const LOW_DISK_PERCENT: f64 = 10.0;

/// Outcome of preflight validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Human-readable summary for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Validation summary");
        let _ = writeln!(out, "  Result: {}", if self.ok { "OK" } else { "FAILED" });
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "  Warnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "    - {warning}");
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "  Errors:");
            for error in &self.errors {
                let _ = writeln!(out, "    - {error}");
            }
        }
        out
    }
}

/// Runs the preflight checks against a loaded configuration.
pub struct PreflightValidator<'a> {
    progress: &'a ProgressStore,
    connector: Arc<dyn StoreConnector>,
    notifier: Option<Arc<dyn Notifier>>,
    disk_probe: Arc<dyn DiskProbe>,
    clock: Arc<dyn Clock>,
    search_path: Option<OsString>,
}

impl<'a> PreflightValidator<'a> {
    pub fn new(progress: &'a ProgressStore, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            progress,
            connector,
            notifier: None,
            disk_probe: default_disk_probe(),
            clock: Arc::new(SystemClock),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Use this notifier for the test message instead of building one from
    /// the Telegram settings.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_disk_probe(mut self, probe: Arc<dyn DiskProbe>) -> Self {
        self.disk_probe = probe;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Directories searched for the dump tool, in `$PATH` format.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub async fn validate(&self, config: &ArchiverConfig) -> ValidationReport {
        self.progress.emit(Event::DryRunStart).await;
        tracing::info!("Starting preflight validation");

        let mut checks = Checks::new(self.progress);
        // Err means a fatal check stopped the sequence; it is already recorded.
        let _ = self.run_checks(config, &mut checks).await;
        let report = checks.finish();

        self.progress
            .emit(Event::DryRunEnd {
                ok: report.ok,
                warnings: report.warnings.clone(),
                errors: report.errors.clone(),
            })
            .await;

        if report.ok {
            tracing::info!(warnings = report.warnings.len(), "Preflight validation passed");
        } else {
            tracing::error!(errors = ?report.errors, "Preflight validation failed");
        }
        report
    }

    async fn run_checks(
        &self,
        config: &ArchiverConfig,
        checks: &mut Checks<'_>,
    ) -> Result<(), Fatal> {
        let run = self.check_mandatory_fields(config, checks).await?;
        self.check_backup_destination(&run, checks).await?;
        self.check_backup_tool(config, checks).await?;
        self.check_window(&run, checks).await?;
        self.check_notification(config, checks).await?;
        self.check_database(&run, checks).await
    }

    async fn check_mandatory_fields(
        &self,
        config: &ArchiverConfig,
        checks: &mut Checks<'_>,
    ) -> Result<RunConfig, Fatal> {
        match config.resolve() {
            Ok(run) => {
                checks.pass("mandatory_fields", None).await;
                Ok(run)
            }
            Err(ConfigError::MissingFields(fields)) => {
                for field in fields {
                    checks
                        .fail("mandatory_fields", format!("Missing mandatory config: {field}"))
                        .await;
                }
                Err(Fatal)
            }
            Err(e) => {
                checks.fail("mandatory_fields", e.to_string()).await;
                Err(Fatal)
            }
        }
    }

    async fn check_backup_destination(
        &self,
        run: &RunConfig,
        checks: &mut Checks<'_>,
    ) -> Result<(), Fatal> {
        let Some(target) = run.backup.target() else {
            return Ok(());
        };
        let dir = &target.dest_dir;

        if !tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            checks
                .fail(
                    "backup_directory",
                    format!("Backup directory does not exist: {}", dir.display()),
                )
                .await;
            return Err(Fatal);
        }

        if let Err(e) = probe_writable(dir).await {
            checks
                .fail(
                    "backup_directory",
                    format!("Backup directory not writable: {} ({e})", dir.display()),
                )
                .await;
            return Err(Fatal);
        }
        checks
            .pass("backup_directory", Some(dir.display().to_string()))
            .await;

        match self.disk_probe.space(dir) {
            None => {
                checks
                    .fail(
                        "disk_space",
                        format!("Unable to check disk space for {}", dir.display()),
                    )
                    .await;
                Err(Fatal)
            }
            Some(space) if space.free_percent() < LOW_DISK_PERCENT => {
                checks
                    .warn(
                        "disk_space",
                        format!(
                            "Low disk space: {:.2} GB free ({:.1}%)",
                            space.available_gb(),
                            space.free_percent()
                        ),
                    )
                    .await;
                Ok(())
            }
            Some(space) => {
                checks
                    .pass(
                        "disk_space",
                        Some(format!(
                            "{:.2} GB free ({:.1}%)",
                            space.available_gb(),
                            space.free_percent()
                        )),
                    )
                    .await;
                Ok(())
            }
        }
    }

    async fn check_backup_tool(
        &self,
        config: &ArchiverConfig,
        checks: &mut Checks<'_>,
    ) -> Result<(), Fatal> {
        let tool = &config.backup.tool;
        match locate(tool, self.search_path.as_deref()) {
            Some(path) => {
                checks
                    .pass("backup_tool", Some(path.display().to_string()))
                    .await;
                Ok(())
            }
            None => {
                checks
                    .fail("backup_tool", format!("Backup tool not found: {tool}"))
                    .await;
                Err(Fatal)
            }
        }
    }

    async fn check_window(&self, run: &RunConfig, checks: &mut Checks<'_>) -> Result<(), Fatal> {
        let Some(window) = run.window else {
            return Ok(());
        };
        let now = self.clock.now();
        if now > window.end {
            checks
                .fail(
                    "maintenance_window",
                    format!(
                        "Maintenance window already ended at {}",
                        window.end.to_rfc3339()
                    ),
                )
                .await;
            return Err(Fatal);
        }
        checks
            .pass("maintenance_window", Some(window.end.to_rfc3339()))
            .await;
        Ok(())
    }

    async fn check_notification(
        &self,
        config: &ArchiverConfig,
        checks: &mut Checks<'_>,
    ) -> Result<(), Fatal> {
        let telegram = &config.notification.telegram;
        if !telegram.enabled {
            return Ok(());
        }

        let missing = telegram.missing_credentials();
        if !missing.is_empty() {
            for field in missing {
                checks.fail("notification", format!("{field} missing")).await;
            }
            return Err(Fatal);
        }

        let notifier: Arc<dyn Notifier> = match &self.notifier {
            Some(notifier) => notifier.clone(),
            None => match TelegramNotifier::from_config(telegram) {
                Ok(notifier) => Arc::new(notifier),
                Err(e) => {
                    checks
                        .warn(
                            "notification",
                            format!("Telegram test failed (will continue): {e}"),
                        )
                        .await;
                    return Ok(());
                }
            },
        };

        match notifier.send(PREFLIGHT_TEST_MESSAGE).await {
            Ok(()) => checks.pass("notification", None).await,
            Err(e) => {
                checks
                    .warn(
                        "notification",
                        format!("Telegram test failed (will continue): {e}"),
                    )
                    .await
            }
        }
        Ok(())
    }

    async fn check_database(&self, run: &RunConfig, checks: &mut Checks<'_>) -> Result<(), Fatal> {
        let connected = match self.connector.connect(run).await {
            Ok(store) => store.ping().await.map(|()| store),
            Err(e) => Err(e),
        };
        let store = match connected {
            Ok(store) => store,
            Err(e) => {
                checks
                    .fail("database", format!("Database connection failed: {e}"))
                    .await;
                return Err(Fatal);
            }
        };
        checks.pass("database", Some(run.namespace.to_string())).await;

        let total = match store.count(&run.filter).await {
            Ok(total) => total,
            Err(e) => {
                checks
                    .fail("query", format!("Query validation failed: {e}"))
                    .await;
                return Err(Fatal);
            }
        };

        let expected_batches = run.expected_batches(total);
        self.progress
            .emit(Event::ValidateQuery {
                namespace: run.namespace.to_string(),
                total_documents: total,
                expected_batches,
            })
            .await;
        tracing::info!(
            namespace = %run.namespace,
            total_documents = total,
            expected_batches,
            "Query validated"
        );

        if total == 0 {
            checks
                .warn("query", "Query returned 0 documents".to_string())
                .await;
        } else {
            checks
                .pass(
                    "query",
                    Some(format!("{total} documents in {expected_batches} batches")),
                )
                .await;
        }
        Ok(())
    }
}

/// Marker for a fatal check; the message is already in the report.
struct Fatal;

/// Collects results and mirrors each one to the event log.
struct Checks<'a> {
    progress: &'a ProgressStore,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<'a> Checks<'a> {
    fn new(progress: &'a ProgressStore) -> Self {
        Self {
            progress,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    async fn pass(&mut self, check: &str, detail: Option<String>) {
        tracing::debug!(check, detail = ?detail, "Preflight check passed");
        self.record(check, CheckStatus::Ok, detail).await;
    }

    async fn warn(&mut self, check: &str, message: String) {
        tracing::warn!(check, "{message}");
        self.record(check, CheckStatus::Warning, Some(message.clone()))
            .await;
        self.warnings.push(message);
    }

    async fn fail(&mut self, check: &str, message: String) {
        tracing::error!(check, "{message}");
        self.record(check, CheckStatus::Failed, Some(message.clone()))
            .await;
        self.errors.push(message);
    }

    async fn record(&self, check: &str, status: CheckStatus, detail: Option<String>) {
        self.progress
            .emit(Event::PreflightCheck {
                check: check.to_string(),
                status,
                detail,
            })
            .await;
    }

    fn finish(self) -> ValidationReport {
        ValidationReport {
            ok: self.errors.is_empty(),
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

async fn probe_writable(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!(".docarchiver_write_test_{}", std::process::id()));
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}
