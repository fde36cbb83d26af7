use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use docarchiver::{
    archiver::{ArchiveError, BatchArchiver, RunOutcome, RunReport},
    clock::{Clock, SystemClock},
    config::{ArchiverConfig, ConfigError},
    context::RunContext,
    notify::{Notifier, TelegramNotifier, templates},
    observability::init_tracing,
    preflight::PreflightValidator,
    progress::{Event, ProgressStore},
    store::{MongoConnector, StoreConnector, StoreError},
};

const DEFAULT_CONFIG_PATH: &str = "./config/config.toml";

/// Exit code for a configuration file that cannot be read or parsed.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Batched, backup-aware MongoDB document archival",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run the preflight checks and exit without deleting anything
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate, then archive (default)
    Run,
    /// Validate only (same as --dry-run)
    Validate,
    /// Show enabled compile-time features
    Features,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command {
        Some(Command::Features) => {
            run_features();
            ExitCode::SUCCESS
        }
        Some(Command::Validate) => run(&args.config, true).await,
        Some(Command::Run) | None => run(&args.config, args.dry_run).await,
    }
}

async fn run(config_path: &Path, dry_run: bool) -> ExitCode {
    let config = match ArchiverConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("{e}");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let progress = Arc::new(ProgressStore::from_config(&config, clock.clone()));

    echo_config(&config, &progress).await;
    progress
        .emit(Event::RunStart {
            dry_run,
            config_file: config_path.display().to_string(),
        })
        .await;

    let report = PreflightValidator::new(&progress, Arc::new(MongoConnector))
        .with_clock(clock.clone())
        .validate(&config)
        .await;
    println!("{}", report.render());
    if !report.ok {
        return ExitCode::FAILURE;
    }
    if dry_run {
        tracing::info!("Dry run complete, nothing was deleted");
        return ExitCode::SUCCESS;
    }

    match archive(&config, progress.clone(), clock).await {
        Ok(report) => {
            println!(
                "Archival {}: {} documents deleted in {} batches",
                report.outcome, report.total_deleted, report.batches_completed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Archival failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Write the redacted effective configuration next to the logs and record it.
async fn echo_config(config: &ArchiverConfig, progress: &ProgressStore) {
    let redacted = config.redacted_json();
    let path = config.config_echo_path();

    let written = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&redacted).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, body).await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    match written {
        Ok(()) => tracing::info!(path = %path.display(), "Current config saved"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to save current config")
        }
    }

    progress.emit(Event::ConfigLoaded { config: redacted }).await;
}

async fn archive(
    config: &ArchiverConfig,
    progress: Arc<ProgressStore>,
    clock: Arc<dyn Clock>,
) -> Result<RunReport, RunError> {
    let run_config = match config.resolve() {
        Ok(run_config) => run_config,
        Err(e) => return Err(record_failure(&progress, "config", e.into()).await),
    };

    let notifier: Option<Arc<dyn Notifier>> =
        match run_config.telegram.as_ref().map(TelegramNotifier::from_config) {
            Some(Ok(notifier)) => Some(Arc::new(notifier)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Telegram notifications disabled");
                None
            }
            None => None,
        };

    let store = match MongoConnector.connect(&run_config).await {
        Ok(store) => store,
        Err(e) => return Err(record_failure(&progress, "connect", e.into()).await),
    };

    let ctx = RunContext::new(run_config, progress, store)
        .with_notifier(notifier)
        .with_clock(clock);

    ctx.notify(&templates::start_message(&ctx.config, ctx.clock.now()))
        .await;

    // The archiver records its own error event.
    let report = BatchArchiver::new(&ctx).run().await?;

    ctx.progress
        .emit(Event::RunComplete {
            outcome: report.outcome,
            total_deleted: report.total_deleted,
            batches_completed: report.batches_completed,
        })
        .await;

    // A closed window has already been announced.
    if report.outcome != RunOutcome::WindowExceeded {
        ctx.notify(&templates::end_message(&ctx.config, &report, ctx.clock.now()))
            .await;
    }

    Ok(report)
}

async fn record_failure(progress: &ProgressStore, stage: &str, error: RunError) -> RunError {
    tracing::error!(stage, error = %error, "Run aborted");
    progress
        .emit(Event::Error {
            stage: stage.to_string(),
            message: error.to_string(),
        })
        .await;
    error
}

/// Print the compile-time features of this build.
fn run_features() {
    let version = env!("CARGO_PKG_VERSION");
    let features: &[(&str, &str, bool)] = &[
        ("cli", "Command line and log output", cfg!(feature = "cli")),
        ("mongo", "MongoDB document store", cfg!(feature = "mongo")),
        (
            "disk-check",
            "Backup volume free-space check",
            cfg!(feature = "disk-check"),
        ),
    ];

    println!("docarchiver {version}");
    println!();
    for (name, description, enabled) in features {
        let mark = if *enabled { "+" } else { "-" };
        println!("  {mark} {name:<12} {description}");
    }
}
