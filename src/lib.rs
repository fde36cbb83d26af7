//! Batched, backup-aware document archival.
//!
//! A run deletes every document matching a filter from one collection in
//! bounded batches, optionally exporting each batch (or the whole matching
//! set) with an external dump tool first, and stops early when a
//! maintenance window closes. Progress is written to an append-only event
//! log and a snapshot file.
//!
//! The library never exits the process; the `docarchiver` binary maps
//! [`archiver::RunOutcome`] and errors to exit codes.

pub mod archiver;
pub mod backup;
pub mod clock;
pub mod config;
pub mod context;
pub mod identifier;
pub mod notify;
#[cfg(feature = "cli")]
pub mod observability;
pub mod preflight;
pub mod progress;
pub mod store;
pub mod window;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use archiver::{ArchiveError, BatchArchiver, RunOutcome, RunReport};
pub use config::{ArchiverConfig, ConfigError, RunConfig};
pub use context::RunContext;
