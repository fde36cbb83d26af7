use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maintenance window configuration.
///
/// ```toml
/// [maintenance_window]
/// enabled = true
/// end = "2026-10-16T23:00:00+02:00"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceWindowConfig {
    /// Whether the deadline is enforced.
    #[serde(default)]
    pub enabled: bool,

    /// RFC 3339 deadline. Mandatory when enabled.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}
