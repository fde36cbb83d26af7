use serde::{Deserialize, Serialize};

/// Batch sizing and inter-batch throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchivalConfig {
    /// Maximum documents fetched and deleted per batch.
    /// Default: 1000. Zero is treated as unset.
    #[serde(default = "default_batch_size")]
    pub batch_size: Option<u32>,

    /// Pause between batches, in milliseconds.
    /// Default: 5000
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pause_ms: default_pause_ms(),
        }
    }
}

fn default_batch_size() -> Option<u32> {
    Some(1000)
}

fn default_pause_ms() -> u64 {
    5000
}

impl ArchivalConfig {
    /// The pause as a Duration.
    pub fn pause(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pause_ms)
    }
}
