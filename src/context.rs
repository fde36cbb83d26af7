//! Run-scoped collaborators.

use std::sync::Arc;

use crate::{
    backup::{CommandRunner, ProcessRunner},
    clock::{Clock, SystemClock},
    config::RunConfig,
    notify::Notifier,
    progress::{Event, ProgressStore},
    store::DocumentStore,
};

/// Everything one archival run needs, passed by reference to each component.
///
/// Nothing here is global; two contexts can run side by side in one process.
pub struct RunContext {
    pub config: RunConfig,
    pub progress: Arc<ProgressStore>,
    pub store: Arc<dyn DocumentStore>,
    pub runner: Arc<dyn CommandRunner>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub clock: Arc<dyn Clock>,
}

impl RunContext {
    /// A context with the process runner, system clock and no notifier.
    pub fn new(
        config: RunConfig,
        progress: Arc<ProgressStore>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            progress,
            store,
            runner: Arc::new(ProcessRunner),
            notifier: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send a message if a notifier is configured. Failures are recorded
    /// as `notification_failed` and otherwise ignored.
    pub async fn notify(&self, text: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.send(text).await {
            tracing::warn!(error = %e, "Notification failed");
            self.progress
                .emit(Event::NotificationFailed {
                    message: text.lines().next().unwrap_or_default().to_string(),
                    error: e.to_string(),
                })
                .await;
        }
    }
}
