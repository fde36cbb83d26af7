//! Test doubles shared by unit and scenario tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    backup::{BackupError, CommandRunner, DumpCommand},
    clock::{Clock, ManualClock},
    notify::{Notifier, NotifyError},
};

/// 2026-10-16 20:00:00 UTC.
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap()
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(start_instant())
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(manual_clock())
}

/// Records every command instead of running it.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    commands: Arc<Mutex<Vec<DumpCommand>>>,
    exit_code: Option<i32>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run "exits" with `code`.
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<DumpCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &DumpCommand) -> Result<(), BackupError> {
        self.commands.lock().unwrap().push(command.clone());
        match self.exit_code {
            None => Ok(()),
            Some(code) => Err(BackupError::ExitStatus {
                code: Some(code),
                stderr: "simulated failure".into(),
            }),
        }
    }
}

/// Records messages; optionally fails every send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(NotifyError::Status {
                status: 502,
                body: "Bad Gateway".into(),
            })
        } else {
            Ok(())
        }
    }
}
