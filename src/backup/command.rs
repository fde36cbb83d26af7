use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;

use super::BackupError;
use crate::config::{Namespace, redact_uri};

/// A dump tool invocation as a program plus discrete arguments.
///
/// Arguments are passed to the process directly, never through a shell, so
/// filter content cannot break quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCommand {
    program: String,
    args: Vec<String>,
}

impl DumpCommand {
    /// `<program> --uri=.. --db=.. --collection=.. --out=..`
    pub fn new(program: &str, uri: &str, namespace: &Namespace, out: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: vec![
                format!("--uri={uri}"),
                format!("--db={}", namespace.database),
                format!("--collection={}", namespace.collection),
                format!("--out={}", out.display()),
            ],
        }
    }

    /// Append `--query=<json>`. The query should already be normalized.
    pub fn with_query(mut self, query: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(query)?;
        self.args.push(format!("--query={json}"));
        Ok(self)
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        if gzip {
            self.args.push("--gzip".to_string());
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The decoded `--query` argument, if any.
    pub fn query(&self) -> Option<Value> {
        self.args
            .iter()
            .find_map(|arg| arg.strip_prefix("--query="))
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Shell-like rendering for logs, with connection credentials masked.
    pub fn display(&self) -> String {
        let mut rendered = shell_quote(&self.program);
        for arg in &self.args {
            rendered.push(' ');
            match arg.strip_prefix("--uri=") {
                Some(uri) => {
                    rendered.push_str(&shell_quote(&format!("--uri={}", redact_uri(uri))))
                }
                None => rendered.push_str(&shell_quote(arg)),
            }
        }
        rendered
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = arg
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"-_=./:,@+%".contains(&b));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Executes dump commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Success means a zero exit status.
    async fn run(&self, command: &DumpCommand) -> Result<(), BackupError>;
}

/// Runs commands as child processes and waits for them.
///
/// There is no timeout: a hung dump tool stalls the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &DumpCommand) -> Result<(), BackupError> {
        let output = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| BackupError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(BackupError::ExitStatus {
            code: output.status.code(),
            stderr: stderr.lines().last().unwrap_or_default().trim().to_string(),
        })
    }
}
