//! External program execution.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use deferrun_core::{Handler, HandlerError, HandlerOutput};

/// Runs `program [args..] <payload>` and reports its exit status.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    kind: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandHandler {
    pub fn new(kind: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before the payload path.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Kill the program if it runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Handler for CommandHandler {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn process(&self, payload_path: &Path) -> Result<HandlerOutput, HandlerError> {
        // The child runs inside the payload's directory, so a relative path
        // would be resolved twice.
        let payload_path = std::path::absolute(payload_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&payload_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = payload_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        debug!("Running {} {:?} {}", self.program, self.args, payload_path.display());

        let output = match self.timeout {
            Some(limit) => timeout(limit, cmd.output())
                .await
                .map_err(|_| HandlerError::Timeout(limit))??,
            None => cmd.output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();

        if !stdout.is_empty() {
            result.push_str(&stdout);
        }

        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push_str("\n--- stderr ---\n");
            }
            result.push_str(&stderr);
        }

        if output.status.success() {
            Ok(HandlerOutput::success(result))
        } else {
            let code = output.status.code().unwrap_or(-1);
            Ok(HandlerOutput::failure(format!(
                "{} exited with code {}\n{}",
                self.program, code, result
            )))
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
