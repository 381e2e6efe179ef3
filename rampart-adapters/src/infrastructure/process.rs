//! Bounded execution of external tool processes

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::AdapterError;

/// Captured output of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A fully built command line for one tool invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    binary: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Spawn the process and wait for it within the timeout.
    ///
    /// The child is killed when the timeout elapses.
    pub async fn run(&self) -> Result<ProcessOutput, AdapterError> {
        info!(
            command = %self.binary,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs_f64(),
            "audit: launching external tool"
        );

        let child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::Spawn {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(command = %self.binary, timeout = ?self.timeout, "External tool timed out");
                AdapterError::Timeout {
                    binary: self.binary.clone(),
                    timeout: self.timeout,
                }
            })?
            .map_err(|e| AdapterError::Spawn {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(command = %self.binary, status = %output.status, "External tool failed");
            return Err(AdapterError::NonZeroExit {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(
            command = %self.binary,
            stdout_bytes = stdout.len(),
            "External tool finished"
        );
        Ok(ProcessOutput { stdout, stderr })
    }
}
