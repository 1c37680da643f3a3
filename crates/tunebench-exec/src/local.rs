//! Local command execution using `tokio::process`

use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

/// Local command executor
///
/// Runs commands on this machine through `sh -c`. The target argument is
/// only used for logging, which lets CLI-backed query sources (`kubectl`,
/// `govc`) share the `RemoteExecutor` seam.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    /// Extra environment for every spawned command
    env: Vec<(String, String)>,
}

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable to every command
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    #[instrument(skip(self), level = "debug")]
    async fn execute(&self, target: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();
        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(status, duration = ?duration, "command completed");

        if !output.status.success() {
            warn!(status, stderr = %stderr.trim(), "command failed");
        }

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
            duration,
        })
    }

    async fn release(&self, _target: &str) -> Result<(), ExecError> {
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let executor = LocalExecutor::new();
        let result = executor.execute("localhost", "echo hello").await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_ok() {
        let executor = LocalExecutor::new();
        let result = executor.execute("localhost", "exit 80").await.unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 80);
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let executor = LocalExecutor::new().with_env("GOVC_URL", "https://vc.lab");
        let result = executor
            .execute("localhost", "printf %s \"$GOVC_URL\"")
            .await
            .unwrap();

        assert_eq!(result.stdout, "https://vc.lab");
    }

    #[tokio::test]
    async fn test_run_with_stderr() {
        let executor = LocalExecutor::new();
        let result = executor.execute("localhost", "echo error >&2").await.unwrap();

        assert!(result.success());
        assert_eq!(result.stderr.trim(), "error");
    }
}
