//! Remote executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Executes shell commands on named targets.
///
/// Implementations own connection lifecycle and authentication. A returned
/// `CommandResult` with a non-zero status is still `Ok`: exit codes are
/// backend signals interpreted by the caller.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `cmd` on `target` and wait for it to finish.
    async fn execute(&self, target: &str, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Drop any connection held for `target`.
    ///
    /// Releasing a target with no open connection is not an error.
    async fn release(&self, target: &str) -> Result<(), ExecError>;

    fn executor_type(&self) -> &'static str;
}
