//! Command Runner Implementation using `tokio::process`

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    process::{CommandOutput, CommandRunner},
};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Spawns external tools and captures their output.
///
/// The child is killed if the returned future is dropped or the optional
/// timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program, args = ?args, "Spawning command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    BridgeError::NotAvailable(format!("`{}` is not installed or not on PATH", program))
                }
                _ => BridgeError::Io(e),
            })?;

        let output = match self.timeout {
            Some(limit) => match core_async::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(program, timeout_secs = limit.as_secs(), "Command timed out");
                    return Err(BridgeError::OperationFailed(format!(
                        "`{}` timed out after {:?}",
                        program, limit
                    )));
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
