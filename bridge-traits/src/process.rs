//! External Command Abstraction
//!
//! The extraction and transfer tools are separate executables. Providers talk
//! to them through [`CommandRunner`] so tests can script exit codes and output.

use async_trait::async_trait;

use crate::error::Result;

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Shorthand for a zero exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Last non-empty line of stdout, trimmed.
    pub fn last_stdout_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    }
}

/// Runs an external program to completion.
///
/// A non-zero exit is *not* an error at this layer: it is returned in
/// [`CommandOutput::status`] for the caller to classify.
///
/// # Errors
///
/// Returns [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable) when
/// the program cannot be found, and `Io` for other spawn or wait failures.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_stdout_line_skips_trailing_blank_lines() {
        let output = CommandOutput::ok("[download] 100%\n/tmp/a [x].mp4\n\n");
        assert!(output.success());
        assert_eq!(output.last_stdout_line(), Some("/tmp/a [x].mp4"));
    }

    #[test]
    fn signal_exit_is_not_success() {
        let output = CommandOutput {
            status: None,
            ..Default::default()
        };
        assert!(!output.success());
        assert_eq!(output.last_stdout_line(), None);
    }
}
