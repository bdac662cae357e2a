//! `RemoteStore` over the rclone command line.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::process::{CommandOutput, CommandRunner};
use bridge_traits::remote::{join_remote, RemoteObject, RemoteStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{RcloneError, Result, EXIT_DIR_NOT_FOUND};
use crate::types::LsJsonEntry;

const DEFAULT_PROGRAM: &str = "rclone";

/// Transfer flags for `rclone copy`. rclone's own retries stay low because
/// the caller owns the retry budget.
const COPY_FLAGS: &[&str] = &[
    "--retries",
    "1",
    "--low-level-retries",
    "3",
    "--contimeout",
    "60s",
    "--timeout",
    "5m",
    "--buffer-size",
    "32M",
    "--check-first",
    "--no-update-modtime",
];

/// Remote store rooted at `<remote>:<base_path>`.
///
/// # Example
///
/// ```ignore
/// let store = RcloneRemoteStore::new(runner, "mega", "Archive/Channel");
/// store.ensure_path_exists("2024").await?;
/// store.upload_file(Path::new("downloads/a [v1].mp4"), "2024").await?;
/// assert_eq!(store.resolve("2024/a [v1].mp4"), "mega:Archive/Channel/2024/a [v1].mp4");
/// ```
pub struct RcloneRemoteStore {
    runner: Arc<dyn CommandRunner>,
    remote: String,
    base_path: String,
    program: String,
}

impl RcloneRemoteStore {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        remote: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            remote: remote.into().trim_end_matches(':').to_string(),
            base_path: base_path.into(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn remote_root(&self) -> String {
        format!("{}:", self.remote)
    }

    async fn run(&self, command: &str, args: Vec<String>) -> Result<CommandOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(command.to_string());
        full.extend(args);

        debug!("Running {} {}", self.program, full.join(" "));
        Ok(self.runner.run(&self.program, &full).await?)
    }

    async fn run_checked(&self, command: &str, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.run(command, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(exit_failure(command, &output))
        }
    }
}

#[async_trait]
impl RemoteStore for RcloneRemoteStore {
    fn resolve(&self, relative: &str) -> String {
        format!(
            "{}:{}",
            self.remote,
            join_remote(&[&self.base_path, relative])
        )
    }

    #[instrument(skip(self), fields(remote = %self.remote))]
    async fn check_connection(&self) -> BridgeResult<()> {
        self.run_checked("version", Vec::new()).await?;
        self.run_checked("lsd", vec![self.remote_root()]).await?;
        info!("Remote {} is reachable", self.remote_root());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ensure_path_exists(&self, subpath: &str) -> BridgeResult<()> {
        self.run_checked("mkdir", vec![self.resolve(subpath)]).await?;
        Ok(())
    }

    #[instrument(skip(self, local_path), fields(file = %local_path.display()))]
    async fn upload_file(&self, local_path: &Path, subpath: &str) -> BridgeResult<()> {
        let mut args = vec![
            local_path.to_string_lossy().into_owned(),
            self.resolve(subpath),
        ];
        args.extend(COPY_FLAGS.iter().map(|flag| flag.to_string()));

        self.run_checked("copy", args).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stat_remote_file(&self, relative_file: &str) -> BridgeResult<Option<RemoteObject>> {
        let target = self.resolve(relative_file);
        let args = vec![
            "--files-only".to_string(),
            "--no-modtime".to_string(),
            "--no-mimetype".to_string(),
            target.clone(),
        ];

        let output = self.run("lsjson", args).await?;
        if output.status == Some(EXIT_DIR_NOT_FOUND) {
            return Ok(None);
        }
        if !output.success() {
            return Err(exit_failure("lsjson", &output).into());
        }

        let entries: Vec<LsJsonEntry> = serde_json::from_str(output.stdout.trim())
            .map_err(|e| RcloneError::ParseError(e.to_string()))?;

        Ok(entries
            .into_iter()
            .find(|entry| !entry.is_dir)
            .map(|entry| RemoteObject {
                path: target,
                size: entry.size.max(0) as u64,
            }))
    }
}

fn exit_failure(command: &str, output: &CommandOutput) -> RcloneError {
    let stderr = output
        .stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default()
        .to_string();
    RcloneError::ExitFailure {
        command: command.to_string(),
        code: output.status,
        stderr,
    }
}
