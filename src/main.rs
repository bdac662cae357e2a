//! channel-archiver: mirrors a channel's catalog into remote storage.
//!
//! # Usage
//!
//! ```bash
//! channel-archiver --config archiver.toml
//! channel-archiver --config archiver.toml --dry-run
//! ```
//!
//! Exit status: 0 after a clean shutdown, 2 for configuration errors, 3 when
//! the remote store is unreachable at startup, 1 for anything else.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use core_async::sync::CancellationToken;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_runtime::ArchiverConfig;
use core_service::{ArchiverService, ServiceError, EXIT_FAILURE};
use tokio::signal;
use tracing::{error, info, warn};

/// Mirrors a media channel into durable remote storage
#[derive(Parser, Debug)]
#[command(name = "channel-archiver")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "ARCHIVER_CONFIG", default_value = "archiver.toml")]
    config: PathBuf,

    /// List and log what would be archived without fetching, uploading or recording
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ArchiverConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let err = ServiceError::from(e);
            eprintln!("channel-archiver: {}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    if cli.dry_run {
        config.archiver.dry_run = true;
    }

    let _logging = match init_logging(LoggingConfig::from_settings(&config.logging)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("channel-archiver: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let runtime = match core_async::runtime::multi_thread(config.archiver.worker_count) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Cannot start async runtime");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<ServiceError>()
                .map(ServiceError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            error!(exit_code = code, "{:#}", e);
            ExitCode::from(code)
        }
    }
}

async fn run(config: ArchiverConfig) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %config.source.channel,
        dry_run = config.archiver.dry_run,
        "Starting channel archiver"
    );

    let service = ArchiverService::bootstrap(config)
        .await
        .context("bootstrap failed")?;
    service
        .preflight()
        .await
        .context("remote storage pre-check failed")?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received; draining current pass");
        shutdown.cancel();
    });

    let stats = service.run(&token).await;
    info!(
        passes = stats.passes_completed,
        failures = stats.pass_failures,
        "Channel archiver stopped"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
