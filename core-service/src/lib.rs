//! Service bootstrap for the channel archiver.
//!
//! This crate turns a validated [`ArchiverConfig`] into a running pipeline:
//! it opens the ledger, wires the host bridges (HTTP client and command
//! runner) into the providers, and hands the resulting coordinator to the
//! scheduler loop. Desktop builds enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`) to get [`ArchiverService::bootstrap`]; tests
//! and embedders supply their own [`ServiceBridges`] to
//! [`ArchiverService::bootstrap_with`].

pub mod error;

pub use error::{Result, ServiceError, EXIT_CONFIG, EXIT_CONNECTIVITY, EXIT_FAILURE};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient, media::CatalogSource, process::CommandRunner, remote::RemoteStore,
    time::SystemClock,
};
use core_archive::{
    CoordinatorConfig, Fetcher, PipelineCoordinator, SchedulerConfig, SchedulerLoop,
    SchedulerStats, SourceLister, Uploader, UploaderConfig,
};
use core_async::sync::CancellationToken;
use core_ledger::{ArchiveLedger, DatabaseConfig, SqliteArchiveLedger};
use core_runtime::{ArchiverConfig, EventBus};
use provider_rclone::RcloneRemoteStore;
use provider_youtube::{
    format_selector, ChannelRef, DataApiSource, RateLimiter, YtDlpDownloader, YtDlpSource,
};
use tracing::{error, info, instrument};

/// Host-provided handles the providers are built on.
pub struct ServiceBridges {
    pub http_client: Arc<dyn HttpClient>,
    pub command_runner: Arc<dyn CommandRunner>,
}

impl ServiceBridges {
    pub fn new(http_client: Arc<dyn HttpClient>, command_runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            http_client,
            command_runner,
        }
    }

    /// Reqwest HTTP client and `tokio::process` command runner.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop() -> Result<Self> {
        let http_client = bridge_desktop::ReqwestHttpClient::new()?;
        Ok(Self::new(
            Arc::new(http_client),
            Arc::new(bridge_desktop::TokioCommandRunner::new()),
        ))
    }
}

/// A fully wired archiver, ready for the pre-flight check and the main loop.
pub struct ArchiverService {
    config: ArchiverConfig,
    ledger: Arc<SqliteArchiveLedger>,
    store: Arc<dyn RemoteStore>,
    coordinator: Arc<PipelineCoordinator>,
    scheduler: SchedulerLoop,
    event_bus: EventBus,
}

impl ArchiverService {
    /// Bootstraps with the desktop bridges.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap(config: ArchiverConfig) -> Result<Self> {
        Self::bootstrap_with(config, ServiceBridges::desktop()?).await
    }

    /// Validates `config`, opens the ledger and builds every collaborator.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Configuration`] when validation fails, the channel
    ///   reference cannot be parsed or the quality has no format selector
    /// - [`ServiceError::Ledger`] when the database cannot be opened
    #[instrument(skip_all, fields(channel = %config.source.channel))]
    pub async fn bootstrap_with(config: ArchiverConfig, bridges: ServiceBridges) -> Result<Self> {
        config.validate()?;
        ChannelRef::parse(&config.source.channel).map_err(|e| {
            ServiceError::Configuration(format!("source.channel: {}", e))
        })?;
        let quality = config.archiver.quality.as_str();
        let format = format_selector(quality).ok_or_else(|| {
            ServiceError::Configuration(format!("archiver.quality: unsupported value '{}'", quality))
        })?;

        let ledger = Arc::new(
            SqliteArchiveLedger::open(DatabaseConfig::new(&config.archiver.database_path)).await?,
        );
        info!(
            path = %config.archiver.database_path.display(),
            archived = ledger.count_archived().await?,
            "Ledger opened"
        );

        let ServiceBridges {
            http_client,
            command_runner,
        } = bridges;

        let rate_limiter = RateLimiter::shared(config.source.rate_limit_ms, Arc::new(SystemClock));
        let mut sources: Vec<Arc<dyn CatalogSource>> = Vec::with_capacity(2);
        if let Some(api_key) = config.api_key() {
            sources.push(Arc::new(DataApiSource::new(
                http_client,
                api_key,
                Arc::clone(&rate_limiter),
            )));
        } else {
            info!("No API key configured; listing with yt-dlp only");
        }
        sources.push(Arc::new(YtDlpSource::new(
            Arc::clone(&command_runner),
            rate_limiter,
        )));
        let lister = Arc::new(SourceLister::new(config.source.channel.clone(), sources));

        let downloader = Arc::new(YtDlpDownloader::new(Arc::clone(&command_runner)));
        let fetcher = Arc::new(Fetcher::new(downloader, format, config.archiver.max_retries));

        let store: Arc<dyn RemoteStore> = Arc::new(RcloneRemoteStore::new(
            command_runner,
            config.storage.remote.clone(),
            config.storage.base_path.clone(),
        ));
        let uploader = Arc::new(Uploader::new(
            Arc::clone(&store),
            UploaderConfig {
                max_retries: config.archiver.max_retries,
                overwrite: config.storage.overwrite,
                verify: config.storage.verify,
                ..UploaderConfig::default()
            },
        ));

        let event_bus = EventBus::default();
        let coordinator = Arc::new(PipelineCoordinator::new(
            lister,
            fetcher,
            uploader,
            Arc::clone(&ledger) as Arc<dyn ArchiveLedger>,
            event_bus.clone(),
            CoordinatorConfig {
                worker_count: config.archiver.worker_count,
                dry_run: config.archiver.dry_run,
                download_dir: config.archiver.download_dir.clone(),
                channel_folder: config.storage.channel_folder.clone(),
            },
        ));

        let scheduler = SchedulerLoop::new(
            Arc::clone(&coordinator) as Arc<dyn core_archive::PassRunner>,
            SchedulerConfig {
                initial_scan_limit: config.archiver.initial_scan_limit,
                incremental_scan_limit: config.archiver.incremental_scan_limit,
                polling_interval: config.polling_interval(),
                ..SchedulerConfig::default()
            },
        );

        info!(
            workers = config.archiver.worker_count,
            quality,
            dry_run = config.archiver.dry_run,
            remote = %store.resolve(""),
            "Archiver bootstrapped"
        );

        Ok(Self {
            config,
            ledger,
            store,
            coordinator,
            scheduler,
            event_bus,
        })
    }

    /// Confirms the remote store is reachable before any pass runs.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Connectivity`] if the check fails.
    pub async fn preflight(&self) -> Result<()> {
        self.store.check_connection().await.map_err(|e| {
            error!(error = %e, remote = %self.config.storage.remote, "Remote storage pre-check failed");
            ServiceError::Connectivity(format!("{}: {}", self.config.storage.remote, e))
        })
    }

    /// Runs the scheduler until `token` is cancelled, then closes the ledger.
    pub async fn run(&self, token: &CancellationToken) -> SchedulerStats {
        let stats = self.scheduler.run(token).await;
        self.ledger.close().await;
        stats
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<PipelineCoordinator> {
        &self.coordinator
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn ledger(&self) -> &Arc<SqliteArchiveLedger> {
        &self.ledger
    }
}
