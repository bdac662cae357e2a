//! yt-dlp backed listing and download.
//!
//! Listing uses `--flat-playlist --dump-single-json`, which reads the channel's
//! video tab without resolving every entry. Downloads request a single video
//! and print the post-processed file path as the last stdout line.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{CatalogItem, CatalogSource, DownloadRequest, ListingOutcome, MediaDownloader};
use bridge_traits::process::{CommandOutput, CommandRunner};
use chrono::{NaiveDate, SecondsFormat, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::channel::ChannelRef;
use crate::error::{Result, YouTubeError};
use crate::rate_limit::SharedRateLimiter;
use crate::types::{FlatEntry, FlatPlaylist};

const DEFAULT_PROGRAM: &str = "yt-dlp";

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// yt-dlp exit status for invalid options.
const EXIT_USAGE: i32 = 2;

/// stderr fragments that no retry will fix.
const PERMANENT_MARKERS: &[&str] = &[
    "Private video",
    "Video unavailable",
    "members-only",
    "This video has been removed",
    "has been terminated",
];

/// Format selector for a quality label (`best`, `1080p`, `720p`, `480p`, `audio`).
pub fn format_selector(quality: &str) -> Option<&'static str> {
    let selector = match quality {
        "best" => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
        "1080p" => {
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[height<=1080][ext=mp4]/best[height<=1080]"
        }
        "720p" => {
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[height<=720][ext=mp4]/best[height<=720]"
        }
        "480p" => {
            "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/best[height<=480][ext=mp4]/best[height<=480]"
        }
        "audio" => "bestaudio[ext=m4a]/bestaudio/best",
        _ => return None,
    };
    Some(selector)
}

/// Flat-playlist listing through yt-dlp, used when the Data API is unavailable.
pub struct YtDlpSource {
    runner: Arc<dyn CommandRunner>,
    rate_limiter: SharedRateLimiter,
    program: String,
}

impl YtDlpSource {
    pub fn new(runner: Arc<dyn CommandRunner>, rate_limiter: SharedRateLimiter) -> Self {
        Self {
            runner,
            rate_limiter,
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[instrument(skip(self))]
    async fn list(&self, url: &str, max_results: usize) -> Result<Vec<CatalogItem>> {
        let args: Vec<String> = vec![
            "--flat-playlist".into(),
            "--dump-single-json".into(),
            "--playlist-end".into(),
            max_results.to_string(),
            "--no-warnings".into(),
            url.to_string(),
        ];

        self.rate_limiter.lock().await.wait_if_needed().await;
        let output = self.runner.run(&self.program, &args).await?;
        if !output.success() {
            return Err(extractor_failure(&output));
        }

        let playlist: FlatPlaylist = serde_json::from_str(output.stdout.trim())
            .map_err(|e| YouTubeError::ParseError(format!("yt-dlp listing: {}", e)))?;

        let mut items: Vec<CatalogItem> = playlist
            .entries
            .into_iter()
            .filter_map(convert_entry)
            .collect();
        items.truncate(max_results);
        Ok(items)
    }
}

#[async_trait]
impl CatalogSource for YtDlpSource {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_channel(&self, channel: &str, max_results: usize) -> ListingOutcome {
        let url = match ChannelRef::parse(channel) {
            Ok(reference) => reference.videos_url(),
            Err(e) => return ListingOutcome::Fatal(e.to_string()),
        };

        match self.list(&url, max_results).await {
            Ok(items) => {
                info!("Listed {} entries from {}", items.len(), url);
                ListingOutcome::Listed(items)
            }
            Err(e) => {
                warn!("yt-dlp listing failed: {}", e);
                ListingOutcome::Fatal(e.to_string())
            }
        }
    }
}

/// Single-video downloader.
pub struct YtDlpDownloader {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl YtDlpDownloader {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn download_args(request: &DownloadRequest) -> Vec<String> {
        let template = request
            .destination_dir
            .join(format!("{}.%(ext)s", request.output_stem));

        vec![
            "-f".into(),
            request.format.clone(),
            "--merge-output-format".into(),
            "mp4".into(),
            "--no-playlist".into(),
            "--continue".into(),
            "--retries".into(),
            "10".into(),
            "--fragment-retries".into(),
            "10".into(),
            "--embed-metadata".into(),
            "--embed-thumbnail".into(),
            "--no-progress".into(),
            "--quiet".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            format!("{}{}", WATCH_URL, request.item_id),
        ]
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    #[instrument(skip(self, request), fields(item_id = %request.item_id))]
    async fn download(&self, request: &DownloadRequest) -> BridgeResult<PathBuf> {
        let args = Self::download_args(request);
        let output = self.runner.run(&self.program, &args).await?;

        if !output.success() {
            return Err(extractor_failure(&output).into());
        }

        match output.last_stdout_line() {
            Some(path) => {
                debug!("Downloaded to {}", path);
                Ok(PathBuf::from(path))
            }
            None => Err(BridgeError::OperationFailed(
                "yt-dlp finished without reporting a file path".to_string(),
            )),
        }
    }
}

fn extractor_failure(output: &CommandOutput) -> YouTubeError {
    let message = output
        .stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("no error output")
        .to_string();
    let permanent = output.status == Some(EXIT_USAGE)
        || PERMANENT_MARKERS
            .iter()
            .any(|marker| output.stderr.contains(marker));

    YouTubeError::ExtractorFailed {
        code: output.status,
        message,
        retryable: !permanent,
    }
}

fn convert_entry(entry: FlatEntry) -> Option<CatalogItem> {
    let id = entry.id.filter(|id| !id.is_empty())?;
    let published_at = entry
        .upload_date
        .as_deref()
        .and_then(upload_date_to_rfc3339)
        .or_else(|| {
            entry
                .timestamp
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        })
        .unwrap_or_default();

    let mut item = CatalogItem::new(id, entry.title.unwrap_or_default(), published_at);
    if let Some(duration) = entry.duration.filter(|d| *d >= 0.0) {
        item = item.with_duration(duration.round() as u64);
    }
    if let Some(size) = entry.filesize_approx.filter(|s| *s >= 0.0) {
        item = item.with_approx_size(size as u64);
    }
    let resolution = entry.resolution.or_else(|| match (entry.width, entry.height) {
        (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
        _ => None,
    });
    if let Some(resolution) = resolution {
        item = item.with_resolution(resolution);
    }
    Some(item)
}

/// `20240131` → `2024-01-31T00:00:00Z`
fn upload_date_to_rfc3339(date: &str) -> Option<String> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()
        .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use bridge_traits::time::SystemClock;
    use mockall::mock;

    mock! {
        CommandRunner {}

        #[async_trait]
        impl CommandRunner for CommandRunner {
            async fn run(&self, program: &str, args: &[String]) -> BridgeResult<CommandOutput>;
        }
    }

    fn source(mock: MockCommandRunner) -> YtDlpSource {
        YtDlpSource::new(Arc::new(mock), RateLimiter::shared(0, Arc::new(SystemClock)))
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(
            format_selector("best"),
            Some("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best")
        );
        assert!(format_selector("720p").unwrap().contains("height<=720"));
        assert_eq!(format_selector("audio"), Some("bestaudio[ext=m4a]/bestaudio/best"));
        assert_eq!(format_selector("4k"), None);
    }

    #[test]
    fn test_upload_date_conversion() {
        assert_eq!(
            upload_date_to_rfc3339("20240131").as_deref(),
            Some("2024-01-31T00:00:00Z")
        );
        assert_eq!(upload_date_to_rfc3339("2024-01-31"), None);
        assert_eq!(upload_date_to_rfc3339("20241340"), None);
    }

    #[tokio::test]
    async fn test_listing_maps_flat_entries() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().times(1).returning(|program, args| {
            assert_eq!(program, "yt-dlp");
            assert!(args.iter().any(|a| a == "--flat-playlist"));
            assert_eq!(
                args.last().map(String::as_str),
                Some("https://www.youtube.com/@creator/videos")
            );
            Ok(CommandOutput::ok(
                r#"{"entries": [
                    {"id": "a1", "title": "Newest", "upload_date": "20240301", "duration": 61.6, "width": 1920, "height": 1080},
                    {"id": "b2", "title": "By timestamp", "timestamp": 1700000000, "filesize_approx": 1048576.0},
                    {"id": "c3", "title": "No date", "resolution": "1280x720"},
                    {"title": "No id"}
                ]}"#,
            ))
        });

        let items = match source(mock).list_channel("@creator", 10).await {
            ListingOutcome::Listed(items) => items,
            other => panic!("expected listing, got {:?}", other),
        };

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].published_at, "2024-03-01T00:00:00Z");
        assert_eq!(items[0].duration_seconds, Some(62));
        assert_eq!(items[0].resolution.as_deref(), Some("1920x1080"));
        assert_eq!(items[1].published_at, "2023-11-14T22:13:20Z");
        assert_eq!(items[1].approx_size_bytes, Some(1_048_576));
        assert_eq!(items[2].published_at, "");
        assert_eq!(items[2].resolution.as_deref(), Some("1280x720"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().returning(|_, _| {
            Ok(CommandOutput::new(
                1,
                "",
                "ERROR: [youtube:tab] This channel does not exist.",
            ))
        });

        let outcome = source(mock)
            .list_channel("UCabcdefghijklmnopqrstuv", 10)
            .await;
        assert!(matches!(outcome, ListingOutcome::Fatal(reason) if reason.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_unparseable_listing_is_fatal() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .returning(|_, _| Ok(CommandOutput::ok("not json")));

        let outcome = source(mock).list_channel("@creator", 10).await;
        assert!(matches!(outcome, ListingOutcome::Fatal(_)));
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            item_id: "v1".into(),
            output_stem: "Test _ Video_ [v1]".into(),
            destination_dir: PathBuf::from("/tmp/dl"),
            format: format_selector("best").unwrap().into(),
        }
    }

    #[tokio::test]
    async fn test_download_returns_printed_path() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().times(1).returning(|_, args| {
            assert!(args.iter().any(|a| a == "after_move:filepath"));
            assert!(args.iter().any(|a| a == "/tmp/dl/Test _ Video_ [v1].%(ext)s"));
            assert_eq!(
                args.last().map(String::as_str),
                Some("https://www.youtube.com/watch?v=v1")
            );
            Ok(CommandOutput::ok("/tmp/dl/Test _ Video_ [v1].mp4\n"))
        });

        let downloader = YtDlpDownloader::new(Arc::new(mock));
        let path = downloader.download(&request()).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/dl/Test _ Video_ [v1].mp4"));
    }

    #[tokio::test]
    async fn test_download_error_classification() {
        let mut mock = MockCommandRunner::new();
        let mut calls = 0;
        mock.expect_run().times(3).returning(move |_, _| {
            calls += 1;
            Ok(match calls {
                1 => CommandOutput::new(1, "", "ERROR: unable to download video data: HTTP Error 503"),
                2 => CommandOutput::new(1, "", "ERROR: [youtube] v1: Private video. Sign in"),
                _ => CommandOutput::new(2, "", "yt-dlp: error: no such option: --bogus"),
            })
        });

        let downloader = YtDlpDownloader::new(Arc::new(mock));
        let transient = downloader.download(&request()).await.unwrap_err();
        assert!(transient.is_retryable());
        let private = downloader.download(&request()).await.unwrap_err();
        assert!(!private.is_retryable());
        let usage = downloader.download(&request()).await.unwrap_err();
        assert!(!usage.is_retryable());
    }

    #[tokio::test]
    async fn test_download_without_path_is_retryable_failure() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().returning(|_, _| Ok(CommandOutput::ok("")));

        let downloader = YtDlpDownloader::new(Arc::new(mock));
        let err = downloader.download(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
