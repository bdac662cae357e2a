//! Data API v3 listing strategy
//!
//! Lists a channel's uploads playlist page by page. Every request passes
//! through the shared [`RateLimiter`](crate::rate_limit::RateLimiter); quota
//! and auth failures report `Unavailable` so the caller falls back to yt-dlp.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::media::{CatalogItem, CatalogSource, ListingOutcome};
use core_async::time::Duration;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::channel::ChannelRef;
use crate::error::{Result, YouTubeError};
use crate::rate_limit::SharedRateLimiter;
use crate::types::{ApiErrorResponse, ChannelListResponse, PlaylistItem, PlaylistItemListResponse};

/// Data API base URL
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum results per page (Data API limit)
const MAX_PAGE_SIZE: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const VIDEO_KIND: &str = "youtube#video";

/// Data API v3 catalog source.
///
/// # Example
///
/// ```ignore
/// let limiter = RateLimiter::shared(1000, Arc::new(SystemClock));
/// let source = DataApiSource::new(http_client, api_key, limiter);
/// match source.list_channel("UC...", 50).await {
///     ListingOutcome::Listed(items) => { /* newest uploads */ }
///     other => { /* try the next strategy */ }
/// }
/// ```
pub struct DataApiSource {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    rate_limiter: SharedRateLimiter,
    base_url: String,
}

impl DataApiSource {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        rate_limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            rate_limiter,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the source at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[instrument(skip(self))]
    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<String> {
        let request = HttpRequest::get(format!("{}/channels", self.base_url))
            .query("part", "contentDetails")
            .query("id", channel_id);

        let response: ChannelListResponse = self.get_json(request).await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|channel| channel.content_details)
            .and_then(|details| details.related_playlists.uploads)
            .filter(|uploads| !uploads.is_empty())
            .ok_or_else(|| {
                YouTubeError::ChannelNotFound(format!("no uploads playlist for {}", channel_id))
            })
    }

    #[instrument(skip(self))]
    async fn list_uploads(&self, playlist_id: &str, max_results: usize) -> Result<Vec<CatalogItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        while items.len() < max_results {
            let page_size = (max_results - items.len()).min(MAX_PAGE_SIZE);
            let mut request = HttpRequest::get(format!("{}/playlistItems", self.base_url))
                .query("part", "snippet,contentDetails")
                .query("playlistId", playlist_id)
                .query("maxResults", page_size.to_string());
            if let Some(token) = &page_token {
                request = request.query("pageToken", token.as_str());
            }

            let page: PlaylistItemListResponse = self.get_json(request).await?;
            let before = items.len();
            items.extend(page.items.into_iter().filter_map(convert_item));
            debug!(
                "Fetched page with {} videos (total {})",
                items.len() - before,
                items.len()
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        items.truncate(max_results);
        Ok(items)
    }

    /// Rate-limited GET that classifies the status before decoding the body.
    async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let request = request
            .query("key", self.api_key.as_str())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        self.rate_limiter.lock().await.wait_if_needed().await;
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            self.rate_limiter.lock().await.relax();
            return response
                .json()
                .map_err(|e| YouTubeError::ParseError(e.to_string()));
        }

        Err(self.classify_failure(response).await)
    }

    async fn classify_failure(&self, response: HttpResponse) -> YouTubeError {
        let status = response.status;
        let envelope: Option<ApiErrorResponse> = response.json().ok();
        let message = envelope
            .as_ref()
            .map(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .or_else(|| response.text().ok())
            .unwrap_or_default();

        match status {
            403 | 429 => {
                self.rate_limiter.lock().await.throttled();
                let quota = status == 429 || envelope.as_ref().is_some_and(|e| e.is_quota());
                if quota {
                    YouTubeError::QuotaExceeded(message)
                } else {
                    YouTubeError::ApiError {
                        status_code: status,
                        message,
                    }
                }
            }
            404 => YouTubeError::ChannelNotFound(message),
            _ => YouTubeError::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

#[async_trait]
impl CatalogSource for DataApiSource {
    fn name(&self) -> &str {
        "youtube-data-api"
    }

    async fn list_channel(&self, channel: &str, max_results: usize) -> ListingOutcome {
        let channel_id = match ChannelRef::parse(channel) {
            Ok(ChannelRef::Id(id)) => id,
            Ok(other) => {
                return ListingOutcome::Unavailable(format!(
                    "Data API needs a channel id, got {:?}",
                    other
                ))
            }
            Err(e) => return ListingOutcome::Unavailable(e.to_string()),
        };

        let result = match self.uploads_playlist_id(&channel_id).await {
            Ok(playlist_id) => self.list_uploads(&playlist_id, max_results).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(items) => {
                info!("Listed {} uploads for {}", items.len(), channel_id);
                ListingOutcome::Listed(items)
            }
            Err(YouTubeError::ChannelNotFound(reason)) => ListingOutcome::Fatal(format!(
                "channel {} not found: {}",
                channel_id, reason
            )),
            Err(e) => {
                warn!("Data API listing unavailable: {}", e);
                ListingOutcome::Unavailable(e.to_string())
            }
        }
    }
}

fn convert_item(item: PlaylistItem) -> Option<CatalogItem> {
    let snippet = item.snippet?;
    let resource = snippet.resource_id.as_ref();
    if resource.and_then(|r| r.kind.as_deref()) != Some(VIDEO_KIND) {
        return None;
    }

    let details = item.content_details;
    let id = details
        .as_ref()
        .and_then(|d| d.video_id.clone())
        .or_else(|| resource.and_then(|r| r.video_id.clone()))
        .filter(|id| !id.is_empty())?;
    let published_at = details
        .and_then(|d| d.video_published_at)
        .or(snippet.published_at)
        .unwrap_or_default();

    Some(CatalogItem::new(id, snippet.title, published_at))
}
