//! Media Source Abstractions
//!
//! A [`CatalogSource`] lists a channel's items; a [`MediaDownloader`] turns one
//! item into a local file. Both are implemented by provider crates.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// One discoverable unit at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Provider-assigned identifier, stable across passes
    pub id: String,
    /// Display title; may contain characters unsafe for filenames
    pub title: String,
    /// ISO-8601 publish time, empty when unknown
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub approx_size_bytes: Option<u64>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        published_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            published_at: published_at.into(),
            duration_seconds: None,
            approx_size_bytes: None,
            resolution: None,
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_approx_size(mut self, bytes: u64) -> Self {
        self.approx_size_bytes = Some(bytes);
        self
    }

    pub fn with_resolution(mut self, label: impl Into<String>) -> Self {
        self.resolution = Some(label.into());
        self
    }

    /// Parsed publish time. `None` when empty or not RFC 3339.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        if self.published_at.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn publish_year(&self) -> Option<i32> {
        self.published().map(|dt| dt.year())
    }
}

/// Tagged result of one listing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// The strategy produced a catalog snapshot.
    Listed(Vec<CatalogItem>),
    /// This strategy cannot serve the request right now; try the next one.
    Unavailable(String),
    /// The request itself is unanswerable (e.g. the channel does not exist).
    Fatal(String),
}

/// A strategy for listing a channel's items.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lists up to `max_results` items of `channel`, in provider order.
    async fn list_channel(&self, channel: &str, max_results: usize) -> ListingOutcome;
}

/// Parameters for one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub item_id: String,
    /// Filename stem without extension, already filesystem-safe
    pub output_stem: String,
    pub destination_dir: PathBuf,
    /// Provider-specific format selector
    pub format: String,
}

/// Materializes a catalog item as a local file.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Runs one download attempt and returns the final file path.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`](crate::BridgeError) whose
    /// [`is_retryable`](crate::BridgeError::is_retryable) tells the caller
    /// whether another attempt is worthwhile.
    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_publish_year() {
        let item = CatalogItem::new("v1", "Title", "2024-01-01T00:00:00Z");
        assert_eq!(item.publish_year(), Some(2024));
    }

    #[test]
    fn unknown_or_garbled_dates_have_no_year() {
        assert_eq!(CatalogItem::new("v1", "t", "").publish_year(), None);
        assert_eq!(CatalogItem::new("v1", "t", "yesterday").published(), None);
    }
}
