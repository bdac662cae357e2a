//! Wire types for the Data API v3 and yt-dlp's flat-playlist JSON.

use serde::Deserialize;

// ============================================================================
// Data API v3
// ============================================================================

/// `GET channels?part=contentDetails`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelResource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    pub id: Option<String>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

/// `GET playlistItems?part=snippet,contentDetails`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub snippet: Option<PlaylistItemSnippet>,
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub title: String,
    pub published_at: Option<String>,
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: Option<String>,
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: Option<String>,
    pub video_published_at: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ApiErrorResponse {
    /// Whether any detail reports a quota or rate limit reason.
    pub fn is_quota(&self) -> bool {
        self.error.errors.iter().any(|e| {
            matches!(
                e.reason.as_str(),
                "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded" | "dailyLimitExceeded"
            )
        })
    }
}

// ============================================================================
// yt-dlp
// ============================================================================

/// `yt-dlp --flat-playlist --dump-single-json`
#[derive(Debug, Clone, Deserialize)]
pub struct FlatPlaylist {
    #[serde(default)]
    pub entries: Vec<FlatEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
    pub timestamp: Option<i64>,
    pub duration: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub resolution: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_items_deserialize() {
        let json = r#"{
            "nextPageToken": "CAUQAA",
            "items": [{
                "snippet": {
                    "title": "First upload",
                    "publishedAt": "2024-03-01T10:00:00Z",
                    "resourceId": {"kind": "youtube#video", "videoId": "abc123def45"}
                },
                "contentDetails": {"videoId": "abc123def45", "videoPublishedAt": "2024-02-29T18:00:00Z"}
            }]
        }"#;
        let page: PlaylistItemListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CAUQAA"));
        let details = page.items[0].content_details.as_ref().unwrap();
        assert_eq!(details.video_published_at.as_deref(), Some("2024-02-29T18:00:00Z"));
    }

    #[test]
    fn test_quota_reason_detection() {
        let json = r#"{"error": {"code": 403, "message": "quota", "errors": [{"reason": "quotaExceeded"}]}}"#;
        let error: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert!(error.is_quota());

        let json = r#"{"error": {"code": 403, "message": "forbidden", "errors": [{"reason": "forbidden"}]}}"#;
        let error: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert!(!error.is_quota());
    }
}
