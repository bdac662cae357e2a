//! Channel reference parsing.
//!
//! Operators configure a channel as a bare id (`UC…`), a `/channel/UC…` URL,
//! a handle (`@name` or `/@name` URL), or a legacy `/user/` or `/c/` URL.
//! Only the id forms can be used with the Data API; every form can be handed
//! to yt-dlp.

use crate::error::{Result, YouTubeError};

const SITE: &str = "https://www.youtube.com";

/// A parsed channel reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Canonical channel id, `UC` followed by 22 url-safe characters.
    Id(String),
    /// `@handle`, without the `@`.
    Handle(String),
    /// Any other channel URL (`/user/…`, `/c/…`).
    Url(String),
}

impl ChannelRef {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(YouTubeError::UnsupportedChannelRef(
                "empty channel reference".to_string(),
            ));
        }

        if is_channel_id(trimmed) {
            return Ok(ChannelRef::Id(trimmed.to_string()));
        }

        if let Some(handle) = trimmed.strip_prefix('@') {
            return handle_ref(handle, input);
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            if let Some(rest) = after_marker(trimmed, "/channel/") {
                let id = first_segment(rest);
                if is_channel_id(id) {
                    return Ok(ChannelRef::Id(id.to_string()));
                }
                return Err(YouTubeError::UnsupportedChannelRef(format!(
                    "malformed channel id in '{}'",
                    input
                )));
            }
            if let Some(rest) = after_marker(trimmed, "/@") {
                return handle_ref(first_segment(rest), input);
            }
            return Ok(ChannelRef::Url(trimmed.trim_end_matches('/').to_string()));
        }

        Err(YouTubeError::UnsupportedChannelRef(format!(
            "'{}' is not a channel id, handle or URL",
            input
        )))
    }

    /// The channel id, when the reference carries one.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            ChannelRef::Id(id) => Some(id),
            _ => None,
        }
    }

    /// The channel's video tab, as listed by yt-dlp.
    pub fn videos_url(&self) -> String {
        match self {
            ChannelRef::Id(id) => format!("{}/channel/{}/videos", SITE, id),
            ChannelRef::Handle(handle) => format!("{}/@{}/videos", SITE, handle),
            ChannelRef::Url(url) if url.ends_with("/videos") => url.clone(),
            ChannelRef::Url(url) => format!("{}/videos", url),
        }
    }
}

fn is_channel_id(candidate: &str) -> bool {
    candidate.len() == 24
        && candidate.starts_with("UC")
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn handle_ref(handle: &str, input: &str) -> Result<ChannelRef> {
    let handle = first_segment(handle);
    if handle.is_empty() {
        return Err(YouTubeError::UnsupportedChannelRef(format!(
            "empty handle in '{}'",
            input
        )));
    }
    Ok(ChannelRef::Handle(handle.to_string()))
}

fn after_marker<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    url.find(marker).map(|idx| &url[idx + marker.len()..])
}

fn first_segment(path: &str) -> &str {
    path.split(['/', '?', '#']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "UCabcdefghijklmnopqrstuv";

    #[test]
    fn test_parse_bare_id() {
        assert_eq!(ChannelRef::parse(ID).unwrap(), ChannelRef::Id(ID.into()));
    }

    #[test]
    fn test_parse_channel_url() {
        let url = format!("https://www.youtube.com/channel/{}/videos?view=0", ID);
        let parsed = ChannelRef::parse(&url).unwrap();
        assert_eq!(parsed.channel_id(), Some(ID));
        assert_eq!(
            parsed.videos_url(),
            format!("https://www.youtube.com/channel/{}/videos", ID)
        );
    }

    #[test]
    fn test_parse_handles() {
        assert_eq!(
            ChannelRef::parse("@SomeCreator").unwrap(),
            ChannelRef::Handle("SomeCreator".into())
        );
        let parsed = ChannelRef::parse("https://www.youtube.com/@SomeCreator/streams").unwrap();
        assert_eq!(parsed, ChannelRef::Handle("SomeCreator".into()));
        assert_eq!(parsed.channel_id(), None);
        assert_eq!(
            parsed.videos_url(),
            "https://www.youtube.com/@SomeCreator/videos"
        );
    }

    #[test]
    fn test_legacy_urls_get_videos_suffix_once() {
        let parsed = ChannelRef::parse("https://www.youtube.com/user/legacy/").unwrap();
        assert_eq!(
            parsed.videos_url(),
            "https://www.youtube.com/user/legacy/videos"
        );

        let parsed = ChannelRef::parse("https://www.youtube.com/c/custom/videos").unwrap();
        assert_eq!(parsed.videos_url(), "https://www.youtube.com/c/custom/videos");
    }

    #[test]
    fn test_malformed_references() {
        assert!(ChannelRef::parse("").is_err());
        assert!(ChannelRef::parse("not a channel").is_err());
        assert!(ChannelRef::parse("https://www.youtube.com/channel/UCshort").is_err());
        assert!(ChannelRef::parse("@").is_err());
    }
}
