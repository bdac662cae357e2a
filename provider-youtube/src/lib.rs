//! # YouTube Provider
//!
//! Catalog listing and media download for YouTube channels.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DataApiSource`]: paginated listing through the Data API v3 uploads playlist
//! - [`YtDlpSource`]: flat-playlist listing through `yt-dlp`, used as fallback
//! - [`YtDlpDownloader`]: single-video download with metadata and thumbnail embedding
//! - [`RateLimiter`]: adaptive spacing of outbound requests, shared by both sources
//!
//! Both sources implement [`CatalogSource`](bridge_traits::CatalogSource) and
//! report a tagged [`ListingOutcome`](bridge_traits::ListingOutcome) rather
//! than an error, so the caller can try them in order.

pub mod channel;
pub mod data_api;
pub mod error;
pub mod rate_limit;
pub mod types;
pub mod ytdlp;

pub use channel::ChannelRef;
pub use data_api::DataApiSource;
pub use error::{Result, YouTubeError};
pub use rate_limit::{RateLimiter, SharedRateLimiter};
pub use ytdlp::{format_selector, YtDlpDownloader, YtDlpSource};
