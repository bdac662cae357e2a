//! # Host Bridge Traits
//!
//! Contracts between the archival core and the outside world.
//!
//! ## Overview
//!
//! The pipeline never talks to a network service, an external tool, or the
//! wall clock directly. Each capability it consumes is a trait defined here and
//! implemented in `bridge-desktop` or a `provider-*` crate:
//!
//! ### Networking & Processes
//! - [`HttpClient`](http::HttpClient) - Async HTTP for structured provider APIs
//! - [`CommandRunner`](process::CommandRunner) - Runs extraction and transfer tools
//!
//! ### Media & Storage
//! - [`CatalogSource`](media::CatalogSource) - One strategy for listing a channel
//! - [`MediaDownloader`](media::MediaDownloader) - Materializes one item locally
//! - [`RemoteStore`](remote::RemoteStore) - Durable remote storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert tool- or service-specific failures into the variant that
//! matches their retry semantics; callers decide whether to retry through
//! [`BridgeError::is_retryable`].
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! by every worker in a pass.

pub mod error;
pub mod http;
pub mod media;
pub mod process;
pub mod remote;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use media::{CatalogItem, CatalogSource, DownloadRequest, ListingOutcome, MediaDownloader};
pub use process::{CommandOutput, CommandRunner};
pub use remote::{join_remote, RemoteObject, RemoteStore};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
