//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for a long-running host process
//! (Linux, macOS, Windows).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, retrying 5xx responses with backoff
//! - `CommandRunner` using `tokio::process`, with an optional per-call timeout
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioCommandRunner};
//! use std::time::Duration;
//!
//! let http = ReqwestHttpClient::new()?;
//! let runner = TokioCommandRunner::new().with_timeout(Duration::from_secs(3600));
//! ```

mod http;
mod process;

pub use http::ReqwestHttpClient;
pub use process::TokioCommandRunner;
