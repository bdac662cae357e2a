//! Async runtime facade for the channel archiver.
//!
//! Every `core-*` and `provider-*` crate reaches the runtime through this crate
//! instead of naming tokio directly, so the runtime choice stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and structured join sets
//! - `time`: Sleep, timeouts and cancellable sleeps
//! - `sync`: Mutexes, semaphores, channels and the shutdown token
//! - `fs`: Async filesystem helpers
//! - `runtime`: Blocking entry point used by the attribute macros
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep_or_cancel, Duration};
//!
//! async fn example(token: CancellationToken) {
//!     // Returns false when the token fires before the delay elapses
//!     let completed = sleep_or_cancel(Duration::from_secs(5), &token).await;
//!     if !completed {
//!         return;
//!     }
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

// Lets the macros' `core_async::...` paths resolve inside this crate's own tests.
extern crate self as core_async;

pub mod fs;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
