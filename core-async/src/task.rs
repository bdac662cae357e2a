//! Task spawning and execution abstractions.
//!
//! `spawn` returns an awaitable `JoinHandle`; `JoinSet` gives a structured
//! boundary where every spawned task is joined before the owner returns.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task::JoinSet;
//!
//! async fn example() {
//!     let mut set = JoinSet::new();
//!     for i in 0..3 {
//!         set.spawn(async move { i * 2 });
//!     }
//!     while let Some(result) = set.join_next().await {
//!         let _value = result.unwrap();
//!     }
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle, JoinSet};

/// Spawns a new asynchronous task on the current runtime.
///
/// The spawned task may run on a different thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
