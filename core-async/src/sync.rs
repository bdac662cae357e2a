//! Synchronization primitives.
//!
//! All primitives are async-aware `tokio::sync` types and are `Send + Sync`.
//! `CancellationToken` is the process-wide shutdown signal: it is cloned into
//! every long-running call and polled at checkpoints.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use core_async::sync::{Mutex, Semaphore};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let permits = Arc::new(Semaphore::new(4));
//!     let _permit = permits.clone().acquire_owned().await.unwrap();
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify, OwnedSemaphorePermit,
    RwLock, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
