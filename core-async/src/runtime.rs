//! Runtime entry points.
//!
//! `block_on` backs the `#[core_async::test]` and `#[core_async::main]`
//! attribute macros. It builds a fresh current-thread runtime per call.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs a future to completion on a new current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be constructed (for example when the process
/// is out of file descriptors for the I/O driver).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Builds a multi-threaded runtime for the long-running process.
///
/// # Errors
///
/// Returns the underlying I/O error if the runtime cannot be constructed.
pub fn multi_thread(worker_threads: usize) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name("archiver-worker")
        .enable_all()
        .build()
}
