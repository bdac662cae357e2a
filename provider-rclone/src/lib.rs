//! # rclone Provider
//!
//! Implements [`RemoteStore`](bridge_traits::RemoteStore) by driving the
//! `rclone` binary through a [`CommandRunner`](bridge_traits::CommandRunner).
//! Any backend rclone supports can hold the archive; the remote must already
//! be configured in rclone's own config file.

pub mod error;
pub mod store;
pub mod types;

pub use error::{RcloneError, Result};
pub use store::RcloneRemoteStore;
