//! Remote Storage Abstraction
//!
//! Durable storage is reached through [`RemoteStore`]. Paths passed to the
//! trait are relative to the store's configured base; [`RemoteStore::resolve`]
//! renders them for logs and ledger records.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// An object that exists in remote storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub path: String,
    pub size: u64,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full display location of a relative path, e.g. `remote:base/2024/a.mp4`.
    fn resolve(&self, relative: &str) -> String;

    /// Verifies the store is reachable with the configured credentials.
    async fn check_connection(&self) -> Result<()>;

    /// Creates `subpath` and its parents. Succeeds if it already exists.
    async fn ensure_path_exists(&self, subpath: &str) -> Result<()>;

    /// Copies `local_path` into the directory `subpath`, keeping its file name.
    async fn upload_file(&self, local_path: &Path, subpath: &str) -> Result<()>;

    /// Returns the object at `relative_file`, or `None` if absent.
    async fn stat_remote_file(&self, relative_file: &str) -> Result<Option<RemoteObject>>;
}

/// Joins remote path segments with `/`, ignoring empty segments.
pub fn join_remote(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
