//! Ledger row types.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One archived item. At most one row exists per `item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ArchiveRecord {
    pub item_id: String,
    /// Title at the time of archival
    pub title: String,
    /// ISO-8601 publish time, empty when unknown
    pub published_at: String,
    /// Final location in remote storage
    pub remote_path: String,
    /// Unix seconds
    pub archived_at: i64,
}
