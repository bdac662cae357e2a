//! Ledger trait and SQLite implementation

use crate::db::{create_pool, DatabaseConfig};
use crate::error::{LedgerError, Result};
use crate::models::ArchiveRecord;
use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::Mutex;
use sqlx::{query, query_as, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Durable record of archived items.
///
/// Implementations must serialize every call against the same physical store
/// and must never report an item as recorded unless the row is persisted.
#[async_trait]
pub trait ArchiveLedger: Send + Sync {
    /// Whether `item_id` has been archived. Local lookup only.
    async fn is_archived(&self, item_id: &str) -> Result<bool>;

    /// Insert-if-absent.
    ///
    /// # Returns
    /// - `Ok(true)` if a new row was written
    /// - `Ok(false)` if the item was already recorded (no-op)
    ///
    /// # Errors
    /// Returns error if `item_id` is empty or the write fails
    async fn record_archived(
        &self,
        item_id: &str,
        title: &str,
        published_at: &str,
        remote_path: &str,
    ) -> Result<bool>;

    /// Every archived id, in no particular order.
    async fn list_archived(&self) -> Result<Vec<String>>;

    /// Full record for `item_id`, if archived.
    async fn get_record(&self, item_id: &str) -> Result<Option<ArchiveRecord>>;

    async fn count_archived(&self) -> Result<u64>;
}

/// SQLite-backed ledger.
///
/// All operations hold `guard` for their duration, giving one
/// mutual-exclusion domain per database regardless of pool size.
pub struct SqliteArchiveLedger {
    pool: SqlitePool,
    guard: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl SqliteArchiveLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            guard: Mutex::new(()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Opens (creating if needed) the database described by `config`.
    pub async fn open(config: DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Fresh in-memory ledger with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        Self::open(DatabaseConfig::in_memory()).await
    }

    /// Use `clock` for `archived_at` timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ArchiveLedger for SqliteArchiveLedger {
    async fn is_archived(&self, item_id: &str) -> Result<bool> {
        let _guard = self.guard.lock().await;

        let row: Option<(i64,)> = query_as("SELECT 1 FROM archived_items WHERE item_id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    #[instrument(skip(self, title, published_at))]
    async fn record_archived(
        &self,
        item_id: &str,
        title: &str,
        published_at: &str,
        remote_path: &str,
    ) -> Result<bool> {
        if item_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput {
                field: "item_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let _guard = self.guard.lock().await;

        let result = query(
            r#"
            INSERT OR IGNORE INTO archived_items
                (item_id, title, published_at, remote_path, archived_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(title)
        .bind(published_at)
        .bind(remote_path)
        .bind(self.clock.unix_timestamp())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            info!(remote_path, "Recorded archived item");
        } else {
            debug!("Item already recorded; insert ignored");
        }
        Ok(inserted)
    }

    async fn list_archived(&self) -> Result<Vec<String>> {
        let _guard = self.guard.lock().await;

        let rows: Vec<(String,)> = query_as("SELECT item_id FROM archived_items")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn get_record(&self, item_id: &str) -> Result<Option<ArchiveRecord>> {
        let _guard = self.guard.lock().await;

        let record = query_as::<_, ArchiveRecord>(
            r#"
            SELECT item_id, title, published_at, remote_path, archived_at
            FROM archived_items
            WHERE item_id = ?
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn count_archived(&self) -> Result<u64> {
        let _guard = self.guard.lock().await;

        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM archived_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};

    async fn setup_ledger() -> SqliteArchiveLedger {
        SqliteArchiveLedger::in_memory().await.unwrap()
    }

    #[core_async::test]
    async fn test_record_then_is_archived() {
        let ledger = setup_ledger().await;

        assert!(!ledger.is_archived("abc123").await.unwrap());
        let inserted = ledger
            .record_archived("abc123", "Title", "2024-01-01T00:00:00Z", "remote:base/2024/a.mp4")
            .await
            .unwrap();

        assert!(inserted);
        assert!(ledger.is_archived("abc123").await.unwrap());
    }

    #[core_async::test]
    async fn test_second_record_is_silent_noop() {
        let ledger = setup_ledger().await;

        ledger
            .record_archived("abc123", "First", "", "remote:a")
            .await
            .unwrap();
        let second = ledger
            .record_archived("abc123", "Second", "", "remote:b")
            .await
            .unwrap();

        assert!(!second);
        assert_eq!(ledger.count_archived().await.unwrap(), 1);
        assert!(ledger.is_archived("abc123").await.unwrap());

        // First write wins
        let record = ledger.get_record("abc123").await.unwrap().unwrap();
        assert_eq!(record.title, "First");
        assert_eq!(record.remote_path, "remote:a");
    }

    #[core_async::test]
    async fn test_list_archived_returns_all_ids() {
        let ledger = setup_ledger().await;
        for id in ["a", "b", "c"] {
            ledger.record_archived(id, id, "", "remote:x").await.unwrap();
        }

        let mut ids = ledger.list_archived().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[core_async::test]
    async fn test_get_record_uses_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let ledger = setup_ledger()
            .await
            .with_clock(Arc::new(FixedClock(instant)));

        ledger
            .record_archived("v1", "Test / Video?", "2024-01-01T00:00:00Z", "remote:base/2024/v.mp4")
            .await
            .unwrap();

        let record = ledger.get_record("v1").await.unwrap().unwrap();
        assert_eq!(record.archived_at, instant.timestamp());
        assert_eq!(record.published_at, "2024-01-01T00:00:00Z");
        assert!(ledger.get_record("missing").await.unwrap().is_none());
    }

    #[core_async::test]
    async fn test_empty_id_is_rejected() {
        let ledger = setup_ledger().await;
        let err = ledger.record_archived("  ", "t", "", "r").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
        assert_eq!(ledger.count_archived().await.unwrap(), 0);
    }

    #[core_async::test]
    async fn test_concurrent_records_of_same_id_keep_one_row() {
        let ledger = Arc::new(setup_ledger().await);

        let mut handles = Vec::new();
        for n in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(core_async::spawn(async move {
                ledger
                    .record_archived("dup", &format!("title {n}"), "", "remote:x")
                    .await
                    .unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(ledger.count_archived().await.unwrap(), 1);
    }

    #[core_async::test]
    async fn test_file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.db");

        let ledger = SqliteArchiveLedger::open(DatabaseConfig::new(&path)).await.unwrap();
        ledger.record_archived("persisted", "t", "", "remote:x").await.unwrap();
        ledger.close().await;

        let reopened = SqliteArchiveLedger::open(DatabaseConfig::new(&path)).await.unwrap();
        assert!(reopened.is_archived("persisted").await.unwrap());
    }
}
