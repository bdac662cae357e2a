//! Pass-level behaviour of the archive pipeline against in-memory
//! collaborators and a real in-memory ledger.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{
    CatalogItem, CatalogSource, DownloadRequest, ListingOutcome, MediaDownloader,
};
use bridge_traits::remote::{join_remote, RemoteObject, RemoteStore};
use core_archive::{
    BackoffPolicy, CoordinatorConfig, Fetcher, PassSummary, PipelineCoordinator, SourceLister,
    Uploader, UploaderConfig,
};
use core_async::fs;
use core_async::sync::{CancellationToken, Mutex, Notify};
use core_async::time::Duration;
use core_ledger::{ArchiveLedger, ArchiveRecord, LedgerError, SqliteArchiveLedger};
use core_runtime::events::{ArchiveEvent, EventBus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Collaborator stubs
// ============================================================================

struct StaticSource(Vec<CatalogItem>);

#[async_trait]
impl CatalogSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn list_channel(&self, _channel: &str, max_results: usize) -> ListingOutcome {
        ListingOutcome::Listed(self.0.iter().take(max_results).cloned().collect())
    }
}

#[derive(Default)]
struct StubDownloader {
    calls: AtomicUsize,
    always_fail: bool,
    panic_on: Option<String>,
    delays: HashMap<String, Duration>,
}

impl StubDownloader {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDownloader for StubDownloader {
    async fn download(&self, request: &DownloadRequest) -> BridgeResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(request.item_id.as_str()) {
            panic!("extractor crashed on {}", request.item_id);
        }
        if let Some(delay) = self.delays.get(&request.item_id) {
            core_async::sleep(*delay).await;
        }
        if self.always_fail {
            return Err(BridgeError::OperationFailed("HTTP Error 503".into()));
        }
        let path = request
            .destination_dir
            .join(format!("{}.mp4", request.output_stem));
        fs::write(&path, format!("payload of {}", request.item_id)).await?;
        Ok(path)
    }
}

#[derive(Default)]
struct StubStore {
    objects: Mutex<HashMap<String, u64>>,
    upload_calls: AtomicUsize,
    always_fail: bool,
    cancel_on_upload: Option<CancellationToken>,
}

impl StubStore {
    fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for StubStore {
    fn resolve(&self, relative: &str) -> String {
        format!("remote:{}", join_remote(&["base", relative]))
    }

    async fn check_connection(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn ensure_path_exists(&self, _subpath: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, subpath: &str) -> BridgeResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_upload {
            token.cancel();
        }
        if self.always_fail {
            return Err(BridgeError::CommandFailed {
                program: "rclone copy".into(),
                code: Some(5),
                stderr: "temporary error".into(),
                retryable: true,
            });
        }
        let size = fs::metadata(local_path).await?.len();
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.objects
            .lock()
            .await
            .insert(join_remote(&[subpath, &name]), size);
        Ok(())
    }

    async fn stat_remote_file(&self, relative_file: &str) -> BridgeResult<Option<RemoteObject>> {
        Ok(self
            .objects
            .lock()
            .await
            .get(relative_file)
            .map(|size| RemoteObject {
                path: self.resolve(relative_file),
                size: *size,
            }))
    }
}

/// Ledger whose writes always fail.
struct ReadOnlyLedger;

#[async_trait]
impl ArchiveLedger for ReadOnlyLedger {
    async fn is_archived(&self, _item_id: &str) -> core_ledger::Result<bool> {
        Ok(false)
    }

    async fn record_archived(
        &self,
        _item_id: &str,
        _title: &str,
        _published_at: &str,
        _remote_path: &str,
    ) -> core_ledger::Result<bool> {
        Err(LedgerError::Migration("database disk image is malformed".into()))
    }

    async fn list_archived(&self) -> core_ledger::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_record(&self, _item_id: &str) -> core_ledger::Result<Option<ArchiveRecord>> {
        Ok(None)
    }

    async fn count_archived(&self) -> core_ledger::Result<u64> {
        Ok(0)
    }
}

/// Ledger that admits commits only in a fixed order, holding back any
/// item that arrives early until its turn comes.
struct OrderedLedger {
    inner: Arc<SqliteArchiveLedger>,
    order: Vec<String>,
    committed: Mutex<Vec<String>>,
    turn: Notify,
}

impl OrderedLedger {
    fn new(inner: Arc<SqliteArchiveLedger>, order: Vec<String>) -> Self {
        Self {
            inner,
            order,
            committed: Mutex::new(Vec::new()),
            turn: Notify::new(),
        }
    }

    async fn committed(&self) -> Vec<String> {
        self.committed.lock().await.clone()
    }
}

#[async_trait]
impl ArchiveLedger for OrderedLedger {
    async fn is_archived(&self, item_id: &str) -> core_ledger::Result<bool> {
        self.inner.is_archived(item_id).await
    }

    async fn record_archived(
        &self,
        item_id: &str,
        title: &str,
        published_at: &str,
        remote_path: &str,
    ) -> core_ledger::Result<bool> {
        loop {
            let notified = self.turn.notified();
            {
                let mut committed = self.committed.lock().await;
                if self.order.get(committed.len()).map(String::as_str) == Some(item_id) {
                    let result = self
                        .inner
                        .record_archived(item_id, title, published_at, remote_path)
                        .await;
                    committed.push(item_id.to_string());
                    drop(committed);
                    self.turn.notify_waiters();
                    return result;
                }
            }
            notified.await;
        }
    }

    async fn list_archived(&self) -> core_ledger::Result<Vec<String>> {
        self.inner.list_archived().await
    }

    async fn get_record(&self, item_id: &str) -> core_ledger::Result<Option<ArchiveRecord>> {
        self.inner.get_record(item_id).await
    }

    async fn count_archived(&self) -> core_ledger::Result<u64> {
        self.inner.count_archived().await
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    coordinator: PipelineCoordinator,
    downloader: Arc<StubDownloader>,
    store: Arc<StubStore>,
    bus: EventBus,
    dir: TempDir,
}

struct Setup {
    items: Vec<CatalogItem>,
    downloader: StubDownloader,
    store: StubStore,
    max_retries: u32,
    worker_count: usize,
    dry_run: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            downloader: StubDownloader::default(),
            store: StubStore::default(),
            max_retries: 2,
            worker_count: 4,
            dry_run: false,
        }
    }
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(4))
}

fn build(setup: Setup, ledger: Arc<dyn ArchiveLedger>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let downloader = Arc::new(setup.downloader);
    let store = Arc::new(setup.store);
    let bus = EventBus::new(256);

    let source: Arc<dyn CatalogSource> = Arc::new(StaticSource(setup.items));
    let lister = Arc::new(SourceLister::new("UCchannel", vec![source]));
    let fetcher = Arc::new(
        Fetcher::new(downloader.clone(), "best", setup.max_retries).with_backoff(fast_backoff()),
    );
    let uploader = Arc::new(Uploader::new(
        store.clone(),
        UploaderConfig {
            max_retries: setup.max_retries,
            backoff: fast_backoff(),
            ..UploaderConfig::default()
        },
    ));

    let coordinator = PipelineCoordinator::new(
        lister,
        fetcher,
        uploader,
        ledger,
        bus.clone(),
        CoordinatorConfig {
            worker_count: setup.worker_count,
            dry_run: setup.dry_run,
            download_dir: dir.path().join("downloads"),
            channel_folder: None,
        },
    );

    Harness {
        coordinator,
        downloader,
        store,
        bus,
        dir,
    }
}

async fn memory_ledger() -> Arc<SqliteArchiveLedger> {
    Arc::new(SqliteArchiveLedger::in_memory().await.unwrap())
}

fn item(id: &str, title: &str, published_at: &str) -> CatalogItem {
    CatalogItem::new(id, title, published_at)
}

fn numbered(count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|i| item(&format!("v{}", i), &format!("Video {}", i), "2024-06-01T00:00:00Z"))
        .collect()
}

async fn run(harness: &Harness, max_results: usize) -> PassSummary {
    harness
        .coordinator
        .run_pass(max_results, &CancellationToken::new())
        .await
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[core_async::test]
async fn test_end_to_end_single_item() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: vec![item("v1", "Test / Video?", "2024-01-01T00:00:00Z")],
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = run(&harness, 50).await;
    assert_eq!(summary.listed, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 0);

    assert!(ledger.is_archived("v1").await.unwrap());
    let record = ledger.get_record("v1").await.unwrap().unwrap();
    assert_eq!(record.remote_path, "remote:base/2024/Test _ Video_ [v1].mp4");
    assert_eq!(record.title, "Test / Video?");

    let file_name = record.remote_path.rsplit('/').next().unwrap();
    assert!(!file_name.contains('/') && !file_name.contains('?') && !file_name.contains(':'));

    let local = harness
        .dir
        .path()
        .join("downloads")
        .join("Test _ Video_ [v1].mp4");
    assert!(!local.exists(), "local file is removed after commit");
}

#[core_async::test]
async fn test_archived_items_are_never_transferred() {
    let ledger = memory_ledger().await;
    ledger
        .record_archived("abc123", "Old", "2023-01-01T00:00:00Z", "remote:base/2023/Old [abc123].mp4")
        .await
        .unwrap();
    let harness = build(
        Setup {
            items: vec![item("abc123", "Old", "2023-01-01T00:00:00Z")],
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = run(&harness, 50).await;
    assert_eq!(summary.already_archived, 1);
    assert_eq!(summary.done + summary.failed + summary.cancelled, 0);
    assert_eq!(harness.downloader.calls(), 0);
    assert_eq!(harness.store.uploads(), 0);
    assert_eq!(ledger.count_archived().await.unwrap(), 1);
}

#[core_async::test]
async fn test_fetch_exhaustion_marks_job_failed() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: vec![item("v1", "Flaky", "2024-01-01T00:00:00Z")],
            downloader: StubDownloader {
                always_fail: true,
                ..StubDownloader::default()
            },
            max_retries: 2,
            ..Setup::default()
        },
        ledger.clone(),
    );
    let mut events = harness.bus.subscribe();

    let summary = run(&harness, 50).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(harness.downloader.calls(), 3);
    assert_eq!(harness.store.uploads(), 0);
    assert!(!ledger.is_archived("v1").await.unwrap());

    let mut reasons = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ArchiveEvent::ItemFailed { reason, .. } = event {
            reasons.push(reason);
        }
    }
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].starts_with("fetch exhausted"));
}

#[core_async::test]
async fn test_upload_exhaustion_keeps_local_file() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: vec![item("v1", "Stuck", "2024-01-01T00:00:00Z")],
            store: StubStore {
                always_fail: true,
                ..StubStore::default()
            },
            max_retries: 2,
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = run(&harness, 50).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(harness.store.uploads(), 3);
    assert!(!ledger.is_archived("v1").await.unwrap());
    assert!(harness
        .dir
        .path()
        .join("downloads")
        .join("Stuck [v1].mp4")
        .exists());
}

#[core_async::test]
async fn test_failed_items_are_retried_next_pass() {
    let ledger = memory_ledger().await;
    let failing = build(
        Setup {
            items: vec![item("v1", "Retry me", "2024-01-01T00:00:00Z")],
            downloader: StubDownloader {
                always_fail: true,
                ..StubDownloader::default()
            },
            max_retries: 0,
            ..Setup::default()
        },
        ledger.clone(),
    );
    assert_eq!(run(&failing, 50).await.failed, 1);

    let healthy = build(
        Setup {
            items: vec![item("v1", "Retry me", "2024-01-01T00:00:00Z")],
            ..Setup::default()
        },
        ledger.clone(),
    );
    assert_eq!(run(&healthy, 50).await.done, 1);
    assert!(ledger.is_archived("v1").await.unwrap());
}

#[core_async::test]
async fn test_cancel_before_pass_commits_nothing() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: numbered(5),
            ..Setup::default()
        },
        ledger.clone(),
    );
    let token = CancellationToken::new();
    token.cancel();

    let summary = harness.coordinator.run_pass(50, &token).await.unwrap();
    assert_eq!(summary.listed, 0);
    assert_eq!(summary.done, 0);
    assert_eq!(harness.downloader.calls(), 0);
    assert_eq!(ledger.count_archived().await.unwrap(), 0);
}

#[core_async::test]
async fn test_cancel_mid_pass_stops_dispatch() {
    let ledger = memory_ledger().await;
    let token = CancellationToken::new();
    let harness = build(
        Setup {
            items: numbered(5),
            store: StubStore {
                cancel_on_upload: Some(token.clone()),
                ..StubStore::default()
            },
            worker_count: 1,
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = harness.coordinator.run_pass(50, &token).await.unwrap();

    // The in-flight upload completes and is committed; nothing else starts.
    assert_eq!(summary.done, 1);
    assert_eq!(summary.cancelled, 4);
    assert_eq!(harness.downloader.calls(), 1);
    assert_eq!(harness.store.uploads(), 1);
    assert_eq!(ledger.count_archived().await.unwrap(), 1);
}

#[core_async::test]
async fn test_out_of_order_completion_is_counted_correctly() {
    let items = numbered(8);
    let listing: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
    let reversed: Vec<String> = listing.iter().rev().cloned().collect();
    let ledger = Arc::new(OrderedLedger::new(memory_ledger().await, reversed.clone()));
    let harness = build(
        Setup {
            items,
            worker_count: 8,
            ..Setup::default()
        },
        ledger.clone(),
    );
    let mut events = harness.bus.subscribe();

    // Every item must be in flight at once for the last one to commit first.
    let summary = core_async::time::timeout(Duration::from_secs(10), run(&harness, 50))
        .await
        .expect("pass stalled; items were not processed concurrently");
    assert_eq!(summary.listed, 8);
    assert_eq!(summary.done, 8);
    assert_eq!(summary.failed + summary.cancelled, 0);

    assert_eq!(ledger.committed().await, reversed);

    let mut archived = ledger.list_archived().await.unwrap();
    archived.sort();
    let mut expected = listing.clone();
    expected.sort();
    assert_eq!(archived, expected);

    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ArchiveEvent::ItemArchived { item_id, .. } = event {
            completed.push(item_id);
        }
    }
    completed.sort();
    assert_eq!(completed, expected);
}

#[core_async::test]
async fn test_dry_run_touches_nothing() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: vec![
                item("v1", "One", "2024-01-01T00:00:00Z"),
                item("v2", "Two", "2023-01-01T00:00:00Z"),
            ],
            dry_run: true,
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = run(&harness, 50).await;
    assert!(summary.dry_run);
    assert_eq!(summary.planned, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(summary.done, 0);
    assert_eq!(harness.downloader.calls(), 0);
    assert_eq!(harness.store.uploads(), 0);
    assert_eq!(ledger.count_archived().await.unwrap(), 0);
}

#[core_async::test]
async fn test_ledger_write_failure_fails_job_and_keeps_file() {
    let harness = build(
        Setup {
            items: vec![item("v1", "Unlucky", "2024-01-01T00:00:00Z")],
            ..Setup::default()
        },
        Arc::new(ReadOnlyLedger),
    );

    let summary = run(&harness, 50).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 0);
    assert_eq!(harness.store.uploads(), 1);
    assert!(harness
        .dir
        .path()
        .join("downloads")
        .join("Unlucky [v1].mp4")
        .exists());
}

#[core_async::test]
async fn test_worker_panic_is_contained() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: vec![
                item("boom", "Crashes", "2024-01-02T00:00:00Z"),
                item("fine", "Works", "2024-01-01T00:00:00Z"),
            ],
            downloader: StubDownloader {
                panic_on: Some("boom".into()),
                ..StubDownloader::default()
            },
            ..Setup::default()
        },
        ledger.clone(),
    );

    let summary = run(&harness, 50).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 1);
    assert!(ledger.is_archived("fine").await.unwrap());
    assert!(!ledger.is_archived("boom").await.unwrap());
}

#[core_async::test]
async fn test_pass_emits_lifecycle_events() {
    let ledger = memory_ledger().await;
    let harness = build(
        Setup {
            items: numbered(2),
            ..Setup::default()
        },
        ledger,
    );
    let mut events = harness.bus.subscribe();

    let summary = run(&harness, 50).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.pass_id(), summary.pass_id);
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(ArchiveEvent::PassStarted { max_results: 50, .. })));
    assert!(matches!(
        seen.last(),
        Some(ArchiveEvent::PassCompleted { done: 2, listed: 2, .. })
    ));
}
