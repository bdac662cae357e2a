//! # Event Bus System
//!
//! Broadcasts archive lifecycle events using `tokio::sync::broadcast`.
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Coordinator ├──────────────>│ EventBus  ├─────────────────>│ Subscriber │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! Emitting with no subscribers is normal for a headless process; callers
//! discard the send error with `.ok()`.
//!
//! ```rust
//! use core_runtime::events::{ArchiveEvent, EventBus};
//!
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//! bus.emit(ArchiveEvent::PassStarted { pass_id: "p1".into(), max_results: 50, dry_run: false }).ok();
//! assert!(rx.try_recv().is_ok());
//! ```

use core_async::sync::broadcast::{self, error::SendError, Receiver};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Events emitted while running archive passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ArchiveEvent {
    /// A pass began listing.
    PassStarted {
        pass_id: String,
        max_results: usize,
        dry_run: bool,
    },
    /// An item was uploaded and recorded in the ledger.
    ItemArchived {
        pass_id: String,
        item_id: String,
        remote_path: String,
        bytes: u64,
    },
    /// An item failed this pass; it will be retried on the next one.
    ItemFailed {
        pass_id: String,
        item_id: String,
        reason: String,
    },
    /// An item was abandoned because shutdown was requested.
    ItemCancelled { pass_id: String, item_id: String },
    /// A pass finished and all its workers have returned.
    PassCompleted {
        pass_id: String,
        listed: usize,
        done: usize,
        failed: usize,
        cancelled: usize,
        duration_ms: u64,
    },
}

impl ArchiveEvent {
    pub fn pass_id(&self) -> &str {
        match self {
            ArchiveEvent::PassStarted { pass_id, .. }
            | ArchiveEvent::ItemArchived { pass_id, .. }
            | ArchiveEvent::ItemFailed { pass_id, .. }
            | ArchiveEvent::ItemCancelled { pass_id, .. }
            | ArchiveEvent::PassCompleted { pass_id, .. } => pass_id,
        }
    }
}

/// Central broadcast channel for [`ArchiveEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ArchiveEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: ArchiveEvent) -> Result<usize, SendError<ArchiveEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<ArchiveEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
