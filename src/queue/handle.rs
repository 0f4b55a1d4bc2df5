//! Shared queue handle.
//!
//! Wraps the pure reducer in an `Arc<Mutex<_>>` and bumps a watch-channel
//! revision on every effective mutation. Consumers that need to react to
//! queue changes (the playlist player's autoplay, the CLI's settle-wait)
//! subscribe to the revision instead of polling.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{GpsFix, SnapResult};

use super::state::{QueueAction, QueueCounts, QueueItem, QueueItemStatus, SnapQueue};

/// Cheaply cloneable handle to the single shared snap queue.
#[derive(Clone)]
pub struct QueueHandle {
    inner: Arc<Inner>,
}

struct Inner {
    queue: Mutex<SnapQueue>,
    revision: watch::Sender<u64>,
}

impl Default for QueueHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueHandle {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(SnapQueue::new()),
                revision,
            }),
        }
    }

    fn apply(&self, action: QueueAction) -> bool {
        let changed = {
            let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
            queue.apply(action)
        };
        if changed {
            self.inner.revision.send_modify(|rev| *rev += 1);
        }
        changed
    }

    /// Append a new pending item. Returns its id immediately.
    pub fn enqueue(
        &self,
        image: Arc<Vec<u8>>,
        locale: impl Into<String>,
        gps: Option<GpsFix>,
    ) -> Uuid {
        let item = QueueItem::new(image, locale, gps);
        let id = item.id;
        self.apply(QueueAction::Enqueue(item));
        id
    }

    /// Mark an item as claimed by an in-flight snap call.
    pub fn mark_processing(&self, id: Uuid) -> bool {
        self.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Processing,
            result: None,
            error: None,
        })
    }

    /// Attach a resolved snap result. No-op if the item was removed.
    pub fn mark_ready(&self, id: Uuid, result: Arc<SnapResult>) -> bool {
        self.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Ready,
            result: Some(result),
            error: None,
        })
    }

    /// Record a snap failure. No-op if the item was removed.
    pub fn mark_failed(&self, id: Uuid, message: impl Into<String>) -> bool {
        self.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Error,
            result: None,
            error: Some(message.into()),
        })
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.apply(QueueAction::Remove(id))
    }

    pub fn clear(&self) {
        self.apply(QueueAction::Clear);
    }

    /// Snapshot of all items in insertion order.
    pub fn items(&self) -> Vec<Arc<QueueItem>> {
        self.inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .items()
            .to_vec()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<QueueItem>> {
        self.inner.queue.lock().expect("queue lock poisoned").get(id)
    }

    pub fn counts(&self) -> QueueCounts {
        self.inner.queue.lock().expect("queue lock poisoned").counts()
    }

    /// Subscribe to the mutation revision counter. The receiver is marked
    /// changed after every effective queue mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// True when no item is pending or processing, i.e. every dispatched
    /// snap has settled into `ready` or `error`.
    pub fn is_settled(&self) -> bool {
        let counts = self.counts();
        counts.pending == 0 && counts.processing == 0
    }
}
