//! Pure queue reducer.
//!
//! State is derived exclusively by applying `QueueAction`s in order; there
//! is no other mutation path. Invalid actions (unknown id, missing payload
//! for a terminal status) leave the collection untouched — a late status
//! update racing a removal is an expected no-op, not an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{GpsFix, SnapResult};

/// Lifecycle status of a queue item.
///
/// Transitions are forward-only within one item's life: an item never
/// returns to `Pending`, and nothing leaves `Ready`/`Error` except removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    /// Waiting for a dispatch slot
    Pending,

    /// Snap call in flight
    Processing,

    /// Snap resolved with a result
    Ready,

    /// Snap failed
    Error,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One captured photo and its processing lifecycle.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Stable unique id, assigned at enqueue time
    pub id: Uuid,

    /// Current status
    pub status: QueueItemStatus,

    /// Locale requested for this snap
    pub locale: String,

    /// Captured image bytes (kept for potential retry; opaque to the queue)
    pub image: Arc<Vec<u8>>,

    /// GPS coordinates at capture time, if available
    pub gps: Option<GpsFix>,

    /// Resolved snap result; populated exactly when status is `Ready`
    pub result: Option<Arc<SnapResult>>,

    /// Failure message; populated exactly when status is `Error`
    pub error: Option<String>,

    /// When this item was enqueued (also the natural sort key)
    pub created_at: DateTime<Utc>,

    /// Display name of the identified landmark, derived from `result`
    pub landmark_name: Option<String>,
}

impl QueueItem {
    /// Create a fresh pending item.
    pub fn new(image: Arc<Vec<u8>>, locale: impl Into<String>, gps: Option<GpsFix>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: QueueItemStatus::Pending,
            locale: locale.into(),
            image,
            gps,
            result: None,
            error: None,
            created_at: Utc::now(),
            landmark_name: None,
        }
    }

    /// True when this item can be played: snap resolved and the result
    /// carries narration audio.
    pub fn is_playable(&self) -> bool {
        self.status == QueueItemStatus::Ready
            && self.result.as_ref().map(|r| r.has_audio()).unwrap_or(false)
    }
}

/// Mutations the queue accepts.
#[derive(Debug, Clone)]
pub enum QueueAction {
    /// Append an item to the end of the queue
    Enqueue(QueueItem),

    /// Transition an item to a new status, with the payload the terminal
    /// statuses require
    UpdateStatus {
        id: Uuid,
        status: QueueItemStatus,
        result: Option<Arc<SnapResult>>,
        error: Option<String>,
    },

    /// Drop a single item
    Remove(Uuid),

    /// Drop everything
    Clear,
}

/// Derived per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub ready: usize,
    pub error: usize,
}

/// The ordered snap queue. Insertion order is significant: dispatch and
/// default playback order both follow it.
#[derive(Debug, Clone, Default)]
pub struct SnapQueue {
    items: Vec<Arc<QueueItem>>,
}

impl SnapQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action. Returns `true` when the collection changed.
    pub fn apply(&mut self, action: QueueAction) -> bool {
        match action {
            QueueAction::Enqueue(item) => {
                self.items.push(Arc::new(item));
                true
            }

            QueueAction::UpdateStatus {
                id,
                status,
                result,
                error,
            } => self.update_status(id, status, result, error),

            QueueAction::Remove(id) => {
                let before = self.items.len();
                self.items.retain(|item| item.id != id);
                self.items.len() != before
            }

            QueueAction::Clear => {
                let was_empty = self.items.is_empty();
                self.items.clear();
                !was_empty
            }
        }
    }

    fn update_status(
        &mut self,
        id: Uuid,
        status: QueueItemStatus,
        result: Option<Arc<SnapResult>>,
        error: Option<String>,
    ) -> bool {
        // Terminal statuses require their payload; refusing here keeps the
        // invariant that Ready always has a result and Error a message.
        if status == QueueItemStatus::Ready && result.is_none() {
            tracing::warn!(%id, "ignoring ready transition without a result");
            return false;
        }
        if status == QueueItemStatus::Error && error.is_none() {
            tracing::warn!(%id, "ignoring error transition without a message");
            return false;
        }

        let Some(slot) = self.items.iter_mut().find(|item| item.id == id) else {
            // Expected race: the item was removed while its snap was in flight.
            tracing::debug!(%id, "status update for unknown item, ignoring");
            return false;
        };

        let mut updated = (**slot).clone();
        updated.status = status;

        if status == QueueItemStatus::Ready {
            let result = result.expect("checked above");
            updated.landmark_name = result.primary_landmark_name().map(str::to_owned);
            updated.result = Some(result);
        }
        if status == QueueItemStatus::Error {
            updated.error = error;
        }

        *slot = Arc::new(updated);
        true
    }

    /// All items in insertion order.
    pub fn items(&self) -> &[Arc<QueueItem>] {
        &self.items
    }

    /// Look up a single item by id.
    pub fn get(&self, id: Uuid) -> Option<Arc<QueueItem>> {
        self.items.iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Recompute per-status counts from the current collection.
    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            total: self.items.len(),
            ..Default::default()
        };
        for item in &self.items {
            match item.status {
                QueueItemStatus::Pending => counts.pending += 1,
                QueueItemStatus::Processing => counts.processing += 1,
                QueueItemStatus::Ready => counts.ready += 1,
                QueueItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioRef, LandmarkReport, SnapResult};

    fn sample_result(name: &str) -> Arc<SnapResult> {
        Arc::new(SnapResult {
            landmark: LandmarkReport {
                landmarks: vec![crate::domain::Landmark {
                    name: name.to_string(),
                    confidence: 0.9,
                    location: crate::domain::snap::LandmarkLocation {
                        city: None,
                        country: None,
                    },
                    category: "monument".to_string(),
                    brief_description: String::new(),
                }],
                needs_clarification: false,
                clarification_message: None,
            },
            guide: None,
            cached: false,
            audio: Some(AudioRef {
                audio_id: "aud".to_string(),
                url: "/audio/aud.mp3".to_string(),
                cached: false,
                voice: "nova".to_string(),
            }),
        })
    }

    fn enqueue_one(queue: &mut SnapQueue) -> Uuid {
        let item = QueueItem::new(Arc::new(vec![1, 2, 3]), "en", None);
        let id = item.id;
        queue.apply(QueueAction::Enqueue(item));
        id
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let mut queue = SnapQueue::new();
        let ids: Vec<Uuid> = (0..5).map(|_| enqueue_one(&mut queue)).collect();

        let stored: Vec<Uuid> = queue.items().iter().map(|i| i.id).collect();
        assert_eq!(stored, ids);
        assert_eq!(queue.counts().total, queue.len());
        assert_eq!(queue.counts().pending, 5);
    }

    #[test]
    fn test_ready_sets_result_and_derived_name() {
        let mut queue = SnapQueue::new();
        let id = enqueue_one(&mut queue);

        let changed = queue.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Ready,
            result: Some(sample_result("Eiffel Tower")),
            error: None,
        });
        assert!(changed);

        let item = queue.get(id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Ready);
        assert!(item.result.is_some());
        assert!(item.error.is_none());
        assert_eq!(item.landmark_name.as_deref(), Some("Eiffel Tower"));
    }

    #[test]
    fn test_error_sets_message_and_no_result() {
        let mut queue = SnapQueue::new();
        let id = enqueue_one(&mut queue);

        queue.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Error,
            result: None,
            error: Some("provider timeout".to_string()),
        });

        let item = queue.get(id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Error);
        assert!(item.result.is_none());
        assert_eq!(item.error.as_deref(), Some("provider timeout"));
    }

    #[test]
    fn test_update_leaves_other_items_untouched() {
        let mut queue = SnapQueue::new();
        let first = enqueue_one(&mut queue);
        let second = enqueue_one(&mut queue);

        let first_before = queue.get(first).unwrap();

        queue.apply(QueueAction::UpdateStatus {
            id: second,
            status: QueueItemStatus::Processing,
            result: None,
            error: None,
        });

        // Structural sharing: the untouched item keeps its exact Arc.
        let first_after = queue.get(first).unwrap();
        assert!(Arc::ptr_eq(&first_before, &first_after));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut queue = SnapQueue::new();
        enqueue_one(&mut queue);

        let changed = queue.apply(QueueAction::UpdateStatus {
            id: Uuid::new_v4(),
            status: QueueItemStatus::Processing,
            result: None,
            error: None,
        });

        assert!(!changed);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.counts().pending, 1);
    }

    #[test]
    fn test_ready_without_result_is_rejected() {
        let mut queue = SnapQueue::new();
        let id = enqueue_one(&mut queue);

        let changed = queue.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Ready,
            result: None,
            error: None,
        });

        assert!(!changed);
        let item = queue.get(id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Pending);
        assert!(item.result.is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut queue = SnapQueue::new();
        let id = enqueue_one(&mut queue);
        enqueue_one(&mut queue);

        assert!(queue.apply(QueueAction::Remove(id)));
        assert_eq!(queue.len(), 1);
        assert!(queue.get(id).is_none());

        // Removing again is a no-op
        assert!(!queue.apply(QueueAction::Remove(id)));

        assert!(queue.apply(QueueAction::Clear));
        assert!(queue.is_empty());
        assert_eq!(queue.counts(), QueueCounts::default());
    }

    #[test]
    fn test_counts_sum_to_total() {
        let mut queue = SnapQueue::new();
        let a = enqueue_one(&mut queue);
        let b = enqueue_one(&mut queue);
        enqueue_one(&mut queue);

        queue.apply(QueueAction::UpdateStatus {
            id: a,
            status: QueueItemStatus::Processing,
            result: None,
            error: None,
        });
        queue.apply(QueueAction::UpdateStatus {
            id: b,
            status: QueueItemStatus::Error,
            result: None,
            error: Some("boom".to_string()),
        });

        let counts = queue.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(
            counts.pending + counts.processing + counts.ready + counts.error,
            counts.total
        );
    }

    #[test]
    fn test_playable_requires_ready_and_audio() {
        let mut queue = SnapQueue::new();
        let id = enqueue_one(&mut queue);
        assert!(!queue.get(id).unwrap().is_playable());

        let mut silent = (*sample_result("Arc de Triomphe")).clone();
        silent.audio = None;
        queue.apply(QueueAction::UpdateStatus {
            id,
            status: QueueItemStatus::Ready,
            result: Some(Arc::new(silent)),
            error: None,
        });
        assert!(!queue.get(id).unwrap().is_playable());

        let with_audio = enqueue_one(&mut queue);
        queue.apply(QueueAction::UpdateStatus {
            id: with_audio,
            status: QueueItemStatus::Ready,
            result: Some(sample_result("Louvre")),
            error: None,
        });
        assert!(queue.get(with_audio).unwrap().is_playable());
    }
}
