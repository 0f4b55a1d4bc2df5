//! Pure player state machine and playable-item selection.
//!
//! Separated from the engine so the transitions can be unit-tested without
//! any speech or audio backend.

use std::sync::Arc;

use uuid::Uuid;

use crate::queue::QueueItem;

/// Phase of the two-stage playback for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing playing
    Idle,

    /// Speaking the local intro
    Intro,

    /// Playing server narration audio
    Narration,

    /// Narration paused, resumable
    Paused,
}

/// Snapshot of the playlist player.
///
/// `current_item_id` is a reference into the queue by id, never ownership:
/// the engine re-checks existence on every queue change and falls back to
/// idle when the item disappears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Item currently playing or paused; `None` iff phase is `Idle`
    pub current_item_id: Option<Uuid>,

    /// Current playback phase
    pub phase: PlaybackPhase,

    /// Items that have completed a full narration, in completion order.
    /// Never contains duplicates.
    pub played_item_ids: Vec<Uuid>,

    /// Set by an explicit stop; suppresses autoplay until the next
    /// explicit play
    pub stopped_by_user: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current_item_id: None,
            phase: PlaybackPhase::Idle,
            played_item_ids: Vec::new(),
            stopped_by_user: false,
        }
    }
}

/// Transitions the player state machine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    /// Begin playing an item (enters the intro phase)
    PlayItem(Uuid),

    /// Idempotent confirmation that the intro began
    IntroStarted,

    /// Intro done (or skipped); move on to narration
    IntroFinished,

    /// Idempotent confirmation that narration began
    NarrationStarted,

    /// Narration reached its end; record the item as played and go idle
    NarrationFinished,

    Pause,

    Resume,

    /// Explicit user stop; suppresses autoplay
    Stop,

    /// A queue item disappeared
    ItemRemoved(Uuid),

    /// Back to the initial state
    Reset,
}

impl PlayerState {
    /// Apply one action. Returns `true` when the state changed; actions
    /// whose precondition does not hold leave the state untouched and
    /// return `false`, so callers can skip change notification.
    pub fn apply(&mut self, action: PlayerAction) -> bool {
        match action {
            PlayerAction::PlayItem(id) => {
                self.current_item_id = Some(id);
                self.phase = PlaybackPhase::Intro;
                self.stopped_by_user = false;
                true
            }

            PlayerAction::IntroStarted => false,

            PlayerAction::IntroFinished => {
                if self.phase != PlaybackPhase::Intro {
                    return false;
                }
                self.phase = PlaybackPhase::Narration;
                true
            }

            PlayerAction::NarrationStarted => false,

            PlayerAction::NarrationFinished => {
                let Some(id) = self.current_item_id.take() else {
                    if self.phase == PlaybackPhase::Idle {
                        return false;
                    }
                    self.phase = PlaybackPhase::Idle;
                    return true;
                };
                if !self.played_item_ids.contains(&id) {
                    self.played_item_ids.push(id);
                }
                self.phase = PlaybackPhase::Idle;
                true
            }

            PlayerAction::Pause => {
                if self.phase != PlaybackPhase::Narration {
                    return false;
                }
                self.phase = PlaybackPhase::Paused;
                true
            }

            PlayerAction::Resume => {
                if self.phase != PlaybackPhase::Paused {
                    return false;
                }
                self.phase = PlaybackPhase::Narration;
                true
            }

            PlayerAction::Stop => {
                self.current_item_id = None;
                self.phase = PlaybackPhase::Idle;
                self.stopped_by_user = true;
                true
            }

            PlayerAction::ItemRemoved(id) => {
                if self.current_item_id == Some(id) {
                    self.current_item_id = None;
                    self.phase = PlaybackPhase::Idle;
                    return true;
                }
                let before = self.played_item_ids.len();
                self.played_item_ids.retain(|played| *played != id);
                self.played_item_ids.len() != before
            }

            PlayerAction::Reset => {
                if *self == Self::default() {
                    return false;
                }
                *self = Self::default();
                true
            }
        }
    }

    /// The item to anchor autoplay at: the most recently played one.
    pub fn last_played(&self) -> Option<Uuid> {
        self.played_item_ids.last().copied()
    }
}

/// Scan forward through `items` starting immediately after `after` (or
/// from the front when `None`) and return the first playable item not in
/// `played`. Pending/processing/error items and ready items without audio
/// are skipped, never blocking.
pub fn find_next_playable(
    items: &[Arc<QueueItem>],
    after: Option<Uuid>,
    played: &[Uuid],
) -> Option<Arc<QueueItem>> {
    // A vanished anchor falls back to scanning from the front.
    let start = after
        .and_then(|id| items.iter().position(|item| item.id == id))
        .map(|pos| pos + 1)
        .unwrap_or(0);

    items[start.min(items.len())..]
        .iter()
        .find(|item| item.is_playable() && !played.contains(&item.id))
        .cloned()
}

/// Scan backward from (not including) `before` and return the first
/// playable item. Play history is ignored: manual "previous" always
/// allows replay.
pub fn find_prev_playable(
    items: &[Arc<QueueItem>],
    before: Option<Uuid>,
) -> Option<Arc<QueueItem>> {
    let end = match before {
        Some(id) => items.iter().position(|item| item.id == id)?,
        None => items.len(),
    };

    items[..end].iter().rev().find(|item| item.is_playable()).cloned()
}
