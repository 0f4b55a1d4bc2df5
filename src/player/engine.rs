//! Playlist player engine.
//!
//! Drives the pure state machine against the speech and audio adapters.
//! Flow per item:
//!
//! 1. Speak the intro ("Next up: <landmark>") through the local TTS,
//!    bounded by a timeout — the TTS is best-effort and may hang.
//! 2. Load and play the server narration audio to its natural end.
//! 3. Go idle; the autoplay loop picks the next ready item in queue order.
//!
//! Playback is an exclusive resource: starting an item always stops the
//! previous stream first. A guard flag prevents a re-entrant start when
//! the autoplay loop and a manual control race, and a playback epoch lets
//! superseded phase tasks abandon without firing stale transitions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::{AudioHandle, AudioOutput, PlaybackEnd, SpeechSynth};
use crate::queue::{QueueHandle, QueueItem};

use super::state::{
    find_next_playable, find_prev_playable, PlaybackPhase, PlayerAction, PlayerState,
};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Upper bound on the intro phase; narration starts when it elapses
    /// even if the TTS never reports completion
    pub intro_timeout: Duration,

    /// Language the intro is spoken in (narration audio carries its own
    /// locale)
    pub intro_language: String,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            intro_timeout: Duration::from_secs(4),
            intro_language: "en".to_string(),
        }
    }
}

/// Sequential playlist player over the snap queue.
#[derive(Clone)]
pub struct PlaylistPlayer {
    inner: Arc<Inner>,
}

struct Inner {
    queue: QueueHandle,
    speech: Arc<dyn SpeechSynth>,
    audio: Arc<dyn AudioOutput>,
    options: PlayerOptions,

    state: Mutex<PlayerState>,
    revision: watch::Sender<u64>,

    /// Control half of the active narration stream
    current: AsyncMutex<Option<Box<dyn AudioHandle>>>,

    /// True while a `play_item` is between start and narration-started
    starting: AtomicBool,

    /// Bumped whenever playback is torn down or restarted; phase tasks
    /// from an older epoch abandon silently
    epoch: AtomicU64,
}

impl PlaylistPlayer {
    pub fn new(
        queue: QueueHandle,
        speech: Arc<dyn SpeechSynth>,
        audio: Arc<dyn AudioOutput>,
        options: PlayerOptions,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                queue,
                speech,
                audio,
                options,
                state: Mutex::new(PlayerState::default()),
                revision,
                current: AsyncMutex::new(None),
                starting: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlayerState {
        self.inner.state.lock().expect("player lock poisoned").clone()
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Whether a forward skip would find something right now.
    pub fn has_next(&self) -> bool {
        let anchor = self.state().current_item_id;
        find_next_playable(&self.inner.queue.items(), anchor, &[]).is_some()
    }

    /// Whether a backward skip would find something right now.
    pub fn has_prev(&self) -> bool {
        let anchor = self.state().current_item_id;
        find_prev_playable(&self.inner.queue.items(), anchor).is_some()
    }

    fn apply(&self, action: PlayerAction) -> bool {
        let changed = self
            .inner
            .state
            .lock()
            .expect("player lock poisoned")
            .apply(action);
        if changed {
            self.inner.revision.send_modify(|rev| *rev += 1);
        }
        changed
    }

    fn stale(&self, epoch: u64) -> bool {
        self.inner.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Stop whatever is playing and invalidate in-flight phase tasks.
    async fn teardown_playback(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(mut handle) = self.inner.current.lock().await.take() {
            handle.stop().await;
        }
        self.inner.speech.stop().await;
    }

    /// Claim the start guard and run `play_item` in its own task.
    fn spawn_play(&self, item: Arc<QueueItem>) {
        if !item.is_playable() {
            return;
        }
        if self.inner.starting.swap(true, Ordering::SeqCst) {
            // A start is already in progress; autoplay will re-fire if
            // it turns out to be needed.
            return;
        }
        let player = self.clone();
        tokio::spawn(async move {
            player.play_item(item).await;
        });
    }

    /// Two-phase playback of one item. Assumes the start guard is held.
    async fn play_item(&self, item: Arc<QueueItem>) {
        self.teardown_playback().await;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        self.apply(PlayerAction::PlayItem(item.id));

        // Phase 1: local intro, best-effort and time-bounded.
        let name = item.landmark_name.as_deref().unwrap_or("landmark");
        let intro = format!("Next up: {}", name);
        let spoken = tokio::time::timeout(
            self.inner.options.intro_timeout,
            self.inner.speech.speak(&intro, &self.inner.options.intro_language),
        )
        .await;
        match spoken {
            Ok(Err(e)) => debug!(error = %e, "intro speech failed, continuing"),
            Err(_) => debug!("intro speech timed out, continuing"),
            Ok(Ok(())) => {}
        }

        if self.stale(epoch) {
            return;
        }
        self.apply(PlayerAction::IntroFinished);

        // Phase 2: server narration.
        let Some(url) = item.result.as_ref().and_then(|r| r.audio_url()) else {
            // Playability was checked at spawn; a vanished URL means the
            // item changed under us.
            self.inner.starting.store(false, Ordering::SeqCst);
            self.apply(PlayerAction::NarrationFinished);
            return;
        };

        let loaded = self.inner.audio.load(url).await;
        let done = match loaded {
            Ok((handle, done)) => {
                if self.stale(epoch) {
                    let mut handle = handle;
                    handle.stop().await;
                    return;
                }
                *self.inner.current.lock().await = Some(handle);
                self.apply(PlayerAction::NarrationStarted);
                self.inner.starting.store(false, Ordering::SeqCst);
                done
            }
            Err(e) => {
                warn!(id = %item.id, error = %e, "failed to play narration");
                self.inner.starting.store(false, Ordering::SeqCst);
                if !self.stale(epoch) {
                    // Keep the playlist moving past the bad audio.
                    self.apply(PlayerAction::NarrationFinished);
                }
                return;
            }
        };

        match done.await {
            Ok(PlaybackEnd::Finished) => {
                if !self.stale(epoch) {
                    self.apply(PlayerAction::NarrationFinished);
                }
            }
            Ok(PlaybackEnd::Failed(e)) => {
                warn!(id = %item.id, error = %e, "narration playback failed");
                if !self.stale(epoch) {
                    self.apply(PlayerAction::NarrationFinished);
                }
            }
            // Stopped (or the sender dropped): state was already driven
            // by whoever stopped us.
            Ok(PlaybackEnd::Stopped) | Err(_) => {}
        }
    }

    /// Resume if paused; otherwise start from the first unplayed ready
    /// item. No-op outside those two situations.
    pub async fn play(&self) {
        let snapshot = self.state();

        if snapshot.phase == PlaybackPhase::Paused {
            if let Some(handle) = self.inner.current.lock().await.as_mut() {
                if let Err(e) = handle.play().await {
                    warn!(error = %e, "resume failed");
                }
            }
            self.apply(PlayerAction::Resume);
            return;
        }

        if snapshot.phase != PlaybackPhase::Idle {
            return;
        }

        let items = self.inner.queue.items();
        if let Some(item) = find_next_playable(&items, None, &snapshot.played_item_ids) {
            // Explicit play overrides a stuck start.
            self.inner.starting.store(false, Ordering::SeqCst);
            self.spawn_play(item);
        }
    }

    /// Pause the narration. No effect in any other phase.
    pub async fn pause(&self) {
        if self.state().phase != PlaybackPhase::Narration {
            return;
        }
        if let Some(handle) = self.inner.current.lock().await.as_mut() {
            if let Err(e) = handle.pause().await {
                warn!(error = %e, "pause failed");
            }
        }
        self.apply(PlayerAction::Pause);
    }

    /// Jump to the next ready item after the current one, replaying
    /// already-played items if they are next in line. Stops when nothing
    /// is left forward.
    pub async fn skip_next(&self) {
        let anchor = self.state().current_item_id;
        let items = self.inner.queue.items();

        if let Some(item) = find_next_playable(&items, anchor, &[]) {
            self.inner.starting.store(false, Ordering::SeqCst);
            self.spawn_play(item);
        } else {
            self.stop().await;
        }
    }

    /// Jump back to the closest earlier ready item (always a replay).
    pub async fn skip_prev(&self) {
        let anchor = self.state().current_item_id;
        let items = self.inner.queue.items();

        if let Some(item) = find_prev_playable(&items, anchor) {
            self.inner.starting.store(false, Ordering::SeqCst);
            self.spawn_play(item);
        }
    }

    /// Stop playback entirely and suppress autoplay until the next
    /// explicit play.
    pub async fn stop(&self) {
        self.inner.starting.store(false, Ordering::SeqCst);
        self.teardown_playback().await;
        self.apply(PlayerAction::Stop);
    }

    /// Stop and wipe all player state, including play history.
    pub async fn reset(&self) {
        self.inner.starting.store(false, Ordering::SeqCst);
        self.teardown_playback().await;
        self.apply(PlayerAction::Reset);
    }

    /// One idempotent pass of the reactive logic: detect removal of the
    /// current item, then start the next unplayed ready item if the
    /// player is idle and autoplay is not suppressed.
    async fn evaluate(&self) {
        let items = self.inner.queue.items();

        let snapshot = self.state();
        if let Some(current) = snapshot.current_item_id {
            if !items.iter().any(|item| item.id == current) {
                debug!(id = %current, "current item removed from queue");
                self.teardown_playback().await;
                self.inner.starting.store(false, Ordering::SeqCst);
                self.apply(PlayerAction::ItemRemoved(current));
            }
        }

        let snapshot = self.state();
        if snapshot.phase != PlaybackPhase::Idle
            || snapshot.stopped_by_user
            || self.inner.starting.load(Ordering::SeqCst)
        {
            return;
        }

        if let Some(item) =
            find_next_playable(&items, snapshot.last_played(), &snapshot.played_item_ids)
        {
            debug!(id = %item.id, "autoplay starting next item");
            self.spawn_play(item);
        }
    }

    /// Run the autoplay loop: re-evaluate after every queue mutation and
    /// every player transition. Runs until the returned handle is
    /// aborted.
    pub fn spawn_autoplay(&self) -> JoinHandle<()> {
        let player = self.clone();
        let mut queue_rx = player.inner.queue.subscribe();
        let mut player_rx = player.inner.revision.subscribe();

        tokio::spawn(async move {
            loop {
                player.evaluate().await;
                tokio::select! {
                    changed = queue_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = player_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
