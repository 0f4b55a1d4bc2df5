//! Sequential playlist player.
//!
//! Walks the snap queue in order and, for each ready item, speaks a short
//! local intro ("Next up: ...") and then plays the server-generated
//! narration audio, advancing automatically until the user stops it.
//!
//! The pure state machine lives in `state`; the async driver that owns the
//! speech/audio adapters and the autoplay loop lives in `engine`.

pub mod engine;
pub mod state;

pub use engine::{PlayerOptions, PlaylistPlayer};
pub use state::{
    find_next_playable, find_prev_playable, PlaybackPhase, PlayerAction, PlayerState,
};
