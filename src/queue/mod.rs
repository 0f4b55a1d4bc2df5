//! The snap queue: one entry per captured photo, progressing through
//! `pending → processing → ready | error`.
//!
//! The queue is split in two layers:
//!
//! 1. **`state`**: a pure reducer over an ordered item collection. No I/O,
//!    no locking — fully unit-testable.
//! 2. **`handle`**: shared ownership plus a change-notification channel, so
//!    the dispatcher and the playlist player can observe mutations without
//!    polling.
//!
//! Items are held behind `Arc` so a status update replaces exactly one
//! entry; every other item keeps its identity across mutations.

pub mod handle;
pub mod state;

pub use handle::QueueHandle;
pub use state::{QueueAction, QueueCounts, QueueItem, QueueItemStatus, SnapQueue};
