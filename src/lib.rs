//! tourcast - snap a landmark, hear its story
//!
//! Photos go in, narrated audio guides come out. A backend service does
//! the heavy lifting (vision, guide writing, speech synthesis); this crate
//! is the client-side pipeline around it.
//!
//! # Architecture
//!
//! The system is built around a shared in-memory queue:
//! - Every photo becomes a queue item that moves `pending → processing →
//!   ready` (or `error`) exactly once
//! - A dispatcher caps concurrent backend calls and admits work in FIFO
//!   order
//! - A playlist player walks the ready items in queue order, speaking a
//!   short intro before each narration
//!
//! # Modules
//!
//! - `queue`: Item lifecycle state machine and the shared handle
//! - `dispatch`: Bounded-concurrency background processing
//! - `player`: Sequential playlist player (state machine + async engine)
//! - `capture`: Drop-folder photo ingestion
//! - `adapters`: External system integrations (HTTP backend, TTS, audio)
//! - `domain`: Backend wire types
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Identify a photo and fetch its guide
//! tourcast snap photo.jpg --gps 48.8584,2.2945
//!
//! # Narrated tour over a folder of photos
//! tourcast tour --dir ~/Pictures/paris --watch
//! ```

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod player;
pub mod queue;

// Re-export main types at crate root for convenience
pub use dispatch::Dispatcher;
pub use domain::{GpsFix, SnapResult};
pub use player::{PlaylistPlayer, PlayerOptions, PlayerState};
pub use queue::{QueueCounts, QueueHandle, QueueItem, QueueItemStatus};

// Capture ingestion
pub use capture::{CaptureEvent, PhotoWatcher, WatcherConfig};
