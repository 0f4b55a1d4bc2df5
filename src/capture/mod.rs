//! Photo capture ingestion.
//!
//! Feeds the snap pipeline from a drop folder: any camera, phone sync or
//! screenshot tool that writes image files into the watched directory
//! becomes a capture source. The watcher waits for files to stop growing,
//! dedupes by content hash, and hands the bytes to the dispatcher.

pub mod watcher;

pub use watcher::{CaptureEvent, PhotoWatcher, ScanResult, WatcherConfig, WatcherError};
