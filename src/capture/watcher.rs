//! Photo drop-folder watcher.
//!
//! Watches a directory for new image files and dispatches them once they
//! are stable (fully written or synced). Duplicate photos are skipped by
//! content hash for the lifetime of the watcher.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::domain::GpsFix;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the photo watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Directory to watch for new photos
    pub watch_path: PathBuf,

    /// How long a file must be stable before dispatching (seconds)
    pub stability_delay_secs: u64,

    /// File extensions to pick up
    pub extensions: Vec<String>,

    /// Locale to request guides and narration in
    pub locale: String,

    /// GPS fix to attach to every dispatched photo, when known
    pub gps: Option<GpsFix>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_path: Self::default_capture_path(),
            stability_delay_secs: 2,
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            locale: "en".to_string(),
            gps: None,
        }
    }
}

impl WatcherConfig {
    /// Default drop folder under the home directory
    pub fn default_capture_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join("Pictures/tourcast")
    }

    /// Check if the watch path exists
    pub fn validate(&self) -> Result<(), WatcherError> {
        if !self.watch_path.exists() {
            return Err(WatcherError::DirectoryNotFound(self.watch_path.clone()));
        }
        Ok(())
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// Event emitted when a photo is dispatched into the queue
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    /// Path of the source image
    pub path: PathBuf,

    /// Queue item the photo was dispatched as
    pub item_id: Uuid,

    /// SHA256 content hash (12 chars)
    pub hash: String,

    /// Image size in bytes
    pub size: u64,

    /// When the photo was picked up
    pub detected_at: DateTime<Utc>,
}

/// Result of a one-shot directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub dispatched: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// Drop-folder watcher with stability checking and content dedupe
pub struct PhotoWatcher {
    config: WatcherConfig,
}

impl PhotoWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Scan the directory once and dispatch every image already present.
    pub async fn scan_once(&self, dispatcher: &Dispatcher) -> Result<ScanResult> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        let mut result = ScanResult::default();

        let mut entries = tokio::fs::read_dir(&self.config.watch_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !self.config.matches_extension(&path) {
                continue;
            }
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() || metadata.len() == 0 {
                continue;
            }

            match dispatch_photo(&self.config, dispatcher, &mut seen, &path).await {
                Ok(Some(_)) => result.dispatched += 1,
                Ok(None) => result.duplicates += 1,
                Err(e) => {
                    tracing::warn!("Failed to dispatch {}: {}", path.display(), e);
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }

    /// Watch the directory and dispatch new stable images until stopped.
    pub async fn watch(
        &self,
        dispatcher: Dispatcher,
    ) -> Result<(mpsc::Receiver<CaptureEvent>, WatchHandle)> {
        self.config.validate()?;

        let (event_tx, event_rx) = mpsc::channel::<CaptureEvent>(100);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = run_watcher(config, dispatcher, event_tx, &mut stop_rx).await {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((
            event_rx,
            WatchHandle {
                stop_tx,
                task: handle,
            },
        ))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Short content hash used for dedupe and logging.
pub async fn compute_photo_hash(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest)[..12].to_string())
}

/// Read, hash, dedupe, dispatch. `Ok(None)` means a duplicate was skipped.
async fn dispatch_photo(
    config: &WatcherConfig,
    dispatcher: &Dispatcher,
    seen: &mut HashSet<String>,
    path: &Path,
) -> Result<Option<CaptureEvent>> {
    let bytes = tokio::fs::read(path).await?;
    let digest = Sha256::digest(&bytes);
    let hash = format!("{:x}", digest)[..12].to_string();

    if !seen.insert(hash.clone()) {
        tracing::debug!("Duplicate photo skipped: {}", path.display());
        return Ok(None);
    }

    let size = bytes.len() as u64;
    let item_id = dispatcher.dispatch(Arc::new(bytes), config.locale.clone(), config.gps);
    tracing::info!("Photo dispatched: {} ({}) as {}", path.display(), hash, item_id);

    Ok(Some(CaptureEvent {
        path: path.to_path_buf(),
        item_id,
        hash,
        size,
        detected_at: Utc::now(),
    }))
}

/// Internal watcher loop
async fn run_watcher(
    config: WatcherConfig,
    dispatcher: Dispatcher,
    event_tx: mpsc::Sender<CaptureEvent>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    // Files being stabilized (path -> (size, last_seen))
    let mut pending: HashMap<PathBuf, (u64, Instant)> = HashMap::new();
    let mut seen = HashSet::new();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&config.watch_path, RecursiveMode::NonRecursive)?;

    let stability_delay = Duration::from_secs(config.stability_delay_secs);

    tracing::info!("Watching {} for photos", config.watch_path.display());

    loop {
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let path = event.path;
                    if !config.matches_extension(&path) {
                        continue;
                    }
                    if let Ok(metadata) = std::fs::metadata(&path) {
                        if metadata.is_file() {
                            pending.insert(path, (metadata.len(), Instant::now()));
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }

        // Collect files whose size held steady for the full delay
        let now = Instant::now();
        let mut stable = Vec::new();
        let mut changed = Vec::new();

        for (path, (last_size, last_seen)) in pending.iter() {
            if now.duration_since(*last_seen) < stability_delay {
                continue;
            }
            if let Ok(metadata) = std::fs::metadata(path) {
                let current = metadata.len();
                if current == *last_size && current > 0 {
                    stable.push(path.clone());
                } else {
                    changed.push((path.clone(), current));
                }
            }
        }

        for (path, size) in changed {
            pending.insert(path, (size, Instant::now()));
        }

        for path in stable {
            pending.remove(&path);
            match dispatch_photo(&config, &dispatcher, &mut seen, &path).await {
                Ok(Some(event)) => {
                    let _ = event_tx.send(event).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to dispatch {}: {}", path.display(), e);
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SnapService;
    use crate::domain::{LandmarkReport, SnapResult};
    use crate::queue::QueueHandle;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoopService;

    #[async_trait]
    impl SnapService for NoopService {
        async fn snap(
            &self,
            _image: &[u8],
            _gps: Option<GpsFix>,
            _locale: &str,
        ) -> Result<SnapResult> {
            Ok(SnapResult {
                landmark: LandmarkReport {
                    landmarks: vec![],
                    needs_clarification: false,
                    clarification_message: None,
                },
                guide: None,
                cached: false,
                audio: None,
            })
        }
    }

    fn test_dispatcher() -> Dispatcher {
        Dispatcher::new(QueueHandle::new(), Arc::new(NoopService), 2)
    }

    #[test]
    fn test_default_config_extensions() {
        let config = WatcherConfig::default();
        assert!(config.extensions.contains(&"jpg".to_string()));
        assert!(config.extensions.contains(&"png".to_string()));
    }

    #[tokio::test]
    async fn test_scan_once_dispatches_images_only() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("a.jpg"), b"photo a").await.unwrap();
        tokio::fs::write(temp.path().join("b.png"), b"photo b").await.unwrap();
        tokio::fs::write(temp.path().join("notes.txt"), b"not a photo").await.unwrap();

        let config = WatcherConfig {
            watch_path: temp.path().to_path_buf(),
            ..WatcherConfig::default()
        };
        let dispatcher = test_dispatcher();

        let result = PhotoWatcher::new(config).scan_once(&dispatcher).await.unwrap();

        assert_eq!(result.dispatched, 2);
        assert_eq!(result.errors, 0);
        assert_eq!(dispatcher.queue().counts().total, 2);
    }

    #[tokio::test]
    async fn test_scan_once_skips_duplicate_content() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("a.jpg"), b"same bytes").await.unwrap();
        tokio::fs::write(temp.path().join("copy.jpg"), b"same bytes").await.unwrap();

        let config = WatcherConfig {
            watch_path: temp.path().to_path_buf(),
            ..WatcherConfig::default()
        };
        let dispatcher = test_dispatcher();

        let result = PhotoWatcher::new(config).scan_once(&dispatcher).await.unwrap();

        assert_eq!(result.dispatched, 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(dispatcher.queue().counts().total, 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let config = WatcherConfig {
            watch_path: PathBuf::from("/nonexistent/tourcast-drop"),
            ..WatcherConfig::default()
        };
        let dispatcher = test_dispatcher();

        let err = PhotoWatcher::new(config).scan_once(&dispatcher).await;
        assert!(err.is_err());
    }
}
