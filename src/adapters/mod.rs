//! Adapter interfaces for external systems.
//!
//! The core never talks to the network or the audio device directly; it
//! consumes these traits. Production implementations live in the sibling
//! modules, tests substitute mocks.

pub mod http;
pub mod playback;
pub mod speech;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::{GpsFix, SnapResult};

pub use http::HttpSnapClient;
pub use playback::ProcessAudioOutput;
pub use speech::ProcessSpeech;

/// The remote snap call: one photo in, one identification + guide +
/// narration out. Used exactly once per queue item, with no internal
/// retries.
#[async_trait]
pub trait SnapService: Send + Sync {
    async fn snap(
        &self,
        image: &[u8],
        gps: Option<GpsFix>,
        locale: &str,
    ) -> Result<SnapResult>;
}

/// Local best-effort text-to-speech, used for the spoken item intro.
///
/// `speak` resolves when the utterance finishes (or fails — callers treat
/// both the same and bound the call with a timeout). `stop` interrupts any
/// utterance in progress.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn speak(&self, text: &str, language: &str) -> Result<()>;

    async fn stop(&self);
}

/// How a narration playback ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Natural end of stream
    Finished,

    /// Stopped through the control handle before finishing
    Stopped,

    /// Underlying player reported an error mid-stream
    Failed(String),
}

/// Loads remote narration audio and starts playing it.
///
/// Returns the control handle and a one-shot signal that fires when
/// playback ends. A dropped signal is treated like [`PlaybackEnd::Stopped`].
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn load(
        &self,
        url: &str,
    ) -> Result<(Box<dyn AudioHandle>, oneshot::Receiver<PlaybackEnd>)>;
}

/// Control half of one active narration playback.
///
/// Playback is an exclusive resource: callers stop and drop the previous
/// handle before loading the next item.
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Resume after `pause`.
    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    /// Stop and release the stream. The end signal fires with `Stopped`.
    async fn stop(&mut self);
}
