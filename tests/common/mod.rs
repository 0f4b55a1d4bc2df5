//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use tourcast::adapters::{AudioHandle, AudioOutput, PlaybackEnd, SnapService, SpeechSynth};
use tourcast::domain::{AudioRef, GpsFix, Landmark, LandmarkReport, SnapResult};
use tourcast::domain::snap::LandmarkLocation;

/// A snap result with one landmark and playable narration audio.
pub fn ready_result(name: &str, audio_url: &str) -> SnapResult {
    SnapResult {
        landmark: LandmarkReport {
            landmarks: vec![Landmark {
                name: name.to_string(),
                confidence: 0.9,
                location: LandmarkLocation {
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
            url: audio_url.to_string(),
            cached: false,
            voice: "nova".to_string(),
        }),
    }
}

/// Snap service whose calls park until the test releases them, so tests
/// control exactly when each backend call resolves.
pub struct TriggeredService {
    waiting: Mutex<Vec<oneshot::Sender<Result<SnapResult, String>>>>,
}

impl TriggeredService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            waiting: Mutex::new(Vec::new()),
        })
    }

    /// Number of calls currently parked inside `snap`.
    pub fn parked(&self) -> usize {
        self.waiting.lock().unwrap().len()
    }

    /// Resolve the oldest parked call.
    pub fn release_next(&self, outcome: Result<SnapResult, String>) {
        let tx = self.waiting.lock().unwrap().remove(0);
        let _ = tx.send(outcome);
    }
}

#[async_trait]
impl SnapService for TriggeredService {
    async fn snap(
        &self,
        _image: &[u8],
        _gps: Option<GpsFix>,
        _locale: &str,
    ) -> Result<SnapResult> {
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().unwrap().push(tx);
        rx.await
            .map_err(|_| anyhow!("service dropped"))?
            .map_err(|e| anyhow!(e))
    }
}

/// Speech that records utterances and returns immediately.
pub struct RecordingSpeech {
    utterances: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            utterances: Mutex::new(Vec::new()),
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynth for RecordingSpeech {
    async fn speak(&self, text: &str, _language: &str) -> Result<()> {
        self.utterances.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn stop(&self) {}
}

type EndSlot = Arc<Mutex<Option<oneshot::Sender<PlaybackEnd>>>>;

/// Audio output whose streams end when the test says so.
pub struct ScriptedAudio {
    loads: Mutex<Vec<String>>,
    active: Mutex<Vec<EndSlot>>,
}

impl ScriptedAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
        })
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    /// Let the most recently loaded stream reach its natural end.
    pub fn finish_current(&self) {
        let slot = self.active.lock().unwrap().last().unwrap().clone();
        if let Some(tx) = slot.lock().unwrap().take() {
            let _ = tx.send(PlaybackEnd::Finished);
        };
    }
}

struct ScriptedHandle {
    end: EndSlot,
}

#[async_trait]
impl AudioHandle for ScriptedHandle {
    async fn play(&mut self) -> Result<()> {
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.end.lock().unwrap().take() {
            let _ = tx.send(PlaybackEnd::Stopped);
        }
    }
}

#[async_trait]
impl AudioOutput for ScriptedAudio {
    async fn load(
        &self,
        url: &str,
    ) -> Result<(Box<dyn AudioHandle>, oneshot::Receiver<PlaybackEnd>)> {
        self.loads.lock().unwrap().push(url.to_string());
        let (tx, rx) = oneshot::channel();
        let slot: EndSlot = Arc::new(Mutex::new(Some(tx)));
        self.active.lock().unwrap().push(slot.clone());
        Ok((Box::new(ScriptedHandle { end: slot }), rx))
    }
}

/// Poll a condition until it holds or a generous deadline passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Let spawned tasks make progress without waiting on wall-clock time.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
