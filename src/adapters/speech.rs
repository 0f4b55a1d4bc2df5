//! Local text-to-speech through a system TTS binary.
//!
//! The intro phrase is short and best-effort, so a shell-out to the
//! platform speech tool (`say` on macOS, `espeak-ng`/`espeak` elsewhere)
//! is enough. Callers bound the call with a timeout.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::SpeechSynth;

const CANDIDATE_BINARIES: &[&str] = &["say", "espeak-ng", "espeak"];

/// Speech synthesis via a spawned TTS process.
pub struct ProcessSpeech {
    binary: String,
    current: Mutex<Option<Child>>,
}

impl ProcessSpeech {
    /// Use an explicit TTS binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
        }
    }

    /// Probe for a known TTS binary on PATH.
    pub async fn detect() -> Result<Self> {
        for candidate in CANDIDATE_BINARIES {
            let found = Command::new("which")
                .arg(candidate)
                .output()
                .await
                .map(|out| out.status.success())
                .unwrap_or(false);
            if found {
                debug!(binary = candidate, "using speech binary");
                return Ok(Self::new(*candidate));
            }
        }
        Err(anyhow!(
            "no speech binary found (tried {})",
            CANDIDATE_BINARIES.join(", ")
        ))
    }

    fn command(&self, text: &str, language: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        // `say` selects language through the voice; the espeak family
        // takes a language code directly.
        if self.binary != "say" {
            cmd.arg("-v").arg(language);
        }
        cmd.arg(text);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechSynth for ProcessSpeech {
    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        let child = self
            .command(text, language)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;
        *self.current.lock().await = Some(child);

        // Re-take the child so a concurrent stop can steal it from us.
        loop {
            let mut guard = self.current.lock().await;
            let Some(child) = guard.as_mut() else {
                // Stolen by stop
                return Ok(());
            };
            match child.try_wait().context("speech process poll failed")? {
                Some(status) => {
                    guard.take();
                    if status.success() {
                        return Ok(());
                    }
                    return Err(anyhow!("{} exited with {status}", self.binary));
                }
                None => {
                    drop(guard);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }
    }

    async fn stop(&self) {
        if let Some(mut child) = self.current.lock().await.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill speech process");
            }
        }
    }
}
