//! Narration playback through a system media player binary.
//!
//! Streams the narration URL with `afplay`, `mpv` or `ffplay`, whichever
//! is on PATH. Pause and resume use SIGSTOP/SIGCONT on the player
//! process, so they work uniformly across the three.

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{AudioHandle, AudioOutput, PlaybackEnd};

const CANDIDATE_BINARIES: &[&str] = &["afplay", "mpv", "ffplay"];

/// Audio output via a spawned media player process.
pub struct ProcessAudioOutput {
    binary: String,
}

impl ProcessAudioOutput {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Probe for a known player binary on PATH.
    pub async fn detect() -> Result<Self> {
        for candidate in CANDIDATE_BINARIES {
            let found = Command::new("which")
                .arg(candidate)
                .output()
                .await
                .map(|out| out.status.success())
                .unwrap_or(false);
            if found {
                debug!(binary = candidate, "using audio binary");
                return Ok(Self::new(*candidate));
            }
        }
        Err(anyhow!(
            "no audio player found (tried {})",
            CANDIDATE_BINARIES.join(", ")
        ))
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        match self.binary.as_str() {
            "mpv" => {
                cmd.args(["--no-video", "--really-quiet"]);
            }
            "ffplay" => {
                cmd.args(["-nodisp", "-autoexit", "-loglevel", "quiet"]);
            }
            _ => {}
        }
        cmd.arg(url);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AudioOutput for ProcessAudioOutput {
    async fn load(
        &self,
        url: &str,
    ) -> Result<(Box<dyn AudioHandle>, oneshot::Receiver<PlaybackEnd>)> {
        let mut child = self
            .command(url)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("{} exited before startup", self.binary))?;
        debug!(binary = %self.binary, pid, %url, "playback started");

        let (end_tx, end_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        // The waiter owns the child; the handle reaches it via signals.
        tokio::spawn(async move {
            let end = wait_for_end(&mut child, kill_rx).await;
            let _ = end_tx.send(end);
        });

        Ok((
            Box::new(ProcessAudioHandle {
                pid,
                kill: Some(kill_tx),
            }),
            end_rx,
        ))
    }
}

async fn wait_for_end(child: &mut Child, kill_rx: oneshot::Receiver<()>) -> PlaybackEnd {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => PlaybackEnd::Finished,
            Ok(status) => PlaybackEnd::Failed(format!("player exited with {status}")),
            Err(e) => PlaybackEnd::Failed(format!("player wait failed: {e}")),
        },
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill player process");
            }
            let _ = child.wait().await;
            PlaybackEnd::Stopped
        }
    }
}

struct ProcessAudioHandle {
    pid: u32,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessAudioHandle {
    async fn signal(&self, sig: &str) -> Result<()> {
        let status = Command::new("kill")
            .arg(sig)
            .arg(self.pid.to_string())
            .status()
            .await
            .context("failed to run kill")?;
        if !status.success() {
            return Err(anyhow!("kill {sig} {} failed", self.pid));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioHandle for ProcessAudioHandle {
    async fn play(&mut self) -> Result<()> {
        self.signal("-CONT").await
    }

    async fn pause(&mut self) -> Result<()> {
        self.signal("-STOP").await
    }

    async fn stop(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}
