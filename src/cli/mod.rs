//! Command-line interface for tourcast.
//!
//! Provides commands for snapping photos through the backend, running a
//! guided tour over a drop folder, and inspecting configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{HttpSnapClient, ProcessAudioOutput, ProcessSpeech};
use crate::capture::PhotoWatcher;
use crate::config::{self, ResolvedConfig};
use crate::dispatch::Dispatcher;
use crate::domain::GpsFix;
use crate::player::{PlaybackPhase, PlaylistPlayer};
use crate::queue::{QueueHandle, QueueItemStatus};

/// tourcast - snap landmarks, hear the tour
#[derive(Parser, Debug)]
#[command(name = "tourcast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify photos and fetch their guides, then exit
    Snap {
        /// Image files to process
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Locale for guide and narration content
        #[arg(short, long)]
        locale: Option<String>,

        /// GPS fix as "lat,lng", attached to every image
        #[arg(long)]
        gps: Option<String>,
    },

    /// Play narrated guides for a folder of photos
    Tour {
        /// Photo folder (defaults to the configured drop folder)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Keep watching the folder for new photos
        #[arg(short, long)]
        watch: bool,

        /// Locale for guide and narration content
        #[arg(short, long)]
        locale: Option<String>,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = config::load()?;
        match self.command {
            Commands::Snap {
                images,
                locale,
                gps,
            } => execute_snap(config, images, locale, gps).await,
            Commands::Tour { dir, watch, locale } => {
                execute_tour(config, dir, watch, locale).await
            }
            Commands::Config => execute_config(config),
        }
    }
}

fn parse_gps(raw: &str) -> Result<GpsFix> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected \"lat,lng\", got {raw:?}"))?;
    Ok(GpsFix {
        lat: lat.trim().parse().context("invalid latitude")?,
        lng: lng.trim().parse().context("invalid longitude")?,
    })
}

fn build_dispatcher(config: &ResolvedConfig) -> Result<(QueueHandle, Dispatcher)> {
    let queue = QueueHandle::new();
    let service = HttpSnapClient::new(&config.api_url, config.api_token.clone())?;
    let dispatcher = Dispatcher::new(queue.clone(), Arc::new(service), config.max_in_flight);
    Ok((queue, dispatcher))
}

/// Dispatch every image, wait for the queue to settle, print results.
async fn execute_snap(
    config: ResolvedConfig,
    images: Vec<PathBuf>,
    locale: Option<String>,
    gps: Option<String>,
) -> Result<()> {
    let locale = locale.unwrap_or_else(|| config.capture.locale.clone());
    let gps = gps.as_deref().map(parse_gps).transpose()?;
    let (queue, dispatcher) = build_dispatcher(&config)?;

    for path in &images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let id = dispatcher.dispatch(Arc::new(bytes), locale.clone(), gps);
        println!("📤 {} → {}", path.display(), &id.to_string()[..8]);
    }

    // Wait for every dispatched snap to settle
    let mut changes = queue.subscribe();
    while !queue.is_settled() {
        changes.changed().await.ok();
    }

    println!();
    println!("Snap Results:");
    for item in queue.items() {
        let short_id = &item.id.to_string()[..8];
        match item.status {
            QueueItemStatus::Ready => {
                let name = item.landmark_name.as_deref().unwrap_or("(unidentified)");
                let narrated = item
                    .result
                    .as_ref()
                    .map(|r| r.has_audio())
                    .unwrap_or(false);
                let audio = if narrated { "🔊" } else { "  " };
                println!("  [DONE] {} {} {}", short_id, audio, name);
            }
            QueueItemStatus::Error => {
                let message = item.error.as_deref().unwrap_or("unknown error");
                println!("  [FAIL] {}    {}", short_id, message);
            }
            // Settled queue has no pending or processing items
            _ => {}
        }
    }

    let counts = queue.counts();
    println!();
    println!("  Ready: {}  Failed: {}  Total: {}", counts.ready, counts.error, counts.total);

    Ok(())
}

/// Scan (and optionally watch) a photo folder while playing its guides.
async fn execute_tour(
    config: ResolvedConfig,
    dir: Option<PathBuf>,
    watch: bool,
    locale: Option<String>,
) -> Result<()> {
    let mut capture_config = config.capture.clone();
    if let Some(dir) = dir {
        capture_config.watch_path = dir;
    }
    if let Some(locale) = locale {
        capture_config.locale = locale;
    }

    let (queue, dispatcher) = build_dispatcher(&config)?;
    let speech = Arc::new(ProcessSpeech::detect().await?);
    let audio = Arc::new(ProcessAudioOutput::detect().await?);
    let player = PlaylistPlayer::new(queue.clone(), speech, audio, config.player.clone());

    let watcher = PhotoWatcher::new(capture_config.clone());
    println!("📂 Scanning: {}", capture_config.watch_path.display());
    let scan = watcher.scan_once(&dispatcher).await?;
    println!(
        "   {} photo(s) dispatched, {} duplicate(s) skipped",
        scan.dispatched, scan.duplicates
    );

    let watch_handle = if watch {
        let (mut events, handle) = watcher.watch(dispatcher.clone()).await?;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                println!(
                    "📥 New photo: {} ({})",
                    event.path.file_name().unwrap_or_default().to_string_lossy(),
                    &event.hash[..8]
                );
            }
        });
        Some(handle)
    } else {
        None
    };

    let autoplay = player.spawn_autoplay();

    println!();
    println!("🎧 Tour running. Commands: [n]ext [b]ack [p]ause/resume [s]top, Ctrl+C to quit");
    println!();

    let (ctrlc_tx, mut ctrlc_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = ctrlc_tx.send(());
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut player_changes = player.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line?.as_deref().map(str::trim) {
                    Some("n") => player.skip_next().await,
                    Some("b") => player.skip_prev().await,
                    Some("p") => {
                        if player.state().phase == PlaybackPhase::Paused {
                            player.play().await;
                        } else {
                            player.pause().await;
                        }
                    }
                    Some("s") => player.stop().await,
                    Some("") | Some("play") => player.play().await,
                    Some(other) => println!("   unknown command: {other:?}"),
                    None => break,
                }
            }
            _ = player_changes.changed() => {
                print_now_playing(&queue, &player);
            }
            _ = &mut ctrlc_rx => {
                println!();
                println!("🛑 Stopping tour...");
                break;
            }
        }
    }

    autoplay.abort();
    player.stop().await;
    if let Some(handle) = watch_handle {
        handle.stop().await?;
    }

    Ok(())
}

fn print_now_playing(queue: &QueueHandle, player: &PlaylistPlayer) {
    let state = player.state();
    match state.phase {
        PlaybackPhase::Intro | PlaybackPhase::Narration => {
            let name = state
                .current_item_id
                .and_then(|id| queue.get(id))
                .and_then(|item| item.landmark_name.clone())
                .unwrap_or_else(|| "landmark".to_string());
            let phase = if state.phase == PlaybackPhase::Intro {
                "intro"
            } else {
                "narration"
            };
            println!("▶️  {} ({})", name, phase);
        }
        PlaybackPhase::Paused => println!("⏸️  paused"),
        PlaybackPhase::Idle => {}
    }
}

fn execute_config(config: ResolvedConfig) -> Result<()> {
    println!();
    println!("tourcast configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file:     {}", path.display()),
        None => println!("Config file:     (none, using defaults)"),
    }
    println!("API URL:         {}", config.api_url);
    println!(
        "API token:       {}",
        if config.api_token.is_some() { "set" } else { "not set" }
    );
    println!("Concurrency:     {}", config.max_in_flight);
    println!("Intro timeout:   {:?}", config.player.intro_timeout);
    println!("Intro language:  {}", config.player.intro_language);
    println!("Drop folder:     {}", config.capture.watch_path.display());
    println!("Extensions:      {}", config.capture.extensions.join(", "));
    println!();

    if !config.capture.watch_path.exists() {
        println!("⚠️  Drop folder does not exist yet.");
    } else {
        println!("✓ Drop folder exists");
    }

    Ok(())
}
