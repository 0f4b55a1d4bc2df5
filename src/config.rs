//! Configuration for tourcast.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TOURCAST_API_URL, TOURCAST_TOKEN, TOURCAST_CONFIG)
//! 2. Config file (~/.tourcast/config.yaml, or the path in TOURCAST_CONFIG)
//! 3. Defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::capture::WatcherConfig;
use crate::dispatch::DEFAULT_MAX_IN_FLIGHT;
use crate::player::PlayerOptions;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub player: Option<PlayerConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub dispatch: Option<DispatchConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    pub intro_timeout_secs: Option<u64>,
    pub intro_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub watch_path: Option<PathBuf>,
    pub stability_delay_secs: Option<u64>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    pub max_in_flight: Option<usize>,
}

/// Resolved configuration after file, env and defaults are merged
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Snap API base URL
    pub api_url: String,

    /// Optional bearer token for the snap API
    pub api_token: Option<String>,

    /// Snap concurrency cap
    pub max_in_flight: usize,

    /// Playlist player tunables
    pub player: PlayerOptions,

    /// Drop-folder watcher settings
    pub capture: WatcherConfig,

    /// Path of the config file that was read, if any
    pub config_file: Option<PathBuf>,
}

pub const DEFAULT_API_URL: &str = "http://localhost:8787";

/// Default config file path (~/.tourcast/config.yaml)
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".tourcast")
        .join("config.yaml")
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration, merging file, environment and defaults.
pub fn load() -> Result<ResolvedConfig> {
    let path = match std::env::var("TOURCAST_CONFIG") {
        Ok(explicit) => {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                anyhow::bail!("TOURCAST_CONFIG points to a missing file: {}", path.display());
            }
            Some(path)
        }
        Err(_) => {
            let default = default_config_path();
            default.exists().then_some(default)
        }
    };

    let file = match &path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    Ok(resolve(file, path))
}

fn resolve(file: ConfigFile, config_file: Option<PathBuf>) -> ResolvedConfig {
    let api = file.api.unwrap_or(ApiConfig {
        url: None,
        token: None,
    });
    let api_url = std::env::var("TOURCAST_API_URL")
        .ok()
        .or(api.url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_token = std::env::var("TOURCAST_TOKEN").ok().or(api.token);

    let mut player = PlayerOptions::default();
    if let Some(cfg) = file.player {
        if let Some(secs) = cfg.intro_timeout_secs {
            player.intro_timeout = Duration::from_secs(secs);
        }
        if let Some(lang) = cfg.intro_language {
            player.intro_language = lang;
        }
    }

    let mut capture = WatcherConfig::default();
    if let Some(cfg) = file.capture {
        if let Some(path) = cfg.watch_path {
            capture.watch_path = path;
        }
        if let Some(secs) = cfg.stability_delay_secs {
            capture.stability_delay_secs = secs;
        }
        if let Some(exts) = cfg.extensions {
            capture.extensions = exts;
        }
    }

    let max_in_flight = file
        .dispatch
        .and_then(|cfg| cfg.max_in_flight)
        .unwrap_or(DEFAULT_MAX_IN_FLIGHT);

    ResolvedConfig {
        api_url,
        api_token,
        max_in_flight,
        player,
        capture,
        config_file,
    }
}
