use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;
use crate::{Result, ShuffleError};

/// Default lavfi chain: loudness normalisation followed by a limiter, so
/// shouting/laughing peaks stay close to normal speech level.
pub const DEFAULT_AUDIO_FILTER: &str =
    "lavfi=[dynaudnorm=f=350:g=10:p=0.45:n=1],lavfi=[alimiter=limit=0.90:attack=5:release=40]";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// yt-dlp binary.  Discovered via `platform::find_yt_dlp_binary` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Pause before the per-video metadata fetch so it doesn't compete with
    /// mpv's own startup traffic.
    #[serde(default = "default_enrich_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// mpv binary.  Discovered via `platform::find_mpv_binary` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_audio_filter")]
    pub audio_filter: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_startup_attempts")]
    pub startup_attempts: u32,
    #[serde(default = "default_startup_interval_ms")]
    pub startup_interval_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// One `channel_<hash>.json` per channel lives here.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            binary: None,
            listing_timeout_secs: default_listing_timeout_secs(),
            item_timeout_secs: default_item_timeout_secs(),
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_enrich_delay_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            socket_path: default_socket_path(),
            audio_filter: default_audio_filter(),
            probe_timeout_ms: default_probe_timeout_ms(),
            startup_attempts: default_startup_attempts(),
            startup_interval_ms: default_startup_interval_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            state_file: default_state_file(),
        }
    }
}

impl FetchConfig {
    pub fn resolved_binary(&self) -> PathBuf {
        self.binary
            .clone()
            .or_else(platform::find_yt_dlp_binary)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"))
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }
}

impl PlayerConfig {
    pub fn resolved_binary(&self) -> PathBuf {
        self.binary
            .clone()
            .or_else(platform::find_mpv_binary)
            .unwrap_or_else(|| PathBuf::from("mpv"))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }
}

fn default_listing_timeout_secs() -> u64 {
    120
}

fn default_item_timeout_secs() -> u64 {
    30
}

fn default_enrich_delay_ms() -> u64 {
    2000
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(platform::MPV_SOCKET_PATH)
}

fn default_audio_filter() -> String {
    DEFAULT_AUDIO_FILTER.to_string()
}

fn default_probe_timeout_ms() -> u64 {
    200
}

fn default_startup_attempts() -> u32 {
    20
}

fn default_startup_interval_ms() -> u64 {
    200
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_health_interval_secs() -> u64 {
    2
}

fn default_cache_dir() -> PathBuf {
    platform::cache_dir().join("channels")
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("shuffle_state.json")
}

impl Config {
    /// Load `config.toml` from the config dir, writing the defaults out on
    /// first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ShuffleError::Validation(format!("invalid config {}: {}", path.display(), e))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShuffleError::persistence(path, e))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
