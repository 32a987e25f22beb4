use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sensors::SensorBackend;

pub const DEFAULT_DEVICE_URL: &str = "http://192.168.1.246";
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
pub const MIN_TIMEOUT_MS: u64 = 250;
pub const MAX_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FAST_INTERVAL_MS: u64 = 250;
pub const MIN_FAST_INTERVAL_MS: u64 = 50;
pub const MAX_FAST_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_SLOW_INTERVAL_MS: u64 = 1000;
pub const MAX_SLOW_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_GAMES_FILE: &str = "games.txt";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_LOG_BACKUPS: u32 = 2;

/// Root configuration structure. Deserialized from %APPDATA%\PcWatcher\config.toml.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The display device that receives pushes.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    /// Base URL; endpoint paths are appended to it.
    #[serde(default = "default_device_url")]
    pub url: String,
    /// Per-request timeout in milliseconds. Clamped to [250, 10000].
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DEVICE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }
}

#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    /// Presence and media poll period. Clamped to [50, 5000] ms.
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,
    /// Stats push period. Never shorter than the fast interval, at most 60 s.
    #[serde(default = "default_slow_interval_ms")]
    pub slow_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: DEFAULT_FAST_INTERVAL_MS,
            slow_interval_ms: DEFAULT_SLOW_INTERVAL_MS,
        }
    }
}

impl PollingConfig {
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.effective_fast_ms())
    }

    pub fn slow_interval(&self) -> Duration {
        let fast = self.effective_fast_ms();
        Duration::from_millis(self.slow_interval_ms.clamp(fast, MAX_SLOW_INTERVAL_MS))
    }

    fn effective_fast_ms(&self) -> u64 {
        self.fast_interval_ms
            .clamp(MIN_FAST_INTERVAL_MS, MAX_FAST_INTERVAL_MS)
    }
}

#[derive(Debug, Deserialize)]
pub struct PresenceConfig {
    /// Game allow-list. Relative paths resolve against the app data directory.
    #[serde(default = "default_games_file")]
    pub games_file: PathBuf,
    /// Treat any fullscreen foreground window as a game.
    #[serde(default = "default_true")]
    pub fullscreen_detection: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            games_file: PathBuf::from(DEFAULT_GAMES_FILE),
            fullscreen_detection: true,
        }
    }
}

impl PresenceConfig {
    pub fn games_path(&self, app_dir: &Path) -> PathBuf {
        if self.games_file.is_absolute() {
            self.games_file.clone()
        } else {
            app_dir.join(&self.games_file)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SensorsConfig {
    /// Backend order applied to every metric's fallback chain. Backends left
    /// out are never queried.
    #[serde(default = "default_priority")]
    pub priority: Vec<SensorBackend>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

impl SensorsConfig {
    /// The configured order with duplicates removed (first occurrence wins).
    pub fn effective_priority(&self) -> Vec<SensorBackend> {
        let mut seen = Vec::with_capacity(self.priority.len());
        for backend in &self.priority {
            if !seen.contains(backend) {
                seen.push(*backend);
            }
        }
        seen
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// `env_logger` filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file size that triggers rotation.
    #[serde(default = "default_log_max_bytes")]
    pub max_file_bytes: u64,
    /// Rotated files to keep (`pc_watcher.log.1` …).
    #[serde(default = "default_log_backups")]
    pub backup_count: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            max_file_bytes: DEFAULT_LOG_MAX_BYTES,
            backup_count: DEFAULT_LOG_BACKUPS,
        }
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_device_url() -> String {
    DEFAULT_DEVICE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_fast_interval_ms() -> u64 {
    DEFAULT_FAST_INTERVAL_MS
}

fn default_slow_interval_ms() -> u64 {
    DEFAULT_SLOW_INTERVAL_MS
}

fn default_games_file() -> PathBuf {
    PathBuf::from(DEFAULT_GAMES_FILE)
}

fn default_true() -> bool {
    true
}

fn default_priority() -> Vec<SensorBackend> {
    SensorBackend::DEFAULT_PRIORITY.to_vec()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_max_bytes() -> u64 {
    DEFAULT_LOG_MAX_BYTES
}

fn default_log_backups() -> u32 {
    DEFAULT_LOG_BACKUPS
}
