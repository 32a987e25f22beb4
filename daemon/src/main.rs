mod config;
mod desktop;
mod device;
mod logging;
mod media;
mod paths;
mod presence;
mod sensors;
mod status;
mod watcher;

use anyhow::{Context, Result};

use crate::desktop::SystemDesktop;
use crate::device::HttpDevice;
use crate::media::{MediaTracker, SystemMedia};
use crate::presence::{GameAllowList, PresenceClassifier};
use crate::sensors::network::SysinfoTraffic;
use crate::sensors::SensorAggregator;
use crate::watcher::{Watcher, WatcherSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir()?;
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create app data directory {}", app_dir.display()))?;

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path(&app_dir);
    let (config, config_error) = match config::load_or_default(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (config::Config::default(), Some(e)),
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let log_path = paths::log_file_path(&app_dir);
    logging::init(&config.logging, &log_path)?;
    if let Some(e) = config_error {
        log::error!("Config error (using defaults): {e:#}");
    }

    log::info!("{}", "=".repeat(50));
    log::info!(
        "Session started at {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    log::info!(
        "pc-watcher v{} started - target: {}",
        env!("CARGO_PKG_VERSION"),
        config.device.url
    );

    // ── Presence ──────────────────────────────────────────────────────────────
    let games_path = config.presence.games_path(&app_dir);
    log::info!("Games file: {}", games_path.display());
    log::info!("Log file: {}", log_path.display());
    let presence = PresenceClassifier::new(
        GameAllowList::load(&games_path),
        Box::new(SystemDesktop::new()),
        config.presence.fullscreen_detection,
    );

    // ── Sensors ───────────────────────────────────────────────────────────────
    let priority = config.sensors.effective_priority();
    let sources = sensors::detect_sources(&priority);
    let aggregator = SensorAggregator::new(sources, priority, Box::new(SysinfoTraffic::new()));

    // ── Device ────────────────────────────────────────────────────────────────
    let device = HttpDevice::new(&config.device.url, config.device.timeout())
        .context("Failed to build HTTP client")?;

    let mut watcher = Watcher::new(
        presence,
        MediaTracker::new(SystemMedia),
        aggregator,
        device,
        WatcherSettings {
            fast_interval: config.polling.fast_interval(),
            slow_interval: config.polling.slow_interval(),
            status_path: Some(paths::status_file_path(&app_dir)),
        },
    );

    // ── Poll loop ─────────────────────────────────────────────────────────────
    tokio::select! {
        _ = watcher.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for Ctrl+C: {e}");
            }
        }
    }

    watcher.shutdown();
    Ok(())
}
