use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the watcher is currently doing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    /// Media and stats are pushed to the display.
    Normal,
    /// A game holds the foreground; media pushes are suspended.
    Gaming,
    /// The watcher has shut down.
    Stopped,
}

/// Runtime status written by the watcher to %APPDATA%\PcWatcher\status.toml.
/// Read-only for anything else on the machine that wants to show watcher state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherStatus {
    /// Watcher binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub mode: WatcherState,
    /// "Title - Artist" of the track last pushed to the display, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<String>,
    /// RFC 3339 timestamp of the last successful stats push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_stats_at: Option<String>,
    /// Most recent push failure; cleared by the next successful push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatcherStatus {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: WatcherState::Normal,
            now_playing: None,
            last_stats_at: None,
            error: None,
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist. Failures are logged and
/// otherwise ignored.
pub fn write_status(path: &Path, status: &WatcherStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                log::warn!("Failed to write status file: {e}");
            }
        }
        Err(e) => log::warn!("Failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── WatcherStatus::new ────────────────────────────────────────────────────

    #[test]
    fn new_starts_normal() {
        assert_eq!(WatcherStatus::new().mode, WatcherState::Normal);
    }

    #[test]
    fn new_has_no_optional_fields() {
        let s = WatcherStatus::new();
        assert!(s.now_playing.is_none());
        assert!(s.last_stats_at.is_none());
        assert!(s.error.is_none());
    }

    #[test]
    fn new_version_matches_cargo_pkg() {
        assert_eq!(WatcherStatus::new().version, env!("CARGO_PKG_VERSION"));
    }

    // ── WatcherState serialization ────────────────────────────────────────────

    #[test]
    fn mode_serializes_to_lowercase() {
        // TOML requires a root table, so verify the value via WatcherStatus.
        let mut s = WatcherStatus::new();
        for (mode, text) in [
            (WatcherState::Normal, "mode = \"normal\""),
            (WatcherState::Gaming, "mode = \"gaming\""),
            (WatcherState::Stopped, "mode = \"stopped\""),
        ] {
            s.mode = mode;
            assert!(toml::to_string_pretty(&s).unwrap().contains(text));
        }
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.toml");
        write_status(&path, &WatcherStatus::new());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = WatcherStatus::new();
        original.mode = WatcherState::Gaming;
        original.last_stats_at = Some("2026-01-01T12:00:00+00:00".to_string());

        write_status(&path, &original);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: WatcherStatus = toml::from_str(&content).unwrap();
        assert_eq!(parsed.mode, WatcherState::Gaming);
        assert_eq!(parsed.last_stats_at.as_deref(), Some("2026-01-01T12:00:00+00:00"));
        assert!(parsed.now_playing.is_none());
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &WatcherStatus::new());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("now_playing"));
        assert!(!content.contains("last_stats_at"));
        assert!(!content.contains("error"));
    }

    #[test]
    fn write_status_includes_populated_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut status = WatcherStatus::new();
        status.now_playing = Some("Teardrop - Massive Attack".to_string());
        status.error = Some("device unreachable".to_string());
        write_status(&path, &status);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("now_playing = \"Teardrop - Massive Attack\""));
        assert!(content.contains("error"));
    }
}
