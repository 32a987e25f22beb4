/// Canonical file paths for watcher data files.
///
/// Everything lives under one per-user directory, %APPDATA%\PcWatcher\ on
/// Windows and the platform config directory (`dirs::config_dir`) elsewhere:
///   - config.toml     Optional user settings.
///   - games.txt       Game allow-list, one executable name per line.
///   - status.toml     Written by the watcher.
///   - pc_watcher.log  Rotating log file.
#[cfg(windows)]
use anyhow::bail;
#[cfg(not(windows))]
use anyhow::Context;
use anyhow::Result;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const APP_DIR_NAME: &str = "PcWatcher";
#[cfg(not(windows))]
const APP_DIR_NAME: &str = "pc-watcher";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const LOG_FILE_NAME: &str = "pc_watcher.log";

/// Returns the watcher application data directory.
#[cfg(windows)]
pub fn app_data_dir() -> Result<PathBuf> {
    match std::env::var_os("APPDATA") {
        Some(appdata) if !appdata.is_empty() => Ok(PathBuf::from(appdata).join(APP_DIR_NAME)),
        _ => bail!("APPDATA environment variable not set"),
    }
}

/// Returns the watcher application data directory.
#[cfg(not(windows))]
pub fn app_data_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(APP_DIR_NAME))
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

pub fn log_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        let dir = app_data_dir().unwrap();
        assert_eq!(dir.file_name().unwrap(), APP_DIR_NAME);
    }

    #[cfg(windows)]
    #[test]
    fn app_data_dir_is_inside_appdata() {
        let appdata = std::env::var("APPDATA").unwrap();
        assert!(app_data_dir().unwrap().starts_with(&appdata));
    }

    #[cfg(not(windows))]
    #[test]
    fn relative_xdg_config_home_is_ignored() {
        std::env::set_var("XDG_CONFIG_HOME", "relative/dir");
        let dir = app_data_dir().unwrap();
        std::env::remove_var("XDG_CONFIG_HOME");
        assert!(dir.is_absolute());
        assert!(!dir.starts_with("relative"));
    }

    #[test]
    fn file_paths_have_correct_names() {
        let dir = Path::new("data");
        assert_eq!(config_file_path(dir).file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(status_file_path(dir).file_name().unwrap(), STATUS_FILE_NAME);
        assert_eq!(log_file_path(dir).file_name().unwrap(), LOG_FILE_NAME);
    }

    #[test]
    fn all_files_share_the_app_dir() {
        let dir = Path::new("data");
        assert_eq!(config_file_path(dir).parent(), Some(dir));
        assert_eq!(status_file_path(dir).parent(), Some(dir));
        assert_eq!(log_file_path(dir).parent(), Some(dir));
    }
}
