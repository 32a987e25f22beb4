/// Process-wide logging: `env_logger` with a fixed timestamped line format,
/// written to stderr and to a size-rotated log file in the app data directory.
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Env, Target, WriteStyle};

use crate::config::LoggingConfig;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Installs the global logger. `RUST_LOG` overrides the configured level.
///
/// The log file is opened before the logger is installed, so a file that cannot
/// be created is reported to the caller instead of silently dropping lines.
pub fn init(config: &LoggingConfig, log_path: &Path) -> Result<()> {
    let file = RotatingFile::open(log_path, config.max_file_bytes, config.backup_count)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.level.as_str()))
        .format(|buf, record| {
            let now = chrono::Local::now().format(TIMESTAMP_FORMAT);
            writeln!(buf, "{}", line(now, record.level(), record.args()))
        })
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .context("Logger already initialized")?;
    Ok(())
}

fn line(timestamp: impl Display, level: log::Level, message: impl Display) -> String {
    format!("{timestamp} [{level}] {message}")
}

/// Every record goes to stderr and to the log file. A failing file write never
/// suppresses the stderr copy.
struct Tee {
    file: RotatingFile,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        let _ = self.file.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Append-only file that rolls over to `<name>.1`, `<name>.2`, … once it would
/// exceed `max_bytes`. With `backups == 0` it is truncated instead.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: u32,
    /// `None` if a rotation failed before the file could be reopened.
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backups: u32) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            file: Some(file),
            written,
        })
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        // The handle must be closed before the file can be renamed on Windows.
        if let Some(mut old) = self.file.take() {
            old.flush()?;
        }
        if self.backups > 0 {
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
            self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        } else {
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&self.path)?,
            );
        }
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A single record larger than the limit still gets written, to a fresh file.
        if self.max_bytes > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                // A previous rotation failed halfway; try to reopen in place.
                let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
                self.written = file.metadata()?.len();
                self.file.insert(file)
            }
        };
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    // ── line format ───────────────────────────────────────────────────────────

    #[test]
    fn line_has_timestamp_level_and_message() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(
            line(ts.format(TIMESTAMP_FORMAT), log::Level::Info, "Gaming mode: ON"),
            "2026-03-01 09:05:07 [INFO] Gaming mode: ON"
        );
    }

    // ── RotatingFile ──────────────────────────────────────────────────────────

    #[test]
    fn appends_below_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pc_watcher.log");
        let mut file = RotatingFile::open(&path, 100, 2).unwrap();
        file.write_all(b"one\n").unwrap();
        file.write_all(b"two\n").unwrap();
        assert_eq!(read(&path), "one\ntwo\n");
        assert!(!file.backup_path(1).exists());
    }

    #[test]
    fn rolls_over_when_limit_would_be_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pc_watcher.log");
        let mut file = RotatingFile::open(&path, 10, 2).unwrap();
        file.write_all(b"12345678\n").unwrap();
        file.write_all(b"abc\n").unwrap();
        assert_eq!(read(&path), "abc\n");
        assert_eq!(read(&dir.path().join("pc_watcher.log.1")), "12345678\n");
    }

    #[test]
    fn keeps_at_most_backup_count_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pc_watcher.log");
        let mut file = RotatingFile::open(&path, 4, 2).unwrap();
        for record in [b"aaa\n", b"bbb\n", b"ccc\n", b"ddd\n"] {
            file.write_all(record).unwrap();
        }
        assert_eq!(read(&path), "ddd\n");
        assert_eq!(read(&dir.path().join("pc_watcher.log.1")), "ccc\n");
        assert_eq!(read(&dir.path().join("pc_watcher.log.2")), "bbb\n");
        assert!(!dir.path().join("pc_watcher.log.3").exists());
    }

    #[test]
    fn zero_backups_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pc_watcher.log");
        let mut file = RotatingFile::open(&path, 4, 0).unwrap();
        file.write_all(b"old\n").unwrap();
        file.write_all(b"new\n").unwrap();
        assert_eq!(read(&path), "new\n");
        assert!(!dir.path().join("pc_watcher.log.1").exists());
    }

    #[test]
    fn reopening_counts_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pc_watcher.log");
        std::fs::write(&path, "12345678\n").unwrap();
        let mut file = RotatingFile::open(&path, 10, 1).unwrap();
        file.write_all(b"next\n").unwrap();
        assert_eq!(read(&path), "next\n");
        assert_eq!(read(&dir.path().join("pc_watcher.log.1")), "12345678\n");
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("pc_watcher.log");
        RotatingFile::open(&path, 10, 1).unwrap();
        assert!(path.exists());
    }
}
