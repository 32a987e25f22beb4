use std::collections::HashSet;
use std::path::Path;

use crate::desktop::{DesktopView, Rect};

/// Pixels a borderless window may fall short of the screen and still count as fullscreen.
const FULLSCREEN_TOLERANCE_PX: i32 = 2;

/// Lowercase executable names of known games. Loaded once at startup; there is
/// no hot reload.
#[derive(Debug, Default, Clone)]
pub struct GameAllowList {
    entries: HashSet<String>,
}

impl GameAllowList {
    /// One executable name per line. Blank lines and lines starting with `#`
    /// are ignored; entries are lower-cased.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        Self { entries }
    }

    /// Reads the allow-list file. A missing or unreadable file yields an empty
    /// list; presence then relies on the fullscreen heuristic alone.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let list = Self::parse(&content);
                log::info!("Loaded {} games from {}", list.len(), path.display());
                list
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Games list not found at {}", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to read games list {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bidirectional substring match: an entry contained in the executable name
    /// or the executable name contained in an entry, so "eldenring" matches
    /// "eldenring.exe".
    pub fn matches(&self, exe_name: &str) -> bool {
        let exe = exe_name.to_lowercase();
        if exe.is_empty() {
            return false;
        }
        self.entries
            .iter()
            .any(|game| exe.contains(game.as_str()) || game.contains(exe.as_str()))
    }
}

/// Whether `window` covers a screen of `screen_width` × `screen_height`.
///
/// Either the window is at least as large as the screen, or it sits at the
/// origin and is within [`FULLSCREEN_TOLERANCE_PX`] of the screen size.
pub fn is_fullscreen(window: &Rect, screen_width: i32, screen_height: i32) -> bool {
    let width = window.width();
    let height = window.height();

    if width >= screen_width && height >= screen_height {
        return true;
    }
    window.left <= 0
        && window.top <= 0
        && width >= screen_width - FULLSCREEN_TOLERANCE_PX
        && height >= screen_height - FULLSCREEN_TOLERANCE_PX
}

/// Decides whether the user is gaming, from the foreground window alone.
pub struct PresenceClassifier {
    games: GameAllowList,
    desktop: Box<dyn DesktopView>,
    fullscreen_detection: bool,
}

impl PresenceClassifier {
    pub fn new(games: GameAllowList, desktop: Box<dyn DesktopView>, fullscreen_detection: bool) -> Self {
        Self {
            games,
            desktop,
            fullscreen_detection,
        }
    }

    /// Allow-list match OR fullscreen. No foreground window, or no desktop API
    /// at all, is simply "not gaming".
    pub fn evaluate(&mut self) -> bool {
        let Some(window) = self.desktop.foreground() else {
            return false;
        };

        if let Some(exe) = window.exe_name.as_deref() {
            if self.games.matches(exe) {
                return true;
            }
        }

        if !self.fullscreen_detection {
            return false;
        }
        match (window.rect, self.desktop.screen_size()) {
            (Some(rect), Some((width, height))) => is_fullscreen(&rect, width, height),
            _ => false,
        }
    }
}
