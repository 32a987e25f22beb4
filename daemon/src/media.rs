/// Currently playing media, as reported by the OS media transport controls.
///
/// The tracker connects to the session manager lazily and re-resolves the
/// "current" session on every sample, because the OS hands transport focus from
/// one player to another at any time. Every failure degrades to the empty,
/// not-playing state: for change detection "can't tell" and "nothing playing"
/// are the same thing.
use thiserror::Error;

#[cfg(windows)]
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSessionManager as SessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as PlaybackStatus,
};

/// Last known media tuple. `MediaState::default()` is "nothing playing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaState {
    pub title: String,
    pub artist: String,
    pub playing: bool,
}

impl MediaState {
    pub fn is_empty(&self) -> bool {
        *self == MediaState::default()
    }
}

/// Raw session properties before normalisation.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub playing: bool,
}

impl From<SessionInfo> for MediaState {
    fn from(info: SessionInfo) -> Self {
        Self {
            title: info.title.unwrap_or_default(),
            artist: info.artist.unwrap_or_default(),
            playing: info.playing,
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media session manager unavailable: {0}")]
    Connect(String),
    #[error("media session query failed: {0}")]
    Session(String),
    #[error("media sessions are not supported on this platform")]
    Unsupported,
}

/// Access to the OS media-session capability.
pub trait MediaBackend {
    type Manager;

    fn connect(&mut self) -> Result<Self::Manager, MediaError>;

    /// The session that currently holds transport focus, or `None` if no player
    /// has one open.
    fn current_session(&mut self, manager: &Self::Manager) -> Result<Option<SessionInfo>, MediaError>;
}

pub struct MediaTracker<B: MediaBackend> {
    backend: B,
    manager: Option<B::Manager>,
    /// Set while failures are ongoing so only the first one is logged loudly.
    failing: bool,
}

impl<B: MediaBackend> MediaTracker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            manager: None,
            failing: false,
        }
    }

    /// Connects to the session manager if that has not succeeded yet.
    pub fn ensure_connected(&mut self) -> bool {
        if self.manager.is_some() {
            return true;
        }
        match self.backend.connect() {
            Ok(manager) => {
                log::debug!("Media session manager initialized");
                self.manager = Some(manager);
                self.failing = false;
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    pub fn sample(&mut self) -> MediaState {
        if !self.ensure_connected() {
            return MediaState::default();
        }
        let Some(manager) = self.manager.as_ref() else {
            return MediaState::default();
        };
        match self.backend.current_session(manager) {
            Ok(Some(info)) => {
                self.failing = false;
                info.into()
            }
            Ok(None) => {
                self.failing = false;
                MediaState::default()
            }
            Err(e) => {
                self.report(&e);
                MediaState::default()
            }
        }
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.manager.is_some()
    }

    fn report(&mut self, e: &MediaError) {
        if self.failing {
            log::debug!("Error getting media info: {e}");
        } else {
            log::warn!("Error getting media info: {e}");
            self.failing = true;
        }
    }
}

/// The OS media-session API.
pub struct SystemMedia;

#[cfg(windows)]
impl MediaBackend for SystemMedia {
    type Manager = SessionManager;

    fn connect(&mut self) -> Result<SessionManager, MediaError> {
        SessionManager::RequestAsync()
            .and_then(|op| op.get())
            .map_err(|e| MediaError::Connect(e.to_string()))
    }

    fn current_session(&mut self, manager: &SessionManager) -> Result<Option<SessionInfo>, MediaError> {
        // A null session (no player open) surfaces as an error from the projection.
        let Ok(session) = manager.GetCurrentSession() else {
            return Ok(None);
        };
        let session_err = |e: windows::core::Error| MediaError::Session(e.to_string());

        let status = session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map_err(session_err)?;
        let props = session
            .TryGetMediaPropertiesAsync()
            .and_then(|op| op.get())
            .map_err(session_err)?;

        Ok(Some(SessionInfo {
            title: props.Title().ok().map(|s| s.to_string_lossy()),
            artist: props.Artist().ok().map(|s| s.to_string_lossy()),
            playing: status == PlaybackStatus::Playing,
        }))
    }
}

#[cfg(not(windows))]
impl MediaBackend for SystemMedia {
    type Manager = ();

    fn connect(&mut self) -> Result<Self::Manager, MediaError> {
        Err(MediaError::Unsupported)
    }

    fn current_session(&mut self, _: &Self::Manager) -> Result<Option<SessionInfo>, MediaError> {
        Err(MediaError::Unsupported)
    }
}
