/// The polling loop: presence and media on the fast cadence, hardware stats on
/// the slow one, all pushed to the display through a [`DeviceSink`].
///
/// Everything runs on one task. The slow cadence is a timestamp comparison
/// inside the fast loop, so a tick never overlaps another.
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::device::{DeviceSink, Push};
use crate::media::{MediaBackend, MediaState, MediaTracker};
use crate::presence::PresenceClassifier;
use crate::sensors::SensorAggregator;
use crate::status::{self, WatcherState, WatcherStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Gaming,
}

impl From<Mode> for WatcherState {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => WatcherState::Normal,
            Mode::Gaming => WatcherState::Gaming,
        }
    }
}

pub struct WatcherSettings {
    pub fast_interval: Duration,
    pub slow_interval: Duration,
    /// Where to persist [`WatcherStatus`]; `None` keeps it in memory only.
    pub status_path: Option<PathBuf>,
}

pub struct Watcher<M: MediaBackend, S: DeviceSink> {
    presence: PresenceClassifier,
    media: MediaTracker<M>,
    sensors: SensorAggregator,
    sink: S,
    settings: WatcherSettings,
    mode: Mode,
    /// Last media tuple seen, pushed or not.
    last_media: MediaState,
    last_stats_at: Option<Instant>,
    status: WatcherStatus,
    /// Set when `status` changed since it was last written.
    status_dirty: bool,
}

impl<M: MediaBackend, S: DeviceSink> Watcher<M, S> {
    pub fn new(
        presence: PresenceClassifier,
        media: MediaTracker<M>,
        sensors: SensorAggregator,
        sink: S,
        settings: WatcherSettings,
    ) -> Self {
        Self {
            presence,
            media,
            sensors,
            sink,
            settings,
            mode: Mode::Normal,
            last_media: MediaState::default(),
            last_stats_at: None,
            status: WatcherStatus::new(),
            status_dirty: true,
        }
    }

    /// Polls until the future is dropped. Ticks are scheduled on a fixed grid,
    /// so time spent inside a tick does not stretch the cadence.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.settings.fast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let now = ticker.tick().await;
            self.tick(now).await;
        }
    }

    /// One fast tick: presence, then stats if the slow interval has elapsed,
    /// then media unless gaming.
    pub async fn tick(&mut self, now: Instant) {
        self.update_presence().await;

        if self.stats_due(now) {
            self.push_stats(now).await;
            self.last_stats_at = Some(now);
        }

        if self.mode == Mode::Normal {
            self.update_media().await;
        }

        self.persist_status();
    }

    /// Records the final state. Held vendor handles are released when the
    /// watcher is dropped.
    pub fn shutdown(&mut self) {
        log::info!("Stopped by user");
        self.status.mode = WatcherState::Stopped;
        self.status.now_playing = None;
        self.status_dirty = true;
        self.persist_status();
    }

    fn stats_due(&self, now: Instant) -> bool {
        match self.last_stats_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.settings.slow_interval,
        }
    }

    async fn update_presence(&mut self) {
        let next = if self.presence.evaluate() {
            Mode::Gaming
        } else {
            Mode::Normal
        };
        if next == self.mode {
            return;
        }

        self.mode = next;
        self.status.mode = next.into();
        self.status_dirty = true;

        let gaming = next == Mode::Gaming;
        if gaming {
            // The display drops the track when it switches to the game screen.
            self.last_media = MediaState::default();
            self.status.now_playing = None;
        }
        log::info!("Gaming mode: {}", if gaming { "ON" } else { "OFF" });
        self.deliver(Push::Gaming(gaming)).await;
    }

    async fn push_stats(&mut self, now: Instant) {
        let snapshot = self.sensors.snapshot(now);
        if self.deliver(Push::Stats(snapshot.clone())).await {
            log::debug!(
                "Stats: CPU {}°/{}%/{}G GPU {}°/{}% RAM {}/{}G NET down {}M up {}M",
                snapshot.cpu_temp,
                snapshot.cpu_usage,
                snapshot.cpu_clock,
                snapshot.gpu_temp,
                snapshot.gpu_usage,
                snapshot.ram_used,
                snapshot.ram_total,
                snapshot.net_down,
                snapshot.net_up,
            );
            self.status.last_stats_at = Some(chrono::Local::now().to_rfc3339());
        }
    }

    async fn update_media(&mut self) {
        let current = self.media.sample();
        if current == self.last_media {
            return;
        }

        if current.playing && !current.title.is_empty() {
            let push = Push::NowPlaying {
                song: current.title.clone(),
                artist: current.artist.clone(),
            };
            if self.deliver(push).await {
                log::info!("PLAYING: {} - {}", current.title, current.artist);
                self.status.now_playing = Some(describe(&current));
                self.status_dirty = true;
            }
        } else if !current.playing && self.last_media.playing {
            if self.deliver(Push::cleared()).await {
                log::info!("PAUSED: Cleared display");
                self.status.now_playing = None;
                self.status_dirty = true;
            }
        }

        self.last_media = current;
    }

    /// Sends one push. Failures are logged and recorded in the status, never
    /// retried.
    async fn deliver(&mut self, push: Push) -> bool {
        match self.sink.push(&push).await {
            Ok(()) => {
                if self.status.error.take().is_some() {
                    self.status_dirty = true;
                }
                true
            }
            Err(e) => {
                log::warn!("Device {} push failed: {e}", push.endpoint());
                let message = e.to_string();
                if self.status.error.as_deref() != Some(message.as_str()) {
                    self.status.error = Some(message);
                    self.status_dirty = true;
                }
                false
            }
        }
    }

    fn persist_status(&mut self) {
        if !self.status_dirty {
            return;
        }
        if let Some(path) = &self.settings.status_path {
            status::write_status(path, &self.status);
        }
        self.status_dirty = false;
    }
}

fn describe(media: &MediaState) -> String {
    if media.artist.is_empty() {
        media.title.clone()
    } else {
        format!("{} - {}", media.title, media.artist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::desktop::{DesktopView, ForegroundWindow, Rect};
    use crate::device::PushError;
    use crate::media::tests::ScriptedMedia;
    use crate::media::SessionInfo;
    use crate::presence::GameAllowList;
    use crate::sensors::chain::tests::{FixedSource, NoTraffic};
    use crate::sensors::{SensorBackend, SensorCategory};

    const FAST: Duration = Duration::from_millis(250);
    const SLOW: Duration = Duration::from_secs(1);

    /// Records every push; answers 503 while `failing` is set.
    #[derive(Default)]
    struct RecordingSink {
        pushes: Vec<Push>,
        failing: bool,
    }

    impl DeviceSink for RecordingSink {
        async fn push(&mut self, push: &Push) -> Result<(), PushError> {
            self.pushes.push(push.clone());
            if self.failing {
                Err(PushError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    /// Desktop whose foreground window is a fullscreen game while the shared
    /// flag is set, and an editor window otherwise.
    struct SwitchDesktop(Rc<Cell<bool>>);

    impl DesktopView for SwitchDesktop {
        fn foreground(&mut self) -> Option<ForegroundWindow> {
            let rect = if self.0.get() {
                Rect { left: 0, top: 0, right: 1920, bottom: 1080 }
            } else {
                Rect { left: 100, top: 100, right: 1200, bottom: 800 }
            };
            Some(ForegroundWindow {
                exe_name: Some("app.exe".to_string()),
                rect: Some(rect),
            })
        }

        fn screen_size(&mut self) -> Option<(i32, i32)> {
            Some((1920, 1080))
        }
    }

    struct Harness {
        watcher: Watcher<ScriptedMedia, RecordingSink>,
        gaming: Rc<Cell<bool>>,
        start: Instant,
    }

    impl Harness {
        fn new(media: ScriptedMedia) -> Self {
            Self::with_status_path(media, None)
        }

        fn with_status_path(media: ScriptedMedia, status_path: Option<PathBuf>) -> Self {
            let gaming = Rc::new(Cell::new(false));
            let presence = PresenceClassifier::new(
                GameAllowList::default(),
                Box::new(SwitchDesktop(Rc::clone(&gaming))),
                true,
            );
            let sensors = SensorAggregator::new(
                vec![Box::new(FixedSource::new(
                    SensorBackend::Builtin,
                    vec![
                        (SensorCategory::Temperature, "CPU Package", 55.0),
                        (SensorCategory::Load, "CPU Total", 12.0),
                    ],
                ))],
                SensorBackend::DEFAULT_PRIORITY.to_vec(),
                Box::new(NoTraffic),
            );
            let watcher = Watcher::new(
                presence,
                MediaTracker::new(media),
                sensors,
                RecordingSink::default(),
                WatcherSettings {
                    fast_interval: FAST,
                    slow_interval: SLOW,
                    status_path,
                },
            );
            Self {
                watcher,
                gaming,
                start: Instant::now(),
            }
        }

        /// Runs tick number `n` of a steady fast cadence.
        async fn tick(&mut self, n: u32) {
            self.watcher.tick(self.start + FAST * n).await;
        }

        fn pushes(&self) -> &[Push] {
            &self.watcher.sink.pushes
        }

        fn stats_pushes(&self) -> usize {
            self.pushes().iter().filter(|p| matches!(p, Push::Stats(_))).count()
        }

        /// Every push except stats, in order.
        fn event_pushes(&self) -> Vec<Push> {
            self.pushes()
                .iter()
                .filter(|p| !matches!(p, Push::Stats(_)))
                .cloned()
                .collect()
        }
    }

    fn media_with(sessions: Vec<Option<SessionInfo>>) -> ScriptedMedia {
        let mut media = ScriptedMedia::new();
        media.sessions.extend(sessions.into_iter().map(Ok));
        media
    }

    fn paused(title: &str, artist: &str) -> SessionInfo {
        SessionInfo {
            playing: false,
            ..ScriptedMedia::playing(title, artist)
        }
    }

    fn now_playing(song: &str, artist: &str) -> Push {
        Push::NowPlaying {
            song: song.to_string(),
            artist: artist.to_string(),
        }
    }

    // ── media ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn same_media_sample_pushes_once() {
        let mut h = Harness::new(media_with(vec![Some(ScriptedMedia::playing("Song", "Band"))]));
        for n in 0..6 {
            h.tick(n).await;
        }
        assert_eq!(h.event_pushes(), vec![now_playing("Song", "Band")]);
        assert_eq!(h.watcher.status.now_playing.as_deref(), Some("Song - Band"));
    }

    #[tokio::test]
    async fn pause_after_playing_clears_display() {
        let mut h = Harness::new(media_with(vec![
            Some(ScriptedMedia::playing("Song", "Band")),
            Some(paused("Song", "Band")),
        ]));
        for n in 0..4 {
            h.tick(n).await;
        }
        assert_eq!(h.event_pushes(), vec![now_playing("Song", "Band"), Push::cleared()]);
        assert!(h.watcher.status.now_playing.is_none());
    }

    #[tokio::test]
    async fn paused_track_without_prior_playback_is_not_pushed() {
        let mut h = Harness::new(media_with(vec![Some(paused("Song", "Band"))]));
        h.tick(0).await;
        h.tick(1).await;
        assert!(h.event_pushes().is_empty());
        // The state is still remembered so that the next comparison is against it.
        assert_eq!(&h.watcher.last_media, &MediaState::from(paused("Song", "Band")));
    }

    #[tokio::test]
    async fn playing_without_title_is_not_pushed() {
        let mut h = Harness::new(media_with(vec![Some(SessionInfo {
            title: None,
            artist: Some("Band".into()),
            playing: true,
        })]));
        h.tick(0).await;
        assert!(h.event_pushes().is_empty());
    }

    #[tokio::test]
    async fn track_change_pushes_new_track() {
        let mut h = Harness::new(media_with(vec![
            Some(ScriptedMedia::playing("One", "Band")),
            Some(ScriptedMedia::playing("Two", "Band")),
        ]));
        h.tick(0).await;
        h.tick(1).await;
        h.tick(2).await;
        assert_eq!(h.event_pushes(), vec![now_playing("One", "Band"), now_playing("Two", "Band")]);
    }

    // ── presence ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn entering_gaming_clears_media_and_pushes_flag_once() {
        let mut h = Harness::new(media_with(vec![Some(ScriptedMedia::playing("Song", "Band"))]));
        h.tick(0).await;

        h.gaming.set(true);
        h.tick(1).await;
        assert_eq!(h.watcher.mode, Mode::Gaming);
        assert!(h.watcher.last_media.is_empty());
        h.tick(2).await;
        h.tick(3).await;

        h.gaming.set(false);
        h.tick(4).await;
        assert_eq!(h.watcher.mode, Mode::Normal);

        // The same track is pushed again after gaming because the state was reset.
        assert_eq!(
            h.event_pushes(),
            vec![
                now_playing("Song", "Band"),
                Push::Gaming(true),
                Push::Gaming(false),
                now_playing("Song", "Band"),
            ]
        );
    }

    #[tokio::test]
    async fn media_is_not_sampled_while_gaming() {
        let mut h = Harness::new(media_with(vec![Some(ScriptedMedia::playing("Song", "Band"))]));
        h.gaming.set(true);
        for n in 0..4 {
            h.tick(n).await;
        }
        assert_eq!(h.event_pushes(), vec![Push::Gaming(true)]);
        assert!(!h.watcher.media.is_connected());
        assert_eq!(h.watcher.status.mode, WatcherState::Gaming);
    }

    // ── stats cadence ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn four_seconds_idle_gives_four_stats_and_no_media() {
        let mut h = Harness::new(ScriptedMedia::new());
        for n in 0..16 {
            h.tick(n).await;
        }
        assert_eq!(h.stats_pushes(), 4);
        assert!(h.event_pushes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_the_fast_cadence() {
        let mut h = Harness::new(ScriptedMedia::new());
        // Stops just short of the 4 s tick so only ticks 0..=15 run.
        let window = SLOW * 4 - FAST / 2;
        let _ = tokio::time::timeout(window, h.watcher.run()).await;
        assert_eq!(h.stats_pushes(), 4);
        assert!(h.event_pushes().is_empty());
    }

    #[tokio::test]
    async fn stats_continue_while_gaming() {
        let mut h = Harness::new(ScriptedMedia::new());
        h.gaming.set(true);
        for n in 0..8 {
            h.tick(n).await;
        }
        assert_eq!(h.stats_pushes(), 2);
    }

    #[tokio::test]
    async fn stats_carry_resolved_readings() {
        let mut h = Harness::new(ScriptedMedia::new());
        h.tick(0).await;
        let Some(Push::Stats(snapshot)) = h.pushes().first().cloned() else {
            panic!("expected a stats push first");
        };
        assert_eq!(snapshot.cpu_temp, 55);
        assert_eq!(snapshot.cpu_usage, 12);
        assert_eq!(snapshot.gpu_temp, 0);
    }

    // ── failure isolation ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn failed_pushes_do_not_stop_the_loop() {
        let mut h = Harness::new(media_with(vec![Some(ScriptedMedia::playing("Song", "Band"))]));
        h.watcher.sink.failing = true;
        for n in 0..8 {
            h.tick(n).await;
        }
        // Stats are still attempted on cadence and the failed track is not retried.
        assert_eq!(h.stats_pushes(), 2);
        assert_eq!(h.event_pushes(), vec![now_playing("Song", "Band")]);
        assert!(h.watcher.status.error.is_some());
        assert!(h.watcher.status.last_stats_at.is_none());

        h.watcher.sink.failing = false;
        h.tick(8).await;
        assert!(h.watcher.status.error.is_none());
        assert!(h.watcher.status.last_stats_at.is_some());
    }

    // ── status file ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn status_file_tracks_mode_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let mut h = Harness::with_status_path(ScriptedMedia::new(), Some(path.clone()));

        h.gaming.set(true);
        h.tick(0).await;
        let written: WatcherStatus = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.mode, WatcherState::Gaming);

        h.watcher.shutdown();
        let written: WatcherStatus = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.mode, WatcherState::Stopped);
    }

    #[test]
    fn describe_omits_missing_artist() {
        let media = MediaState {
            title: "Song".into(),
            artist: String::new(),
            playing: true,
        };
        assert_eq!(describe(&media), "Song");
    }
}
