/// Push channel to the display device: one form-encoded POST per update with
/// a short timeout. Only HTTP 200 counts as delivered. The caller logs any
/// failure and drops it, since the next tick supersedes a lost update.
use std::time::Duration;

use crate::sensors::MetricsSnapshot;

pub const NOW_PLAYING_PATH: &str = "nowplaying";
pub const STATS_PATH: &str = "pcstats";
pub const GAMING_PATH: &str = "gaming";

/// One update for the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    /// Empty `song` and `artist` clear the display.
    NowPlaying { song: String, artist: String },
    Stats(MetricsSnapshot),
    Gaming(bool),
}

impl Push {
    pub fn cleared() -> Self {
        Push::NowPlaying {
            song: String::new(),
            artist: String::new(),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Push::NowPlaying { .. } => NOW_PLAYING_PATH,
            Push::Stats(_) => STATS_PATH,
            Push::Gaming(_) => GAMING_PATH,
        }
    }

    /// Form fields in the order the device firmware reads them.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            Push::NowPlaying { song, artist } => {
                vec![("song", song.clone()), ("artist", artist.clone())]
            }
            Push::Stats(s) => vec![
                ("cpu_temp", s.cpu_temp.to_string()),
                ("cpu_usage", s.cpu_usage.to_string()),
                ("cpu_speed", format!("{:.1}", s.cpu_clock)),
                ("ram_used", s.ram_used.to_string()),
                ("ram_total", s.ram_total.to_string()),
                ("gpu_temp", s.gpu_temp.to_string()),
                ("gpu_usage", s.gpu_usage.to_string()),
                ("net_down", format!("{:.1}", s.net_down)),
                ("net_up", format!("{:.1}", s.net_up)),
            ],
            Push::Gaming(enabled) => vec![("enabled", if *enabled { "1" } else { "0" }.to_string())],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("device unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("device returned status {0}")]
    Status(u16),
}

/// Where pushes go. The real sink is [`HttpDevice`]; tests record pushes instead.
#[allow(async_fn_in_trait)]
pub trait DeviceSink {
    async fn push(&mut self, push: &Push) -> Result<(), PushError>;
}

pub struct HttpDevice {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDevice {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, push: &Push) -> String {
        format!("{}/{}", self.base_url, push.endpoint())
    }
}

impl DeviceSink for HttpDevice {
    async fn push(&mut self, push: &Push) -> Result<(), PushError> {
        let response = self
            .client
            .post(self.url_for(push))
            .form(&push.form())
            .send()
            .await?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(()),
            status => Err(PushError::Status(status.as_u16())),
        }
    }
}
