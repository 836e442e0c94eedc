//! "What is playing right now" probe, driving interrupt-class content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default player endpoint.
pub const DEFAULT_PLAYER_URL: &str = "https://api.spotify.com/v1/me/player";

/// The item currently playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveItem {
    /// Stable identity used to detect changes between passes.
    pub id: String,
    pub title: String,
    pub artist: String,
}

impl ActiveItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Player request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Player returned HTTP {0}")]
    Status(u16),

    #[error("Unreadable player response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait NowPlayingProbe: Send + Sync {
    /// The active item, or `None` when nothing is playing.
    async fn active_item(&self) -> Result<Option<ActiveItem>, ProbeError>;
}

/// Probe against a Spotify-compatible player endpoint.
#[derive(Debug, Clone)]
pub struct HttpNowPlayingProbe {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpNowPlayingProbe {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerState {
    #[serde(default)]
    is_playing: bool,
    device: Option<Device>,
    item: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Device {
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

/// Extract the active item from a player response body.
fn parse_player_state(body: &str) -> Result<Option<ActiveItem>, ProbeError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let state: PlayerState = serde_json::from_str(body)?;
    let device_active = state.device.is_some_and(|d| d.is_active);
    if !device_active || !state.is_playing {
        return Ok(None);
    }
    let Some(track) = state.item else {
        return Ok(None);
    };
    let Some(id) = track.id else {
        // Local files carry no id and cannot be told apart.
        return Ok(None);
    };
    let artist = track
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Ok(Some(ActiveItem::new(id, track.name, artist)))
}

#[async_trait]
impl NowPlayingProbe for HttpNowPlayingProbe {
    async fn active_item(&self) -> Result<Option<ActiveItem>, ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_player_state(&body)
    }
}
