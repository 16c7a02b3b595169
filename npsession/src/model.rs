use npcovers::CoverImage;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Inbound "now playing" payload, exactly as the external player posts it
/// on its method channel (hence the camelCase wire names).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NowPlayingUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Track duration in seconds
    pub duration: Option<f64>,
    /// Playback position in seconds
    pub current_time: Option<f64>,
    pub is_playing: Option<bool>,
    pub cover_url: Option<String>,
}

impl NowPlayingUpdate {
    /// Rejects non-finite or negative numeric fields before the update is
    /// handed to the session task.
    pub fn validate(&self) -> Result<(), SessionError> {
        check_seconds("duration", self.duration)?;
        check_seconds("currentTime", self.current_time)?;
        Ok(())
    }
}

fn check_seconds(field: &str, value: Option<f64>) -> Result<(), SessionError> {
    if let Some(value) = value {
        if !value.is_finite() || value < 0.0 {
            return Err(SessionError::Update(format!(
                "field '{}' must be a finite non-negative number of seconds, got {}",
                field, value
            )));
        }
    }
    Ok(())
}

/// Current track description. Replaced wholesale on every update, never
/// merged field by field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    /// Cover URL, `None` when absent or empty on the wire
    pub art_url: Option<String>,
}

impl TrackMetadata {
    /// Builds the metadata from a validated update. Absent fields default to
    /// empty strings and zero.
    ///
    /// The duration is truncated to whole seconds before scaling to
    /// milliseconds, while the position keeps its sub-second part (see
    /// [`PlaybackSnapshot::from_update`]). The player relies on receiving
    /// exactly these values.
    pub fn from_update(update: &NowPlayingUpdate) -> Self {
        let art_url = update
            .cover_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Self {
            title: update.title.clone().unwrap_or_default(),
            artist: update.artist.clone().unwrap_or_default(),
            duration_ms: update.duration.map(|d| (d as u64) * 1000).unwrap_or(0),
            art_url,
        }
    }
}

/// Transport state: the cheap, always-pushed part of an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub position_ms: u64,
}

impl PlaybackSnapshot {
    pub fn from_update(update: &NowPlayingUpdate) -> Self {
        Self {
            is_playing: update.is_playing.unwrap_or(false),
            position_ms: update
                .current_time
                .map(|t| (t * 1000.0) as u64)
                .unwrap_or(0),
        }
    }
}

/// Sink-facing name for the transport state.
pub type TransportState = PlaybackSnapshot;

/// Everything a full notification/session render needs.
#[derive(Clone, Debug)]
pub struct RenderPayload {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub cover: Option<CoverImage>,
    /// Drives the toggle action and whether the notification is dismissible
    pub is_playing: bool,
}

impl RenderPayload {
    /// Display equality: same texts, same flag, same bitmap handle.
    pub fn same_as(&self, other: &Self) -> bool {
        self.title == other.title
            && self.artist == other.artist
            && self.duration_ms == other.duration_ms
            && self.is_playing == other.is_playing
            && same_cover(&self.cover, &other.cover)
    }
}

fn same_cover(a: &Option<CoverImage>, b: &Option<CoverImage>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// Last render the sink accepted, used to skip redundant ones.
#[derive(Default)]
pub struct RenderedState {
    payload: Option<RenderPayload>,
}

impl RenderedState {
    pub fn matches(&self, payload: &RenderPayload) -> bool {
        self.payload.as_ref().is_some_and(|p| p.same_as(payload))
    }

    pub fn record(&mut self, payload: RenderPayload) {
        self.payload = Some(payload);
    }

    pub fn cover(&self) -> Option<&CoverImage> {
        self.payload.as_ref().and_then(|p| p.cover.as_ref())
    }
}

/// Canonical control events delivered to the external player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Play,
    Pause,
    Next,
    Previous,
    Seek { position_ms: u64 },
}

impl ControlEvent {
    /// Action string on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            ControlEvent::Play => "play",
            ControlEvent::Pause => "pause",
            ControlEvent::Next => "next",
            ControlEvent::Previous => "previous",
            ControlEvent::Seek { .. } => "seek",
        }
    }

    /// Wire form, as posted on the player's event channel.
    pub fn to_wire(&self) -> ControlCenterEvent {
        let position = match self {
            ControlEvent::Seek { position_ms } => Some(*position_ms as f64 / 1000.0),
            _ => None,
        };
        ControlCenterEvent {
            action: self.action().to_string(),
            position,
        }
    }
}

/// Event channel name the player listens on.
pub const CONTROL_CENTER_EVENT: &str = "controlCenterEvent";

/// Serialized control event: `{action}` or `{action, position}` for seeks,
/// position in seconds.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ControlCenterEvent {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}
