//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A playable unit as supplied by the library
///
/// Field names follow the remote store's row shape (`audio_url`, `cover_url`,
/// ...) so records deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier
    pub id: TrackId,

    /// Display title
    pub title: String,

    /// Display artist
    pub artist: String,

    /// Locator of the primary audio stream
    pub audio_url: String,

    /// Static artwork
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    /// Silent video whose timeline follows the audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Track {
    /// Create a track with the required fields
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: TrackId::new(id),
            title: title.into(),
            artist: artist.into(),
            audio_url: audio_url.into(),
            cover_url: None,
            video_url: None,
            description: None,
        }
    }

    /// Attach a synchronized video stream
    pub fn with_video(mut self, video_url: impl Into<String>) -> Self {
        self.video_url = Some(video_url.into());
        self
    }

    /// Attach artwork
    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = Some(cover_url.into());
        self
    }

    /// Whether the track can be handed to a media output
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }

    /// Whether the track carries a video that must follow the audio
    pub fn has_video(&self) -> bool {
        self.video_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Per-track lifecycle
///
/// ```text
/// Idle -> Loading -> Ready -> Playing <-> Paused -> Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing loaded, or the last load failed
    Idle,

    /// Source handed to the output, waiting for "ready to play"
    Loading,

    /// Source can play but is not playing
    Ready,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Reached the end of the track with nothing left to advance to
    Ended,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop entire queue
    All,

    /// Loop current track only
    One,
}

impl RepeatMode {
    /// Next mode in the `off -> all -> one -> off` cycle
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Shuffle and repeat settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackMode {
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

/// Transport snapshot exposed to UI consumers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    /// Playback intent; true while loading a track that should start playing
    pub is_playing: bool,

    /// Position of the media clock in seconds
    pub position_secs: f64,

    /// Track length in seconds, 0 until metadata has loaded
    pub duration_secs: f64,

    /// Output volume in [0, 1]
    pub volume: f32,
}

impl TransportState {
    pub(crate) fn new(volume: f32) -> Self {
        Self {
            is_playing: false,
            position_secs: 0.0,
            duration_secs: 0.0,
            volume,
        }
    }

    /// Time left in the current track (never negative)
    pub fn remaining_secs(&self) -> f64 {
        (self.duration_secs - self.position_secs).max(0.0)
    }

    /// Playback progress in [0, 1], 0 when the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Load generation
///
/// Every load bumps the engine's generation. Output callbacks carry the
/// generation of the load they belong to; anything older than the engine's
/// current generation is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// Generation before any load
    pub const INITIAL: Generation = Generation(0);

    pub(crate) fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }

    /// Raw counter value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for Generation {
    fn from(value: u64) -> Self {
        Generation(value)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
