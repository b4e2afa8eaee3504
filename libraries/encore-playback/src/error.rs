//! Error types for playback management

use crate::types::TrackId;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Start index outside the supplied queue
    #[error("Index {index} out of bounds for queue of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// Track has no audio locator and cannot be enqueued
    #[error("Track {0} has no audio source")]
    MissingAudioUrl(TrackId),

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Invalid seek position
    #[error("Invalid seek position: {0}")]
    InvalidSeekPosition(f64),

    /// Media output failed to load or play
    #[error("Media output error: {0}")]
    Media(String),

    /// Video sync or audio analysis is not available on this platform
    #[error("Sync unavailable: {0}")]
    SyncUnavailable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Create a media error
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Create a sync-unavailable error
    pub fn sync_unavailable(msg: impl Into<String>) -> Self {
        Self::SyncUnavailable(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
