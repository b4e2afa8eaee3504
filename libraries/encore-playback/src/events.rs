//! Playback Events
//!
//! Event-based communication for UI synchronization. The engine queues events
//! as it changes state; the UI drains them whenever convenient (after a
//! command, on a frame, on an output callback).

use crate::types::{PlaybackMode, PlaybackState, TrackId};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Track lifecycle state changed
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// A different queue entry became current
    TrackChanged {
        /// ID of the new (current) track
        track_id: TrackId,
        /// ID of the previous track (if any)
        previous_track_id: Option<TrackId>,
        /// Position of the new track in the queue
        index: usize,
    },

    /// Track played to its end
    TrackFinished {
        /// ID of the finished track
        track_id: TrackId,
    },

    /// Position or duration changed
    PositionUpdate {
        position_secs: f64,
        duration_secs: f64,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume (0.0-1.0)
        volume: f32,
    },

    /// Shuffle or repeat changed
    ModeChanged { mode: PlaybackMode },

    /// Queue replaced or reordered
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Load or play failed; the UI shows a transient notification
    Error {
        /// Error message
        message: String,
    },
}

impl PlaybackEvent {
    /// Whether this event only reports clock progress
    pub fn is_position_update(&self) -> bool {
        matches!(self, PlaybackEvent::PositionUpdate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_for_ui_bridges() {
        let event = PlaybackEvent::TrackChanged {
            track_id: TrackId::new("b"),
            previous_track_id: Some(TrackId::new("a")),
            index: 1,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TrackChanged"));

        let back: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn position_update_is_classified() {
        let update = PlaybackEvent::PositionUpdate {
            position_secs: 1.0,
            duration_secs: 2.0,
        };
        assert!(update.is_position_update());
        assert!(!PlaybackEvent::QueueChanged { length: 0 }.is_position_update());
    }
}
