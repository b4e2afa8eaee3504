//! Encore Player - Playback Engine
//!
//! Platform-agnostic playback core for Encore Player.
//!
//! This crate provides:
//! - Queue playback with a position pointer (play track, play queue, jump)
//! - Next/previous navigation with restart-on-previous
//! - Shuffle that keeps the current track current, and restores the order
//! - Repeat modes (Off, All, One)
//! - Transport control (play/pause, seek, volume, mute)
//! - Generation-tagged loads: the last navigation always wins
//! - Audio/video drift correction for tracks with a video
//! - A frequency feed for spectrum visualizers
//!
//! # Architecture
//!
//! `encore-playback` never touches a media stack directly. The host provides:
//! - a [`MediaOutput`] (the `<audio>` element, a simulated clock, a fake)
//! - a [`VideoHandle`] for the synchronized video, if any
//! - a [`Scheduler`] for intervals, timeouts and animation frames
//!
//! Everything runs on one thread. Output callbacks are queued on a channel
//! and applied by [`PlaybackEngine::process_events`].
//!
//! # Example: Basic Playback
//!
//! ```rust
//! use encore_playback::testing::FakeOutput;
//! use encore_playback::{PlaybackEngine, PlaybackState, PlayerConfig, Track};
//!
//! let output = FakeOutput::new();
//! let mut engine = PlaybackEngine::new(output.clone(), &PlayerConfig::default());
//!
//! let queue = vec![
//!     Track::new("a", "First", "Artist", "https://cdn.example/a.mp3"),
//!     Track::new("b", "Second", "Artist", "https://cdn.example/b.mp3"),
//! ];
//! engine.play_queue(queue, 0).unwrap();
//! assert_eq!(engine.state(), PlaybackState::Loading);
//!
//! // The output reports it can play; the engine starts it
//! output.emit_can_play();
//! engine.process_events();
//! assert_eq!(engine.state(), PlaybackState::Playing);
//!
//! engine.play_next().unwrap();
//! assert_eq!(engine.current_track().unwrap().id.as_str(), "b");
//! ```
//!
//! # Example: Shuffle and Repeat
//!
//! ```rust
//! use encore_playback::testing::FakeOutput;
//! use encore_playback::{PlaybackEngine, PlayerConfig, RepeatMode, SeededShuffler};
//!
//! let mut engine = PlaybackEngine::new(FakeOutput::new(), &PlayerConfig::default())
//!     .with_shuffler(Box::new(SeededShuffler::new(7)));
//!
//! engine.toggle_shuffle();
//! engine.set_repeat(RepeatMode::All);
//! assert!(engine.mode().shuffle);
//! ```

pub mod config;
pub mod controls;
pub mod engine;
mod error;
pub mod events;
pub mod format;
pub mod library;
pub mod output;
pub mod queue;
pub mod scheduler;
pub mod shuffle;
pub mod sync;
pub mod types;
pub mod visualizer;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(feature = "wasm")]
pub mod wasm;

// Public exports
pub use config::{
    ControlsSettings, PlaybackSettings, PlayerConfig, SyncSettings, VisualizerSettings,
};
pub use controls::ControlsVisibility;
pub use engine::{AudioClock, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use format::format_time;
pub use library::{StaticTrackSource, TrackSource};
pub use output::{
    FrequencyAnalyser, MediaOutput, OutputEvent, SharedAnalyser, Subscribers, SubscriptionId,
    VideoHandle,
};
pub use queue::Queue;
pub use scheduler::{Scheduler, TimerId, TimerSlot};
pub use shuffle::{RandomShuffler, SeededShuffler, Shuffler};
pub use sync::MediaSynchronizer;
pub use types::{
    Generation, PlaybackMode, PlaybackState, RepeatMode, Track, TrackId, TransportState,
};
pub use visualizer::{Bar, VisualizationFeed};
