//! Encore CLI - headless playback driver
//!
//! Plays a track list through a simulated media output so the engine, the
//! queue policy and the video synchronizer can be exercised without a browser.

pub mod settings;
pub mod simulated;
pub mod timers;
pub mod tracks;
