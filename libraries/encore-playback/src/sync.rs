//! Audio/video synchronization
//!
//! Keeps a secondary, muted video handle following the engine's audio clock.
//! Audio is authoritative: the video is seeked to the audio, never the other
//! way round.
//!
//! - On open and on every track change the video is muted and, if it is more
//!   than `align_threshold_secs` away from the audio, moved onto it once.
//! - While audio plays a coarse interval (`check_interval_ms`) compares both
//!   clocks and only seeks when drift exceeds `drift_threshold_secs`, so
//!   natural jitter is left alone.
//! - The video plays iff the audio is playing.

use crate::config::SyncSettings;
use crate::engine::AudioClock;
use crate::error::{PlaybackError, Result};
use crate::output::VideoHandle;
use crate::scheduler::{Scheduler, TimerId, TimerSlot};
use crate::types::Generation;
use tracing::{debug, trace};

/// Drives one video handle from the audio clock
pub struct MediaSynchronizer<V: VideoHandle, S: Scheduler> {
    scheduler: S,
    settings: SyncSettings,
    video: Option<V>,
    drift_check: TimerSlot,

    /// Generation of the track the video currently follows
    following: Option<Generation>,
    video_url: Option<String>,

    /// Transport state last pushed to the video
    mirrored_playing: Option<bool>,
    corrections: u64,
}

impl<V: VideoHandle, S: Scheduler> MediaSynchronizer<V, S> {
    pub fn new(scheduler: S, settings: SyncSettings) -> Self {
        Self {
            scheduler,
            settings,
            video: None,
            drift_check: TimerSlot::new(),
            following: None,
            video_url: None,
            mirrored_playing: None,
            corrections: 0,
        }
    }

    /// Attach a video handle (sync window opened)
    ///
    /// Fails with [`PlaybackError::SyncUnavailable`] when the current track
    /// has no video; nothing is attached in that case.
    pub fn open(&mut self, mut video: V, clock: &AudioClock) -> Result<()> {
        if clock.video_url.is_none() {
            return Err(PlaybackError::sync_unavailable("current track has no video"));
        }

        self.close();
        video.set_muted(true);
        self.video = Some(video);
        self.follow(clock);
        self.mirror_transport(clock);

        debug!(generation = %clock.generation, "video sync opened");
        Ok(())
    }

    /// Detach the video handle and stop all timers
    ///
    /// Returns the handle so the host can dispose of it.
    pub fn close(&mut self) -> Option<V> {
        self.drift_check.cancel(&mut self.scheduler);
        self.following = None;
        self.video_url = None;
        self.mirrored_playing = None;

        let video = self.video.take();
        if video.is_some() {
            debug!(corrections = self.corrections, "video sync closed");
        }
        video
    }

    /// Bring the video in line with a new audio snapshot
    ///
    /// Call after every engine change (commands and processed output events).
    pub fn sync(&mut self, clock: &AudioClock) {
        if self.video.is_none() {
            return;
        }

        if self.following != Some(clock.generation) {
            if clock.video_url.is_none() {
                debug!("track without video, pausing sync");
                self.drift_check.cancel(&mut self.scheduler);
                if let Some(video) = self.video.as_mut() {
                    video.pause();
                }
                self.following = Some(clock.generation);
                self.video_url = None;
                self.mirrored_playing = Some(false);
                return;
            }

            if let Some(video) = self.video.as_mut() {
                video.set_muted(true);
            }
            self.follow(clock);
            self.mirrored_playing = None;
        }

        if self.video_url.is_some() {
            self.mirror_transport(clock);
        }
    }

    /// Periodic drift check; returns false when `id` is not ours
    pub fn on_timer(&mut self, id: TimerId, clock: &AudioClock) -> bool {
        if !self.drift_check.holds(id) {
            return false;
        }
        if !clock.is_playing || self.following != Some(clock.generation) {
            return true;
        }

        let threshold = self.settings.drift_threshold_secs;
        if let Some(video) = self.video.as_mut() {
            let drift = (video.current_time() - clock.position_secs).abs();
            trace!(drift, "video drift check");
            if drift > threshold {
                debug!(drift, "correcting video drift");
                video.set_current_time(clock.position_secs);
                self.corrections += 1;
            }
        }
        true
    }

    pub fn is_open(&self) -> bool {
        self.video.is_some()
    }

    /// Whether the drift check interval is registered
    pub fn is_checking(&self) -> bool {
        self.drift_check.is_armed()
    }

    /// Video locator the attached handle should be showing
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    /// Current distance between the video and `clock`
    pub fn drift(&self, clock: &AudioClock) -> Option<f64> {
        self.video
            .as_ref()
            .map(|video| (video.current_time() - clock.position_secs).abs())
    }

    /// Number of drift corrections since creation
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn video(&self) -> Option<&V> {
        self.video.as_ref()
    }

    // ===== Internals =====

    /// Start following the track in `clock`, aligning once if needed
    fn follow(&mut self, clock: &AudioClock) {
        self.following = Some(clock.generation);
        self.video_url.clone_from(&clock.video_url);

        let threshold = self.settings.align_threshold_secs;
        if let Some(video) = self.video.as_mut() {
            if (video.current_time() - clock.position_secs).abs() > threshold {
                video.set_current_time(clock.position_secs);
            }
        }
    }

    /// Play/pause the video to match audio and (dis)arm the drift check
    fn mirror_transport(&mut self, clock: &AudioClock) {
        if self.mirrored_playing == Some(clock.is_playing) {
            return;
        }
        let Some(video) = self.video.as_mut() else {
            return;
        };

        if clock.is_playing {
            // The audio keeps playing even if the video refuses
            if let Err(err) = video.play() {
                debug!(error = %err, "video play rejected");
            }
            if !self.drift_check.is_armed() {
                let id = self.scheduler.set_interval(self.settings.check_interval());
                self.drift_check.arm(&mut self.scheduler, id);
            }
        } else {
            video.pause();
            self.drift_check.cancel(&mut self.scheduler);
        }
        self.mirrored_playing = Some(clock.is_playing);
    }
}

impl<V: VideoHandle, S: Scheduler> Drop for MediaSynchronizer<V, S> {
    fn drop(&mut self) {
        self.drift_check.cancel(&mut self.scheduler);
    }
}
