//! Playback engine - core orchestration
//!
//! Owns the queue, transport and mode, drives the single media output and
//! turns its callbacks into state transitions.
//!
//! The engine never waits for the output. A load hands the source over and
//! returns; the output later reports `CanPlay`, `MetadataLoaded`, `Ended`,
//! ... through the subscription channel and the host calls
//! [`PlaybackEngine::process_events`]. Each load is tagged with a fresh
//! [`Generation`]; callbacks from older loads are dropped, so the last
//! navigation always wins.

use crate::{
    config::PlayerConfig,
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    output::{MediaOutput, OutputEvent, SharedAnalyser, SubscriptionId},
    queue::Queue,
    shuffle::{shuffler_for_seed, Shuffler},
    types::{Generation, PlaybackMode, PlaybackState, RepeatMode, Track, TrackId, TransportState},
};
use crossbeam_channel::{unbounded, Receiver};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Snapshot of the audio clock for followers (video sync, visualizer)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClock {
    /// Current track, if any
    pub track_id: Option<TrackId>,

    /// Video attached to the current track
    pub video_url: Option<String>,

    /// Load generation of the current track
    pub generation: Generation,

    /// Live media clock in seconds
    pub position_secs: f64,

    pub is_playing: bool,
}

/// Central playback management
///
/// One instance per playback session, injected into whatever needs it.
/// [`PlaybackEngine::shutdown`] (or dropping the engine) releases the output.
pub struct PlaybackEngine<O: MediaOutput> {
    output: O,
    output_events: Receiver<OutputEvent>,
    subscription: Option<SubscriptionId>,

    queue: Queue,
    state: PlaybackState,
    transport: TransportState,
    mode: PlaybackMode,
    generation: Generation,
    shuffler: Box<dyn Shuffler>,

    // Settings
    restart_threshold_secs: f64,
    fft_size: usize,
    last_audible_volume: f32,

    // Audio graph derived from the output, created at most once
    analyser: Option<SharedAnalyser>,
    analyser_unavailable: bool,

    navigation: Option<Box<dyn FnMut()>>,
    pending_events: Vec<PlaybackEvent>,
    released: bool,
}

impl<O: MediaOutput> PlaybackEngine<O> {
    /// Create the engine and take ownership of the output
    pub fn new(mut output: O, config: &PlayerConfig) -> Self {
        let (sender, output_events) = unbounded();
        let subscription = output.subscribe(sender);

        let volume = config.playback.initial_volume.clamp(0.0, 1.0);
        output.set_volume(volume);

        debug!(volume, "playback engine started");

        Self {
            output,
            output_events,
            subscription: Some(subscription),
            queue: Queue::new(),
            state: PlaybackState::Idle,
            transport: TransportState::new(volume),
            mode: PlaybackMode {
                shuffle: config.playback.shuffle,
                repeat: config.playback.repeat,
            },
            generation: Generation::INITIAL,
            shuffler: shuffler_for_seed(config.playback.shuffle_seed),
            restart_threshold_secs: config.playback.restart_threshold_secs,
            fft_size: config.visualizer.fft_size,
            last_audible_volume: if volume > 0.0 { volume } else { 0.7 },
            analyser: None,
            analyser_unavailable: false,
            navigation: None,
            pending_events: Vec::new(),
            released: false,
        }
    }

    /// Replace the shuffle algorithm
    pub fn with_shuffler(mut self, shuffler: Box<dyn Shuffler>) -> Self {
        self.shuffler = shuffler;
        self
    }

    /// Register the "navigate to now playing" observer
    pub fn set_navigation_handler(&mut self, handler: impl FnMut() + 'static) {
        self.navigation = Some(Box::new(handler));
    }

    pub fn clear_navigation_handler(&mut self) {
        self.navigation = None;
    }

    // ===== Queue Commands =====

    /// Play a single track, replacing the queue with `[track]`
    pub fn play_track(&mut self, track: Track) -> Result<()> {
        self.play_queue(vec![track], 0)
    }

    /// Replace the queue and start playing `tracks[start_index]`
    ///
    /// Nothing is mutated when `start_index` is out of range or a track has no
    /// audio locator. With shuffle on, the new queue is shuffled around the
    /// start track, which then sits at index 0.
    pub fn play_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let previous = self.current_track_id();
        self.queue.replace(tracks, start_index)?;
        if self.mode.shuffle {
            self.queue.shuffle(self.shuffler.as_mut());
        }
        self.emit_queue_changed();

        let loaded = self.load_current(previous);
        self.navigate_to_now_playing();
        loaded
    }

    /// Jump to a queue entry (e.g. clicked in the queue sheet)
    pub fn skip_to(&mut self, index: usize) -> Result<()> {
        let previous = self.current_track_id();
        self.queue.jump_to(index)?;
        self.load_current(previous)
    }

    /// Advance to the next queue entry
    ///
    /// Wraps to the first entry with repeat all; otherwise a no-op at the end
    /// of the queue.
    pub fn play_next(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let previous = self.current_track_id();
        if self.queue.advance() {
            self.load_current(previous)
        } else if self.mode.repeat == RepeatMode::All {
            self.queue.jump_to(0)?;
            self.load_current(previous)
        } else {
            debug!("end of queue reached, next ignored");
            Ok(())
        }
    }

    /// Restart the current track, or go back one entry near its start
    pub fn play_previous(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        if self.transport.position_secs > self.restart_threshold_secs {
            return self.seek_to(0.0);
        }

        let previous = self.current_track_id();
        if self.queue.go_back() {
            self.load_current(previous)
        } else {
            Ok(())
        }
    }

    // ===== Transport =====

    /// Flip between playing and paused
    ///
    /// A refused play request leaves the engine paused (`is_playing == false`)
    /// and is reported as [`PlaybackError::Media`].
    pub fn toggle_play(&mut self) -> Result<()> {
        if self.queue.current().is_none() {
            return Ok(());
        }

        if self.transport.is_playing {
            self.transport.is_playing = false;
            self.output.pause();
            if self.state == PlaybackState::Playing {
                self.set_state(PlaybackState::Paused);
            }
            return Ok(());
        }

        self.transport.is_playing = true;
        match self.state {
            // Starts on CanPlay
            PlaybackState::Loading => Ok(()),
            // Previous load failed: retry the same source
            PlaybackState::Idle => self.load_source(),
            PlaybackState::Ended => {
                self.output.set_current_time(0.0);
                self.transport.position_secs = 0.0;
                self.start_output()
            }
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Playing => {
                self.start_output()
            }
        }
    }

    /// Seek within the current track
    ///
    /// The position is updated optimistically; the next `TimeUpdate` from the
    /// output confirms it. Clamping to the duration is the caller's job.
    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        if self.queue.current().is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::InvalidSeekPosition(seconds));
        }

        self.output.set_current_time(seconds);
        self.transport.position_secs = seconds;
        self.emit_position_update();
        Ok(())
    }

    /// Set volume (0.0-1.0, clamped)
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };

        self.output.set_volume(volume);
        self.transport.volume = volume;
        if volume > 0.0 {
            self.last_audible_volume = volume;
        }
        self.pending_events
            .push(PlaybackEvent::VolumeChanged { volume });
    }

    /// Mute, or restore the last audible volume
    pub fn toggle_mute(&mut self) {
        if self.transport.volume > 0.0 {
            self.set_volume(0.0);
        } else {
            self.set_volume(self.last_audible_volume);
        }
    }

    // ===== Shuffle & Repeat =====

    /// Toggle shuffle; the current track stays current either way
    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(!self.mode.shuffle);
    }

    /// Turn shuffle on (reshuffling around the current track) or off
    /// (restoring the saved order)
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.mode.shuffle = enabled;

        if enabled {
            self.queue.shuffle(self.shuffler.as_mut());
        } else {
            self.queue.restore_original_order();
        }

        debug!(shuffle = self.mode.shuffle, index = self.queue.current_index(), "shuffle toggled");
        self.emit_mode_changed();
        self.emit_queue_changed();
    }

    /// Cycle repeat `off -> all -> one -> off`
    pub fn toggle_repeat(&mut self) {
        self.set_repeat(self.mode.repeat.cycle());
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.mode.repeat = repeat;
        self.emit_mode_changed();
    }

    // ===== Output Events =====

    /// Handle every output callback received since the last call
    ///
    /// Returns the number of callbacks consumed (stale ones included).
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.output_events.try_recv() {
            self.handle_output_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply one output callback
    pub fn handle_output_event(&mut self, event: OutputEvent) {
        if self.released {
            return;
        }

        if event.generation() != self.generation {
            trace!(
                event_generation = %event.generation(),
                current = %self.generation,
                "discarding stale output event"
            );
            return;
        }

        match event {
            OutputEvent::CanPlay { .. } => {
                if self.state != PlaybackState::Loading {
                    return;
                }
                self.set_state(PlaybackState::Ready);
                if self.transport.is_playing {
                    // Failure is already turned into state + event
                    let _ = self.start_output();
                }
            }
            OutputEvent::MetadataLoaded { duration_secs, .. } => {
                self.transport.duration_secs = if duration_secs.is_finite() {
                    duration_secs.max(0.0)
                } else {
                    0.0
                };
                self.emit_position_update();
            }
            OutputEvent::TimeUpdate { position_secs, .. } => {
                self.transport.position_secs = position_secs;
                self.emit_position_update();
            }
            OutputEvent::Ended { .. } => self.handle_track_ended(),
            OutputEvent::Error { message, .. } => {
                warn!(%message, "media output failed to load track");
                self.fail(message);
            }
            OutputEvent::PlayRejected { message, .. } => {
                warn!(%message, "play request rejected");
                self.transport.is_playing = false;
                if self.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused);
                }
                self.pending_events.push(PlaybackEvent::Error { message });
            }
        }
    }

    fn handle_track_ended(&mut self) {
        if let Some(id) = self.current_track_id() {
            self.pending_events
                .push(PlaybackEvent::TrackFinished { track_id: id });
        }
        self.set_state(PlaybackState::Ended);

        if self.mode.repeat == RepeatMode::One {
            self.output.set_current_time(0.0);
            self.transport.position_secs = 0.0;
            self.transport.is_playing = true;
            self.set_state(PlaybackState::Ready);
            let _ = self.start_output();
            return;
        }

        if self.can_play_next() {
            // Load failures are already reflected in state
            let _ = self.play_next();
        } else {
            debug!("queue finished");
            self.transport.is_playing = false;
        }
    }

    // ===== Audio Graph =====

    /// Frequency analyser over the output signal
    ///
    /// Created on first use and shared afterwards, so repeated visualizer
    /// mounts never build a second graph on the same element.
    pub fn analyser(&mut self) -> Result<SharedAnalyser> {
        if let Some(ref analyser) = self.analyser {
            return Ok(Rc::clone(analyser));
        }
        if self.released || self.analyser_unavailable {
            return Err(PlaybackError::sync_unavailable("audio analysis unavailable"));
        }

        match self.output.create_analyser(self.fft_size) {
            Ok(analyser) => {
                let shared: SharedAnalyser = Rc::new(RefCell::new(analyser));
                self.analyser = Some(Rc::clone(&shared));
                debug!(fft_size = self.fft_size, "audio analyser created");
                Ok(shared)
            }
            Err(err) => {
                debug!(error = %err, "audio analysis not available");
                self.analyser_unavailable = true;
                Err(err)
            }
        }
    }

    // ===== Teardown =====

    /// Release the output and stop reacting to its callbacks
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }

        if let Some(id) = self.subscription.take() {
            self.output.unsubscribe(id);
        }
        self.output.release();
        self.analyser = None;
        self.navigation = None;
        self.transport.is_playing = false;
        self.released = true;
        debug!("playback engine shut down");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // ===== State Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing
    }

    pub fn position_secs(&self) -> f64 {
        self.transport.position_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.transport.duration_secs
    }

    pub fn volume(&self) -> f32 {
        self.transport.volume
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.queue.is_empty()).then(|| self.queue.current_index())
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether `play_next` would change the track
    pub fn can_play_next(&self) -> bool {
        !self.queue.is_empty() && (!self.queue.is_at_end() || self.mode.repeat == RepeatMode::All)
    }

    /// Whether `play_previous` would go back an entry
    pub fn can_play_previous(&self) -> bool {
        self.queue.has_previous()
    }

    /// Audio clock snapshot for the synchronizer
    pub fn clock(&self) -> AudioClock {
        let current = self.queue.current();
        AudioClock {
            track_id: current.map(|t| t.id.clone()),
            video_url: current
                .filter(|t| t.has_video())
                .and_then(|t| t.video_url.clone()),
            generation: self.generation,
            position_secs: if current.is_some() && !self.released {
                self.output.current_time()
            } else {
                0.0
            },
            is_playing: self.transport.is_playing,
        }
    }

    /// Read-only access to the output
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Drain all pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Internals =====

    fn current_track_id(&self) -> Option<TrackId> {
        self.queue.current().map(|t| t.id.clone())
    }

    /// Announce the current queue entry, then load it
    fn load_current(&mut self, previous: Option<TrackId>) -> Result<()> {
        let Some(track_id) = self.current_track_id() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id,
            previous_track_id: previous,
            index: self.queue.current_index(),
        });
        self.load_source()
    }

    /// Hand the current queue entry to the output under a new generation
    fn load_source(&mut self) -> Result<()> {
        let Some(track) = self.queue.current() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let track_id = track.id.clone();
        let url = track.audio_url.clone();

        self.generation = self.generation.next();
        self.transport.is_playing = true;
        self.transport.position_secs = 0.0;
        self.transport.duration_secs = 0.0;

        debug!(
            track = %track_id,
            index = self.queue.current_index(),
            generation = %self.generation,
            "loading track"
        );
        self.set_state(PlaybackState::Loading);

        if let Err(err) = self.output.load(&url, self.generation) {
            warn!(error = %err, %url, "media output rejected source");
            self.fail(err.to_string());
            return Err(into_media_error(err));
        }
        Ok(())
    }

    /// Command the output to play; on refusal fall back to paused
    fn start_output(&mut self) -> Result<()> {
        match self.output.play() {
            Ok(()) => {
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "play request failed");
                self.transport.is_playing = false;
                if self.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused);
                }
                self.pending_events.push(PlaybackEvent::Error {
                    message: err.to_string(),
                });
                Err(into_media_error(err))
            }
        }
    }

    /// Load failure: back to idle, track stays current for a retry
    fn fail(&mut self, message: String) {
        self.transport.is_playing = false;
        self.set_state(PlaybackState::Idle);
        self.pending_events.push(PlaybackEvent::Error { message });
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        trace!(from = ?self.state, to = ?state, "state transition");
        self.state = state;
        self.pending_events.push(PlaybackEvent::StateChanged { state });
    }

    fn navigate_to_now_playing(&mut self) {
        if let Some(ref mut navigate) = self.navigation {
            navigate();
        }
    }

    fn emit_position_update(&mut self) {
        self.pending_events.push(PlaybackEvent::PositionUpdate {
            position_secs: self.transport.position_secs,
            duration_secs: self.transport.duration_secs,
        });
    }

    fn emit_mode_changed(&mut self) {
        self.pending_events
            .push(PlaybackEvent::ModeChanged { mode: self.mode });
    }

    fn emit_queue_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        });
    }
}

impl<O: MediaOutput> Drop for PlaybackEngine<O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn into_media_error(err: PlaybackError) -> PlaybackError {
    match err {
        PlaybackError::Media(_) => err,
        other => PlaybackError::Media(other.to_string()),
    }
}
