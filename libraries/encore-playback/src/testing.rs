//! In-memory fakes for the platform traits
//!
//! Every fake is a cheap handle over shared state: keep a clone, give the
//! other clone to the code under test, then drive callbacks and inspect the
//! recorded calls from the test.

use crate::error::{PlaybackError, Result};
use crate::output::{
    FrequencyAnalyser, MediaOutput, OutputEvent, Subscribers, SubscriptionId, VideoHandle,
};
use crate::scheduler::{Scheduler, TimerId};
use crate::types::Generation;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

// ===== Media Output =====

/// Command received by a [`FakeOutput`]
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load(String),
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f32),
    Release,
}

#[derive(Default)]
struct OutputState {
    subscribers: Subscribers,
    calls: Vec<OutputCall>,
    loaded_url: Option<String>,
    generation: Generation,
    current_time: f64,
    duration: f64,
    volume: f32,
    fail_next_load: Option<String>,
    fail_next_play: Option<String>,
    analyser_bins: Option<Vec<u8>>,
    analyser_creations: usize,
    release_count: usize,
}

/// Scriptable [`MediaOutput`]
#[derive(Clone, Default)]
pub struct FakeOutput {
    state: Rc<RefCell<OutputState>>,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- Callbacks -----

    /// Deliver a raw event to subscribers
    pub fn emit(&self, event: OutputEvent) {
        self.state.borrow_mut().subscribers.emit(&event);
    }

    /// Generation of the most recent load
    pub fn last_generation(&self) -> Generation {
        self.state.borrow().generation
    }

    pub fn emit_can_play(&self) {
        let generation = self.last_generation();
        self.emit(OutputEvent::CanPlay { generation });
    }

    pub fn emit_metadata(&self, duration_secs: f64) {
        let generation = {
            let mut state = self.state.borrow_mut();
            state.duration = duration_secs;
            state.generation
        };
        self.emit(OutputEvent::MetadataLoaded {
            generation,
            duration_secs,
        });
    }

    /// Advance the clock and report it
    pub fn emit_time_update(&self, position_secs: f64) {
        let generation = {
            let mut state = self.state.borrow_mut();
            state.current_time = position_secs;
            state.generation
        };
        self.emit(OutputEvent::TimeUpdate {
            generation,
            position_secs,
        });
    }

    pub fn emit_ended(&self) {
        let generation = self.last_generation();
        self.emit(OutputEvent::Ended { generation });
    }

    pub fn emit_error(&self, message: &str) {
        let generation = self.last_generation();
        self.emit(OutputEvent::Error {
            generation,
            message: message.to_string(),
        });
    }

    pub fn emit_play_rejected(&self, message: &str) {
        let generation = self.last_generation();
        self.emit(OutputEvent::PlayRejected {
            generation,
            message: message.to_string(),
        });
    }

    /// Move the clock without notifying anyone
    pub fn set_time(&self, seconds: f64) {
        self.state.borrow_mut().current_time = seconds;
    }

    // ----- Failure injection -----

    pub fn fail_next_load(&self, message: &str) {
        self.state.borrow_mut().fail_next_load = Some(message.to_string());
    }

    pub fn fail_next_play(&self, message: &str) {
        self.state.borrow_mut().fail_next_play = Some(message.to_string());
    }

    /// Make `create_analyser` succeed with these magnitudes
    pub fn enable_analyser(&self, bins: &[u8]) {
        self.state.borrow_mut().analyser_bins = Some(bins.to_vec());
    }

    // ----- Inspection -----

    pub fn calls(&self) -> Vec<OutputCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.state.borrow().loaded_url.clone()
    }

    pub fn play_count(&self) -> usize {
        self.count(|call| matches!(call, OutputCall::Play))
    }

    pub fn pause_count(&self) -> usize {
        self.count(|call| matches!(call, OutputCall::Pause))
    }

    pub fn load_count(&self) -> usize {
        self.count(|call| matches!(call, OutputCall::Load(_)))
    }

    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    pub fn current_time_value(&self) -> f64 {
        self.state.borrow().current_time
    }

    pub fn analyser_creations(&self) -> usize {
        self.state.borrow().analyser_creations
    }

    pub fn release_count(&self) -> usize {
        self.state.borrow().release_count
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    fn count(&self, predicate: impl Fn(&OutputCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| predicate(c)).count()
    }
}

impl MediaOutput for FakeOutput {
    fn load(&mut self, url: &str, generation: Generation) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.fail_next_load.take() {
            return Err(PlaybackError::media(message));
        }
        state.calls.push(OutputCall::Load(url.to_string()));
        state.loaded_url = Some(url.to_string());
        state.generation = generation;
        state.current_time = 0.0;
        state.duration = 0.0;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(OutputCall::Play);
        match state.fail_next_play.take() {
            Some(message) => Err(PlaybackError::media(message)),
            None => Ok(()),
        }
    }

    fn pause(&mut self) {
        self.state.borrow_mut().calls.push(OutputCall::Pause);
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        state.calls.push(OutputCall::SetCurrentTime(seconds));
        state.current_time = seconds;
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(OutputCall::SetVolume(volume));
        state.volume = volume;
    }

    fn subscribe(&mut self, sender: Sender<OutputEvent>) -> SubscriptionId {
        self.state.borrow_mut().subscribers.subscribe(sender)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.state.borrow_mut().subscribers.unsubscribe(id);
    }

    fn create_analyser(&mut self, _fft_size: usize) -> Result<Box<dyn FrequencyAnalyser>> {
        let mut state = self.state.borrow_mut();
        match state.analyser_bins.clone() {
            Some(bins) => {
                state.analyser_creations += 1;
                Ok(Box::new(FakeAnalyser::new(bins)))
            }
            None => Err(PlaybackError::sync_unavailable("fake output has no audio graph")),
        }
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(OutputCall::Release);
        state.release_count += 1;
        state.loaded_url = None;
    }
}

// ===== Analyser =====

/// Analyser returning fixed magnitudes
pub struct FakeAnalyser {
    bins: Vec<u8>,
    reads: Rc<RefCell<usize>>,
}

impl FakeAnalyser {
    pub fn new(bins: Vec<u8>) -> Self {
        Self {
            bins,
            reads: Rc::new(RefCell::new(0)),
        }
    }

    /// Shared counter of `fill_frequency_data` calls
    pub fn reads(&self) -> Rc<RefCell<usize>> {
        Rc::clone(&self.reads)
    }
}

impl FrequencyAnalyser for FakeAnalyser {
    fn bin_count(&self) -> usize {
        self.bins.len()
    }

    fn fill_frequency_data(&mut self, out: &mut [u8]) {
        *self.reads.borrow_mut() += 1;
        for (slot, value) in out.iter_mut().zip(self.bins.iter().chain(std::iter::repeat(&0))) {
            *slot = *value;
        }
    }
}

// ===== Video =====

/// Command received by a [`FakeVideo`]
#[derive(Debug, Clone, PartialEq)]
pub enum VideoCall {
    Seek(f64),
    Play,
    Pause,
    SetMuted(bool),
}

#[derive(Default)]
struct VideoState {
    current_time: f64,
    muted: bool,
    playing: bool,
    fail_play: bool,
    calls: Vec<VideoCall>,
}

/// Scriptable [`VideoHandle`]
#[derive(Clone, Default)]
pub struct FakeVideo {
    state: Rc<RefCell<VideoState>>,
}

impl FakeVideo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the video clock (simulates natural playback drift)
    pub fn set_time(&self, seconds: f64) {
        self.state.borrow_mut().current_time = seconds;
    }

    /// Reject every play request
    pub fn reject_play(&self) {
        self.state.borrow_mut().fail_play = true;
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().current_time
    }

    pub fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn calls(&self) -> Vec<VideoCall> {
        self.state.borrow().calls.clone()
    }

    pub fn seek_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, VideoCall::Seek(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

impl VideoHandle for FakeVideo {
    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        state.calls.push(VideoCall::Seek(seconds));
        state.current_time = seconds;
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(VideoCall::Play);
        if state.fail_play {
            return Err(PlaybackError::media("video play rejected"));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(VideoCall::Pause);
        state.playing = false;
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state.borrow_mut();
        state.calls.push(VideoCall::SetMuted(muted));
        state.muted = muted;
    }
}

// ===== Scheduler =====

/// Kind of a [`FakeScheduler`] registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Frame,
    Interval(Duration),
    Timeout(Duration),
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    active: BTreeMap<u64, TimerKind>,
    cancelled: Vec<TimerId>,
    registrations: usize,
}

/// Manually fired [`Scheduler`]
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: TimerKind) -> TimerId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.registrations += 1;
        let id = state.next_id;
        state.active.insert(id, kind);
        TimerId::new(id)
    }

    /// Fire a registration
    ///
    /// One-shot timers (frames, timeouts) are consumed. Returns false when
    /// the id is not live.
    pub fn fire(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.active.get(&id.value()).copied() {
            Some(TimerKind::Interval(_)) => true,
            Some(_) => {
                state.active.remove(&id.value());
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.borrow().active.len()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.borrow().cancelled.len()
    }

    pub fn registrations(&self) -> usize {
        self.state.borrow().registrations
    }

    pub fn was_cancelled(&self, id: TimerId) -> bool {
        self.state.borrow().cancelled.contains(&id)
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.state.borrow().active.contains_key(&id.value())
    }

    pub fn active_frames(&self) -> Vec<TimerId> {
        self.active_matching(|kind| matches!(kind, TimerKind::Frame))
    }

    pub fn active_intervals(&self) -> Vec<TimerId> {
        self.active_matching(|kind| matches!(kind, TimerKind::Interval(_)))
    }

    pub fn active_timeouts(&self) -> Vec<TimerId> {
        self.active_matching(|kind| matches!(kind, TimerKind::Timeout(_)))
    }

    pub fn kind_of(&self, id: TimerId) -> Option<TimerKind> {
        self.state.borrow().active.get(&id.value()).copied()
    }

    fn active_matching(&self, predicate: impl Fn(&TimerKind) -> bool) -> Vec<TimerId> {
        self.state
            .borrow()
            .active
            .iter()
            .filter(|(_, kind)| predicate(kind))
            .map(|(id, _)| TimerId::new(*id))
            .collect()
    }
}

impl Scheduler for FakeScheduler {
    fn request_frame(&mut self) -> TimerId {
        self.register(TimerKind::Frame)
    }

    fn set_interval(&mut self, period: Duration) -> TimerId {
        self.register(TimerKind::Interval(period))
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.register(TimerKind::Timeout(delay))
    }

    fn cancel(&mut self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        if state.active.remove(&id.value()).is_some() {
            state.cancelled.push(id);
        }
    }
}
