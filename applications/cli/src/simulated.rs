//! Simulated media handles driven by a virtual clock
//!
//! [`SimulatedOutput`] behaves like a media element whose sources all have
//! the same length: a load becomes playable on the next tick, a playing
//! source advances by the tick length and reports `Ended` at its end.
//! Sources that are not `http(s)://` or `file://` fail to load.

use crossbeam_channel::Sender;
use encore_playback::{
    Generation, MediaOutput, OutputEvent, PlaybackError, Result, Subscribers, SubscriptionId,
    VideoHandle,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Empty,
    Pending,
    Broken,
    Ready,
}

struct OutputState {
    subscribers: Subscribers,
    generation: Generation,
    source: Source,
    url: Option<String>,
    playing: bool,
    position: f64,
    duration: f64,
    volume: f32,
}

/// Virtual-clock [`MediaOutput`]
#[derive(Clone)]
pub struct SimulatedOutput {
    state: Rc<RefCell<OutputState>>,
    track_length: f64,
}

impl SimulatedOutput {
    /// Every loaded source lasts `track_length` seconds
    pub fn new(track_length: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(OutputState {
                subscribers: Subscribers::new(),
                generation: Generation::INITIAL,
                source: Source::Empty,
                url: None,
                playing: false,
                position: 0.0,
                duration: 0.0,
                volume: 1.0,
            })),
            track_length,
        }
    }

    /// Advance the virtual clock by `seconds`
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        let generation = state.generation;

        match state.source {
            Source::Empty => {}
            Source::Pending => {
                state.source = Source::Ready;
                state.duration = self.track_length;
                let duration_secs = state.duration;
                state.subscribers.emit(&OutputEvent::MetadataLoaded {
                    generation,
                    duration_secs,
                });
                state.subscribers.emit(&OutputEvent::CanPlay { generation });
            }
            Source::Broken => {
                state.source = Source::Empty;
                let message = format!(
                    "unsupported source {}",
                    state.url.as_deref().unwrap_or_default()
                );
                state
                    .subscribers
                    .emit(&OutputEvent::Error { generation, message });
            }
            Source::Ready if state.playing => {
                state.position = (state.position + seconds).min(state.duration);
                let position_secs = state.position;
                state.subscribers.emit(&OutputEvent::TimeUpdate {
                    generation,
                    position_secs,
                });
                if state.position >= state.duration {
                    state.playing = false;
                    state.subscribers.emit(&OutputEvent::Ended { generation });
                }
            }
            Source::Ready => {}
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }
}

impl MediaOutput for SimulatedOutput {
    fn load(&mut self, url: &str, generation: Generation) -> Result<()> {
        let supported = ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));

        let mut state = self.state.borrow_mut();
        state.generation = generation;
        state.url = Some(url.to_string());
        state.source = if supported {
            Source::Pending
        } else {
            Source::Broken
        };
        state.playing = false;
        state.position = 0.0;
        state.duration = 0.0;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.source != Source::Ready {
            return Err(PlaybackError::media("no playable source loaded"));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().playing = false;
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().position
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        state.position = seconds.clamp(0.0, state.duration.max(0.0));
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.borrow_mut().volume = volume;
    }

    fn subscribe(&mut self, sender: Sender<OutputEvent>) -> SubscriptionId {
        self.state.borrow_mut().subscribers.subscribe(sender)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.state.borrow_mut().subscribers.unsubscribe(id);
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        state.playing = false;
        state.source = Source::Empty;
        state.url = None;
    }
}

/// Video whose clock runs slightly fast or slow relative to the audio
#[derive(Clone)]
pub struct SimulatedVideo {
    state: Rc<RefCell<VideoState>>,
}

struct VideoState {
    position: f64,
    playing: bool,
    muted: bool,
    rate: f64,
}

impl SimulatedVideo {
    /// `drift` is the relative clock error (0.02 runs 2% fast)
    pub fn new(drift: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(VideoState {
                position: 0.0,
                playing: false,
                muted: false,
                rate: 1.0 + drift,
            })),
        }
    }

    pub fn advance(&self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        if state.playing {
            state.position += seconds * state.rate;
        }
    }

    pub fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }
}

impl VideoHandle for SimulatedVideo {
    fn current_time(&self) -> f64 {
        self.state.borrow().position
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.state.borrow_mut().position = seconds;
    }

    fn play(&mut self) -> Result<()> {
        self.state.borrow_mut().playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().playing = false;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.borrow_mut().muted = muted;
    }
}
