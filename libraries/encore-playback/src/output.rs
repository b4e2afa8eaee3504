//! Platform-agnostic media output traits
//!
//! Abstracts the playback handles the engine drives (an `<audio>` element in
//! the browser, a simulated clock in the CLI, fakes in tests).
//!
//! Outputs report what happens to a loaded source through [`OutputEvent`]s
//! sent to subscribers. Every event carries the [`Generation`] of the load it
//! belongs to, so the engine can drop callbacks from sources the user has
//! already navigated away from.

use crate::error::{PlaybackError, Result};
use crate::types::Generation;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::rc::Rc;

/// Notification from a media output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Enough data is buffered to start playing
    CanPlay { generation: Generation },

    /// Duration is known
    MetadataLoaded {
        generation: Generation,
        duration_secs: f64,
    },

    /// Media clock advanced
    TimeUpdate {
        generation: Generation,
        position_secs: f64,
    },

    /// Source played to its end
    Ended { generation: Generation },

    /// Source could not be loaded or decoded
    Error {
        generation: Generation,
        message: String,
    },

    /// A play request was rejected after the fact (e.g. autoplay policy)
    PlayRejected {
        generation: Generation,
        message: String,
    },
}

impl OutputEvent {
    /// Generation of the load this event belongs to
    pub fn generation(&self) -> Generation {
        match self {
            OutputEvent::CanPlay { generation }
            | OutputEvent::MetadataLoaded { generation, .. }
            | OutputEvent::TimeUpdate { generation, .. }
            | OutputEvent::Ended { generation }
            | OutputEvent::Error { generation, .. }
            | OutputEvent::PlayRejected { generation, .. } => *generation,
        }
    }
}

/// Handle returned by [`MediaOutput::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The primary (audio) playback handle
///
/// The engine is the only caller allowed to touch `src`, `currentTime` and
/// `volume` on the underlying element.
pub trait MediaOutput {
    /// Replace the current source
    ///
    /// Events for this source must be tagged with `generation`.
    fn load(&mut self, url: &str, generation: Generation) -> Result<()>;

    /// Start or resume playback of the loaded source
    ///
    /// An immediate refusal is returned as an error; a refusal that arrives
    /// later is reported as [`OutputEvent::PlayRejected`].
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Current media clock in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    /// Length of the loaded source in seconds (0 when unknown)
    fn duration(&self) -> f64;

    /// Volume in [0, 1]
    fn set_volume(&mut self, volume: f32);

    fn subscribe(&mut self, sender: Sender<OutputEvent>) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Build a frequency analyser on top of this output's signal
    ///
    /// The engine calls this at most once per output. Platforms without an
    /// audio graph keep the default.
    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn FrequencyAnalyser>> {
        let _ = fft_size;
        Err(PlaybackError::sync_unavailable(
            "audio analysis not supported by this output",
        ))
    }

    /// Stop and drop the source; called once on engine teardown
    fn release(&mut self) {
        self.pause();
    }
}

/// Secondary, muted video handle driven by the synchronizer
pub trait VideoHandle {
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);
}

/// Live frequency-domain view of the output signal
pub trait FrequencyAnalyser {
    /// Number of frequency bins
    fn bin_count(&self) -> usize;

    /// Copy the latest magnitudes (0-255) into `out`
    fn fill_frequency_data(&mut self, out: &mut [u8]);
}

/// Analyser shared between the engine (owner) and visualization feeds
pub type SharedAnalyser = Rc<RefCell<Box<dyn FrequencyAnalyser>>>;

/// Subscriber list for output implementations
///
/// Disconnected subscribers are pruned on the next emit.
#[derive(Debug, Default)]
pub struct Subscribers {
    next_id: u64,
    senders: Vec<(SubscriptionId, Sender<OutputEvent>)>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sender: Sender<OutputEvent>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.senders.push((id, sender));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.senders.retain(|(existing, _)| *existing != id);
    }

    pub fn emit(&mut self, event: &OutputEvent) {
        self.senders
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Last source locator handed to a media element
///
/// Elements report their source resolved to an absolute URL, so it cannot be
/// compared with the locator that was set. Track the locator instead.
#[derive(Debug, Default)]
pub struct AppliedSource {
    url: Option<String>,
}

impl AppliedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`; true when it differs from the last one applied
    pub fn apply(&mut self, url: &str) -> bool {
        if self.url.as_deref() == Some(url) {
            return false;
        }
        self.url = Some(url.to_string());
        true
    }

    pub fn current(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn emit_reaches_every_subscriber() {
        let mut subscribers = Subscribers::new();
        let (tx1, rx1) = unbounded();
        let (tx2, rx2) = unbounded();
        subscribers.subscribe(tx1);
        subscribers.subscribe(tx2);

        let event = OutputEvent::Ended {
            generation: Generation::from(3),
        };
        subscribers.emit(&event);

        assert_eq!(rx1.try_recv().unwrap(), event);
        assert_eq!(rx2.try_recv().unwrap(), event);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut subscribers = Subscribers::new();
        let (tx, rx) = unbounded();
        let id = subscribers.subscribe(tx);
        subscribers.unsubscribe(id);

        subscribers.emit(&OutputEvent::CanPlay {
            generation: Generation::INITIAL,
        });
        assert!(rx.try_recv().is_err());
        assert!(subscribers.is_empty());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subscribers = Subscribers::new();
        let (tx, rx) = unbounded();
        subscribers.subscribe(tx);
        drop(rx);

        subscribers.emit(&OutputEvent::CanPlay {
            generation: Generation::INITIAL,
        });
        assert_eq!(subscribers.len(), 0);
    }

    #[test]
    fn applied_source_changes_only_on_new_locator() {
        let mut source = AppliedSource::new();

        assert!(source.apply("/media/a.mp4"));
        assert!(!source.apply("/media/a.mp4"));
        assert!(!source.apply("/media/a.mp4"));
        assert!(source.apply("/media/b.mp4"));
        assert_eq!(source.current(), Some("/media/b.mp4"));
    }

    #[test]
    fn event_generation_accessor() {
        let event = OutputEvent::TimeUpdate {
            generation: Generation::from(9),
            position_secs: 1.0,
        };
        assert_eq!(event.generation().value(), 9);
    }
}
