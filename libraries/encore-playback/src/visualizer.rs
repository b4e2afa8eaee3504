//! Frequency visualization feed
//!
//! Pulls a fixed-size array of frequency magnitudes from the engine's shared
//! analyser once per animation frame while audio is playing. No frame is
//! requested while paused; the loop restarts on the next play.
//!
//! Purely cosmetic: without an analyser the feed is inert and every call is a
//! no-op.

use crate::error::Result;
use crate::output::SharedAnalyser;
use crate::scheduler::{Scheduler, TimerId, TimerSlot};
use serde::Serialize;
use tracing::debug;

/// One bar of the spectrum display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    /// Left edge
    pub x: f64,
    /// Top edge (bars grow up from the bottom)
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Color hue in degrees, spread over the spectrum
    pub hue: f64,
}

pub struct VisualizationFeed<S: Scheduler> {
    analyser: Option<SharedAnalyser>,
    scheduler: S,
    frame: TimerSlot,
    bins: Vec<u8>,
    playing: bool,
    frames: u64,
}

impl<S: Scheduler> VisualizationFeed<S> {
    /// Build a feed from the engine's analyser
    ///
    /// Pass the result of [`crate::PlaybackEngine::analyser`] straight in; an
    /// error produces an inert feed.
    pub fn new(analyser: Result<SharedAnalyser>, scheduler: S) -> Self {
        let analyser = match analyser {
            Ok(analyser) => Some(analyser),
            Err(err) => {
                debug!(error = %err, "visualizer disabled");
                None
            }
        };
        let bin_count = analyser
            .as_ref()
            .map_or(0, |analyser| analyser.borrow().bin_count());

        Self {
            analyser,
            scheduler,
            frame: TimerSlot::new(),
            bins: vec![0; bin_count],
            playing: false,
            frames: 0,
        }
    }

    /// Follow the engine's playing flag
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;

        if !playing {
            self.frame.cancel(&mut self.scheduler);
            return;
        }
        if self.analyser.is_some() && !self.frame.is_armed() {
            self.request_frame();
        }
    }

    /// Animation frame callback; returns true when the bins were refreshed
    pub fn on_frame(&mut self, id: TimerId) -> bool {
        if !self.frame.fired(id) || !self.playing {
            return false;
        }
        let Some(ref analyser) = self.analyser else {
            return false;
        };

        analyser.borrow_mut().fill_frequency_data(&mut self.bins);
        self.frames += 1;
        self.request_frame();
        true
    }

    /// Latest magnitudes (0-255), one per bin
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Whether an analyser is attached
    pub fn is_available(&self) -> bool {
        self.analyser.is_some()
    }

    /// Whether a frame is currently requested
    pub fn is_running(&self) -> bool {
        self.frame.is_armed()
    }

    /// Frames rendered since creation
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bar layout of the latest bins on a `width` x `height` canvas
    ///
    /// Bars are 2.5x the even share of the width with a 1px gap, so the upper
    /// (mostly silent) part of the spectrum runs off the right edge.
    pub fn bars(&self, width: f64, height: f64) -> Vec<Bar> {
        let count = self.bins.len();
        if count == 0 {
            return Vec::new();
        }

        let bar_width = width / count as f64 * 2.5;
        let mut x = 0.0;
        self.bins
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let bar_height = f64::from(value) / 255.0 * height * 0.8;
                let bar = Bar {
                    x,
                    y: height - bar_height,
                    width: bar_width,
                    height: bar_height,
                    hue: i as f64 / count as f64 * 360.0,
                };
                x += bar_width + 1.0;
                bar
            })
            .collect()
    }

    fn request_frame(&mut self) {
        let id = self.scheduler.request_frame();
        self.frame.arm(&mut self.scheduler, id);
    }
}

impl<S: Scheduler> Drop for VisualizationFeed<S> {
    fn drop(&mut self) {
        self.frame.cancel(&mut self.scheduler);
    }
}
