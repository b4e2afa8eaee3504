//! Browser media handles
//!
//! [`WebMediaOutput`] drives an `<audio>` element, [`WebVideo`] a `<video>`
//! element, and [`WebAnalyser`] reads an `AnalyserNode` attached to the audio
//! element's signal.

use crate::error::{PlaybackError, Result};
use crate::output::{
    AppliedSource, FrequencyAnalyser, MediaOutput, OutputEvent, Subscribers, SubscriptionId,
    VideoHandle,
};
use crate::types::Generation;
use crossbeam_channel::Sender;
use js_sys::{Promise, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AnalyserNode, AudioContext, Event, HtmlMediaElement, MediaElementAudioSourceNode,
};

/// Called after an element event has been queued for the engine
pub type Notify = Rc<dyn Fn()>;

#[derive(Default)]
struct OutputShared {
    subscribers: Subscribers,
    /// Generation of the source currently on the element
    generation: Generation,
    /// Generation the last `play()` was issued for
    play_generation: Generation,
    notify: Option<Notify>,
}

impl OutputShared {
    /// Queue `event`; returns the notifier to call once the borrow is released
    fn emit(&mut self, event: &OutputEvent) -> Option<Notify> {
        self.subscribers.emit(event);
        self.notify.clone()
    }
}

type Listener = Closure<dyn FnMut(Event)>;

/// [`MediaOutput`] over an `HTMLMediaElement`
pub struct WebMediaOutput {
    element: HtmlMediaElement,
    shared: Rc<RefCell<OutputShared>>,
    listeners: Vec<(&'static str, Listener)>,
    play_rejected: Closure<dyn FnMut(JsValue)>,
}

impl WebMediaOutput {
    /// Wrap `element` and start listening to its media events
    pub fn new(element: HtmlMediaElement) -> Result<Self> {
        let shared = Rc::new(RefCell::new(OutputShared::default()));

        let mut listeners = Vec::new();
        for name in ["canplay", "loadedmetadata", "timeupdate", "ended", "error"] {
            let listener = element_listener(name, element.clone(), Rc::clone(&shared));
            element
                .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
                .map_err(|err| js_error("failed to register media listener", &err))?;
            listeners.push((name, listener));
        }

        let weak = Rc::downgrade(&shared);
        let play_rejected = Closure::wrap(Box::new(move |err: JsValue| {
            // A new load interrupts the previous play request; not a refusal
            if error_name(&err).as_deref() == Some("AbortError") {
                return;
            }
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let notify = {
                let mut shared = shared.borrow_mut();
                let event = OutputEvent::PlayRejected {
                    generation: shared.play_generation,
                    message: error_message(&err),
                };
                shared.emit(&event)
            };
            if let Some(notify) = notify {
                notify();
            }
        }) as Box<dyn FnMut(JsValue)>);

        Ok(Self {
            element,
            shared,
            listeners,
            play_rejected,
        })
    }

    /// Register the callback that pumps the engine after element events
    pub fn set_notify(&mut self, notify: Notify) {
        self.shared.borrow_mut().notify = Some(notify);
    }

    pub fn element(&self) -> &HtmlMediaElement {
        &self.element
    }

    fn remove_listeners(&mut self) {
        for (name, listener) in self.listeners.drain(..) {
            let _ = self
                .element
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
    }
}

impl MediaOutput for WebMediaOutput {
    fn load(&mut self, url: &str, generation: Generation) -> Result<()> {
        self.shared.borrow_mut().generation = generation;
        self.element.set_src(url);
        self.element.load();
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        {
            let mut shared = self.shared.borrow_mut();
            shared.play_generation = shared.generation;
        }
        let promise: Promise = self
            .element
            .play()
            .map_err(|err| js_error("play request refused", &err))?;
        let _ = promise.catch(&self.play_rejected);
        Ok(())
    }

    fn pause(&mut self) {
        let _ = self.element.pause();
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        let duration = self.element.duration();
        if duration.is_finite() {
            duration
        } else {
            0.0
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.element.set_volume(f64::from(volume));
    }

    fn subscribe(&mut self, sender: Sender<OutputEvent>) -> SubscriptionId {
        self.shared.borrow_mut().subscribers.subscribe(sender)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.shared.borrow_mut().subscribers.unsubscribe(id);
    }

    fn create_analyser(&mut self, fft_size: usize) -> Result<Box<dyn FrequencyAnalyser>> {
        let analyser = WebAnalyser::attach(&self.element, fft_size)?;
        Ok(Box::new(analyser))
    }

    fn release(&mut self) {
        let _ = self.element.pause();
        self.remove_listeners();
        self.shared.borrow_mut().notify = None;
        let _ = self.element.remove_attribute("src");
        self.element.load();
    }
}

impl Drop for WebMediaOutput {
    fn drop(&mut self) {
        self.remove_listeners();
    }
}

fn element_listener(
    name: &'static str,
    element: HtmlMediaElement,
    shared: Rc<RefCell<OutputShared>>,
) -> Listener {
    Closure::wrap(Box::new(move |_event: Event| {
        let notify = {
            let mut shared = shared.borrow_mut();
            let generation = shared.generation;
            let event = match name {
                "canplay" => OutputEvent::CanPlay { generation },
                "loadedmetadata" => OutputEvent::MetadataLoaded {
                    generation,
                    duration_secs: element.duration(),
                },
                "timeupdate" => OutputEvent::TimeUpdate {
                    generation,
                    position_secs: element.current_time(),
                },
                "ended" => OutputEvent::Ended { generation },
                _ => OutputEvent::Error {
                    generation,
                    message: element
                        .error()
                        .map(|err| format!("media error {}: {}", err.code(), err.message()))
                        .unwrap_or_else(|| "media error".to_string()),
                },
            };
            shared.emit(&event)
        };
        if let Some(notify) = notify {
            notify();
        }
    }) as Box<dyn FnMut(Event)>)
}

// ===== Video =====

/// [`VideoHandle`] over a `<video>` element
pub struct WebVideo {
    element: HtmlMediaElement,
    source: RefCell<AppliedSource>,
    play_rejected: Closure<dyn FnMut(JsValue)>,
}

impl WebVideo {
    pub fn new(element: HtmlMediaElement) -> Self {
        let play_rejected = Closure::wrap(Box::new(move |err: JsValue| {
            debug!(error = %error_message(&err), "video play rejected");
        }) as Box<dyn FnMut(JsValue)>);

        Self {
            element,
            source: RefCell::new(AppliedSource::new()),
            play_rejected,
        }
    }

    /// Point the element at a new video locator
    ///
    /// Re-applying the same locator is a no-op; setting `src` restarts the load.
    pub fn set_source(&self, url: &str) {
        if self.source.borrow_mut().apply(url) {
            self.element.set_src(url);
        }
    }
}

impl VideoHandle for WebVideo {
    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn play(&mut self) -> Result<()> {
        let promise = self
            .element
            .play()
            .map_err(|err| js_error("video play refused", &err))?;
        let _ = promise.catch(&self.play_rejected);
        Ok(())
    }

    fn pause(&mut self) {
        let _ = self.element.pause();
    }

    fn set_muted(&mut self, muted: bool) {
        self.element.set_muted(muted);
    }
}

// ===== Analyser =====

/// [`FrequencyAnalyser`] over a Web Audio `AnalyserNode`
///
/// Routing an element through `createMediaElementSource` is possible only
/// once per element, which is why the engine caches the analyser.
pub struct WebAnalyser {
    node: AnalyserNode,
    _source: MediaElementAudioSourceNode,
    _context: AudioContext,
}

impl WebAnalyser {
    fn attach(element: &HtmlMediaElement, fft_size: usize) -> Result<Self> {
        let unavailable = |err: JsValue| {
            PlaybackError::sync_unavailable(error_message(&err))
        };

        let context = AudioContext::new().map_err(unavailable)?;
        let node = context.create_analyser().map_err(unavailable)?;
        let source = context
            .create_media_element_source(element)
            .map_err(unavailable)?;

        node.set_fft_size(u32::try_from(fft_size).unwrap_or(256));
        source.connect_with_audio_node(&node).map_err(unavailable)?;
        node.connect_with_audio_node(&context.destination())
            .map_err(unavailable)?;

        debug!(fft_size, "web audio analyser attached");
        Ok(Self {
            node,
            _source: source,
            _context: context,
        })
    }
}

impl FrequencyAnalyser for WebAnalyser {
    fn bin_count(&self) -> usize {
        self.node.frequency_bin_count() as usize
    }

    fn fill_frequency_data(&mut self, out: &mut [u8]) {
        self.node.get_byte_frequency_data(out);
    }
}

// ===== Helpers =====

fn error_name(err: &JsValue) -> Option<String> {
    Reflect::get(err, &JsValue::from_str("name"))
        .ok()
        .and_then(|name| name.as_string())
}

fn error_message(err: &JsValue) -> String {
    Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

fn js_error(context: &str, err: &JsValue) -> PlaybackError {
    PlaybackError::media(format!("{context}: {}", error_message(err)))
}
