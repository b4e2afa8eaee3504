//! WASM-compatible PlaybackEngine wrapper

use super::output::{Notify, WebMediaOutput, WebVideo};
use super::scheduler::{Dispatch, WebScheduler};
use crate::{
    format::format_time, ControlsVisibility, MediaSynchronizer, PlaybackEngine, PlaybackError,
    PlaybackEvent, PlaybackMode, PlaybackState, PlayerConfig, RepeatMode, TimerId, Track,
    VisualizationFeed,
};
use js_sys::Function;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;
use wasm_bindgen::prelude::*;
use web_sys::HtmlMediaElement;

/// Something JS listeners must hear about, collected while the session is
/// borrowed and delivered after the borrow ends
enum Notice {
    State(PlaybackState),
    Track(Track),
    Position { position_secs: f64, duration_secs: f64 },
    Volume(f32),
    Mode(PlaybackMode),
    Queue(usize),
    Error(String),
    Frame(Vec<u8>),
    Controls(bool),
    Navigate,
}

#[derive(Default)]
struct Callbacks {
    on_state_change: Option<Function>,
    on_track_change: Option<Function>,
    on_position: Option<Function>,
    on_volume_change: Option<Function>,
    on_mode_change: Option<Function>,
    on_queue_change: Option<Function>,
    on_error: Option<Function>,
    on_frame: Option<Function>,
    on_controls_change: Option<Function>,
    on_navigate: Option<Function>,
}

/// Everything driven by one `<audio>` element
struct Session {
    engine: PlaybackEngine<WebMediaOutput>,
    scheduler: WebScheduler,
    sync: MediaSynchronizer<WebVideo, WebScheduler>,
    visualizer: Option<VisualizationFeed<WebScheduler>>,
    controls: ControlsVisibility<WebScheduler>,
    navigate_requested: Rc<Cell<bool>>,
    notices: Vec<Notice>,
}

impl Session {
    /// Apply queued output events and bring every follower up to date
    fn pump(&mut self) {
        self.engine.process_events();

        let clock = self.engine.clock();
        if let (Some(video), Some(url)) = (self.sync.video(), clock.video_url.as_deref()) {
            video.set_source(url);
        }
        self.sync.sync(&clock);

        let playing = self.engine.is_playing();
        if let Some(ref mut visualizer) = self.visualizer {
            visualizer.set_playing(playing);
        }

        for event in self.engine.drain_events() {
            if let Some(notice) = self.notice_for(event) {
                self.notices.push(notice);
            }
        }
        if self.navigate_requested.replace(false) {
            self.notices.push(Notice::Navigate);
        }
    }

    fn on_timer(&mut self, id: TimerId) {
        let clock = self.engine.clock();
        if self.sync.on_timer(id, &clock) {
            return;
        }

        if let Some(ref mut visualizer) = self.visualizer {
            if visualizer.on_frame(id) {
                self.notices.push(Notice::Frame(visualizer.bins().to_vec()));
                return;
            }
        }

        if self.controls.on_timeout(id, self.engine.is_playing()) {
            self.notices.push(Notice::Controls(self.controls.is_visible()));
        }
    }

    fn notice_for(&self, event: PlaybackEvent) -> Option<Notice> {
        let notice = match event {
            PlaybackEvent::StateChanged { state } => Notice::State(state),
            PlaybackEvent::TrackChanged { .. } => {
                Notice::Track(self.engine.current_track()?.clone())
            }
            PlaybackEvent::PositionUpdate {
                position_secs,
                duration_secs,
            } => Notice::Position {
                position_secs,
                duration_secs,
            },
            PlaybackEvent::VolumeChanged { volume } => Notice::Volume(volume),
            PlaybackEvent::ModeChanged { mode } => Notice::Mode(mode),
            PlaybackEvent::QueueChanged { length } => Notice::Queue(length),
            PlaybackEvent::Error { message } => Notice::Error(message),
            PlaybackEvent::TrackFinished { .. } => return None,
        };
        Some(notice)
    }
}

/// Shared between the facade and the element/timer callbacks
struct Link {
    session: RefCell<Weak<RefCell<Session>>>,
    callbacks: RefCell<Callbacks>,
}

impl Link {
    /// Run `f` against the session, then deliver what it produced
    ///
    /// Returns `None` when the session is gone or already borrowed further up
    /// the stack; whoever holds the borrow pumps before returning.
    fn run<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let session = self.session.borrow().upgrade()?;
        let (result, notices) = {
            let mut session = session.try_borrow_mut().ok()?;
            let result = f(&mut session);
            session.pump();
            (result, std::mem::take(&mut session.notices))
        };

        for notice in notices {
            self.deliver(notice);
        }
        Some(result)
    }

    fn deliver(&self, notice: Notice) {
        let callbacks = self.callbacks.borrow();
        let (callback, argument) = match notice {
            Notice::State(state) => (&callbacks.on_state_change, JsValue::from_str(state_name(state))),
            Notice::Track(track) => (&callbacks.on_track_change, to_js_value(&track)),
            Notice::Position {
                position_secs,
                duration_secs,
            } => (
                &callbacks.on_position,
                to_js_value(&PositionPayload {
                    position: position_secs,
                    duration: duration_secs,
                }),
            ),
            Notice::Volume(volume) => (&callbacks.on_volume_change, JsValue::from_f64(f64::from(volume))),
            Notice::Mode(mode) => (&callbacks.on_mode_change, to_js_value(&mode)),
            Notice::Queue(length) => (&callbacks.on_queue_change, JsValue::from_f64(length as f64)),
            Notice::Error(message) => (&callbacks.on_error, JsValue::from_str(&message)),
            Notice::Frame(bins) => (
                &callbacks.on_frame,
                js_sys::Uint8Array::from(bins.as_slice()).into(),
            ),
            Notice::Controls(visible) => (&callbacks.on_controls_change, JsValue::from_bool(visible)),
            Notice::Navigate => (&callbacks.on_navigate, JsValue::UNDEFINED),
        };

        // Listeners may register other listeners
        let callback = callback.clone();
        drop(callbacks);
        if let Some(callback) = callback {
            callback.call1(&JsValue::NULL, &argument).ok();
        }
    }
}

/// WASM-compatible playback engine
///
/// Wraps [`PlaybackEngine`] around an `<audio>` element together with the
/// video synchronizer, the visualizer feed and the controls auto-hide timer.
#[wasm_bindgen]
pub struct WasmPlaybackEngine {
    session: Rc<RefCell<Session>>,
    link: Rc<Link>,
}

#[wasm_bindgen]
impl WasmPlaybackEngine {
    /// Create an engine driving `audio`
    ///
    /// `config` is an optional object in the shape of `PlayerConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(audio: HtmlMediaElement, config: JsValue) -> Result<WasmPlaybackEngine, JsValue> {
        console_error_panic_hook::set_once();

        let config: PlayerConfig = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?
        };
        config.validate().map_err(to_js_error)?;

        let link = Rc::new(Link {
            session: RefCell::new(Weak::new()),
            callbacks: RefCell::new(Callbacks::default()),
        });

        let notify: Notify = {
            let link = Rc::downgrade(&link);
            Rc::new(move || {
                if let Some(link) = link.upgrade() {
                    link.run(|_| ());
                }
            })
        };
        let dispatch: Dispatch = {
            let link = Rc::downgrade(&link);
            Rc::new(move |id| {
                if let Some(link) = link.upgrade() {
                    link.run(|session| session.on_timer(id));
                }
            })
        };

        let mut output = WebMediaOutput::new(audio).map_err(to_js_error)?;
        output.set_notify(notify);
        let scheduler = WebScheduler::new(dispatch);

        let navigate_requested = Rc::new(Cell::new(false));
        let mut engine = PlaybackEngine::new(output, &config);
        {
            let flag = Rc::clone(&navigate_requested);
            engine.set_navigation_handler(move || flag.set(true));
        }

        let session = Rc::new(RefCell::new(Session {
            engine,
            sync: MediaSynchronizer::new(scheduler.clone(), config.sync.clone()),
            controls: ControlsVisibility::new(scheduler.clone(), config.controls.clone()),
            scheduler,
            visualizer: None,
            navigate_requested,
            notices: Vec::new(),
        }));
        *link.session.borrow_mut() = Rc::downgrade(&session);

        Ok(Self { session, link })
    }

    // ===== Queue =====

    /// Play a single track (`{id, title, artist, audio_url, ...}`)
    #[wasm_bindgen(js_name = playTrack)]
    pub fn play_track(&self, track: JsValue) -> Result<(), JsValue> {
        let track: Track = from_js_value(track)?;
        self.command(|session| session.engine.play_track(track))
    }

    /// Replace the queue and start at `start_index`
    #[wasm_bindgen(js_name = playQueue)]
    pub fn play_queue(&self, tracks: JsValue, start_index: usize) -> Result<(), JsValue> {
        let tracks: Vec<Track> = from_js_value(tracks)?;
        self.command(|session| session.engine.play_queue(tracks, start_index))
    }

    /// Skip to track at queue index
    #[wasm_bindgen(js_name = skipTo)]
    pub fn skip_to(&self, index: usize) -> Result<(), JsValue> {
        self.command(|session| session.engine.skip_to(index))
    }

    #[wasm_bindgen(js_name = playNext)]
    pub fn play_next(&self) -> Result<(), JsValue> {
        self.command(|session| session.engine.play_next())
    }

    #[wasm_bindgen(js_name = playPrevious)]
    pub fn play_previous(&self) -> Result<(), JsValue> {
        self.command(|session| session.engine.play_previous())
    }

    // ===== Transport =====

    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&self) -> Result<(), JsValue> {
        self.command(|session| session.engine.toggle_play())
    }

    /// Seek to position in seconds
    #[wasm_bindgen(js_name = seekTo)]
    pub fn seek_to(&self, position_secs: f64) -> Result<(), JsValue> {
        self.command(|session| session.engine.seek_to(position_secs))
    }

    /// Set volume (0.0 - 1.0)
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f32) -> Result<(), JsValue> {
        self.command(|session| {
            session.engine.set_volume(volume);
            Ok(())
        })
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) -> Result<(), JsValue> {
        self.command(|session| {
            session.engine.toggle_mute();
            Ok(())
        })
    }

    // ===== Shuffle & Repeat =====

    #[wasm_bindgen(js_name = toggleShuffle)]
    pub fn toggle_shuffle(&self) -> Result<(), JsValue> {
        self.command(|session| {
            session.engine.toggle_shuffle();
            Ok(())
        })
    }

    #[wasm_bindgen(js_name = toggleRepeat)]
    pub fn toggle_repeat(&self) -> Result<(), JsValue> {
        self.command(|session| {
            session.engine.toggle_repeat();
            Ok(())
        })
    }

    /// Set repeat mode ("off" | "all" | "one")
    #[wasm_bindgen(js_name = setRepeat)]
    pub fn set_repeat(&self, mode: &str) -> Result<(), JsValue> {
        let repeat = match mode {
            "off" => RepeatMode::Off,
            "all" => RepeatMode::All,
            "one" => RepeatMode::One,
            _ => return Err(JsValue::from_str("Invalid repeat mode. Use 'off', 'all', or 'one'")),
        };
        self.command(|session| {
            session.engine.set_repeat(repeat);
            Ok(())
        })
    }

    // ===== State Queries =====

    /// Get current playback state as string
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        self.read(|session| state_name(session.engine.state()).to_string())
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.read(|session| session.engine.is_playing())
    }

    /// Get current position in seconds
    #[wasm_bindgen(js_name = getPosition)]
    pub fn get_position(&self) -> f64 {
        self.read(|session| session.engine.position_secs())
    }

    /// Get duration of current track in seconds (0 until known)
    #[wasm_bindgen(js_name = getDuration)]
    pub fn get_duration(&self) -> f64 {
        self.read(|session| session.engine.duration_secs())
    }

    #[wasm_bindgen(js_name = getVolume)]
    pub fn get_volume(&self) -> f32 {
        self.read(|session| session.engine.volume())
    }

    #[wasm_bindgen(js_name = getCurrentTrack)]
    pub fn get_current_track(&self) -> JsValue {
        self.read(|session| {
            session
                .engine
                .current_track()
                .map_or(JsValue::NULL, to_js_value)
        })
    }

    #[wasm_bindgen(js_name = getCurrentIndex)]
    pub fn get_current_index(&self) -> Option<usize> {
        self.read(|session| session.engine.current_index())
    }

    /// Get all tracks in queue (play order)
    #[wasm_bindgen(js_name = getQueue)]
    pub fn get_queue(&self) -> JsValue {
        self.read(|session| to_js_value(&session.engine.queue().tracks()))
    }

    #[wasm_bindgen(js_name = canPlayNext)]
    pub fn can_play_next(&self) -> bool {
        self.read(|session| session.engine.can_play_next())
    }

    #[wasm_bindgen(js_name = canPlayPrevious)]
    pub fn can_play_previous(&self) -> bool {
        self.read(|session| session.engine.can_play_previous())
    }

    #[wasm_bindgen(js_name = getShuffle)]
    pub fn get_shuffle(&self) -> bool {
        self.read(|session| session.engine.mode().shuffle)
    }

    /// Get current repeat mode
    #[wasm_bindgen(js_name = getRepeat)]
    pub fn get_repeat(&self) -> String {
        self.read(|session| match session.engine.mode().repeat {
            RepeatMode::Off => "off".to_string(),
            RepeatMode::All => "all".to_string(),
            RepeatMode::One => "one".to_string(),
        })
    }

    // ===== Video Sync =====

    /// Start driving `video` from the audio clock; returns false when the
    /// current track has no video
    #[wasm_bindgen(js_name = openVideo)]
    pub fn open_video(&self, video: HtmlMediaElement) -> bool {
        self.link
            .run(|session| {
                let clock = session.engine.clock();
                let video = WebVideo::new(video);
                if let Some(url) = clock.video_url.as_deref() {
                    video.set_source(url);
                }
                match session.sync.open(video, &clock) {
                    Ok(()) => true,
                    Err(err) => {
                        debug!(error = %err, "video sync unavailable");
                        false
                    }
                }
            })
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = closeVideo)]
    pub fn close_video(&self) {
        self.link.run(|session| {
            session.sync.close();
        });
    }

    // ===== Visualizer =====

    /// Start the frequency feed; returns false when analysis is unavailable
    #[wasm_bindgen(js_name = enableVisualizer)]
    pub fn enable_visualizer(&self) -> bool {
        self.link
            .run(|session| {
                let analyser = session.engine.analyser();
                let feed = VisualizationFeed::new(analyser, session.scheduler.clone());
                let available = feed.is_available();
                session.visualizer = Some(feed);
                available
            })
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = disableVisualizer)]
    pub fn disable_visualizer(&self) {
        self.link.run(|session| session.visualizer = None);
    }

    /// Latest frequency magnitudes (empty when disabled)
    #[wasm_bindgen(js_name = getFrequencyData)]
    pub fn get_frequency_data(&self) -> Vec<u8> {
        self.read(|session| {
            session
                .visualizer
                .as_ref()
                .map(|feed| feed.bins().to_vec())
                .unwrap_or_default()
        })
    }

    /// Bar rectangles for a `width` x `height` canvas
    #[wasm_bindgen(js_name = getBars)]
    pub fn get_bars(&self, width: f64, height: f64) -> JsValue {
        self.read(|session| {
            session
                .visualizer
                .as_ref()
                .map_or(JsValue::NULL, |feed| to_js_value(&feed.bars(width, height)))
        })
    }

    // ===== Controls =====

    /// Pointer activity over the video view
    #[wasm_bindgen(js_name = controlsActivity)]
    pub fn controls_activity(&self) {
        self.link.run(|session| {
            let was_visible = session.controls.is_visible();
            session.controls.activity();
            if !was_visible {
                session.notices.push(Notice::Controls(true));
            }
        });
    }

    #[wasm_bindgen(js_name = controlsVisible)]
    pub fn controls_visible(&self) -> bool {
        self.read(|session| session.controls.is_visible())
    }

    // ===== Event Listeners =====

    /// Register state change callback (receives the state name)
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_state_change = Some(callback);
    }

    /// Register track change callback (receives the track)
    #[wasm_bindgen(js_name = onTrackChange)]
    pub fn on_track_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_track_change = Some(callback);
    }

    /// Register position callback (receives `{position, duration}`)
    #[wasm_bindgen(js_name = onPosition)]
    pub fn on_position(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_position = Some(callback);
    }

    #[wasm_bindgen(js_name = onVolumeChange)]
    pub fn on_volume_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_volume_change = Some(callback);
    }

    #[wasm_bindgen(js_name = onModeChange)]
    pub fn on_mode_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_mode_change = Some(callback);
    }

    /// Register queue change callback (receives the queue length)
    #[wasm_bindgen(js_name = onQueueChange)]
    pub fn on_queue_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_queue_change = Some(callback);
    }

    /// Register error callback
    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_error = Some(callback);
    }

    /// Register visualizer frame callback (receives a `Uint8Array`)
    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_frame = Some(callback);
    }

    #[wasm_bindgen(js_name = onControlsChange)]
    pub fn on_controls_change(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_controls_change = Some(callback);
    }

    /// Register the "show now playing" navigation callback
    #[wasm_bindgen(js_name = onNavigate)]
    pub fn on_navigate(&self, callback: Function) {
        self.link.callbacks.borrow_mut().on_navigate = Some(callback);
    }

    // ===== Teardown =====

    /// Release the audio element and cancel every timer
    pub fn dispose(&self) {
        self.link.run(|session| {
            session.sync.close();
            session.visualizer = None;
            session.controls.reset();
            session.engine.shutdown();
        });
        *self.link.callbacks.borrow_mut() = Callbacks::default();
    }

    // ===== Internals =====

    fn command(
        &self,
        f: impl FnOnce(&mut Session) -> crate::Result<()>,
    ) -> Result<(), JsValue> {
        match self.link.run(f) {
            Some(result) => result.map_err(to_js_error),
            None => Err(JsValue::from_str("Playback engine is busy")),
        }
    }

    fn read<R: Default>(&self, f: impl FnOnce(&Session) -> R) -> R {
        self.session
            .try_borrow()
            .map(|session| f(&session))
            .unwrap_or_default()
    }
}

/// Format seconds as `m:ss`
#[wasm_bindgen(js_name = formatTime)]
pub fn format_time_js(seconds: f64) -> String {
    format_time(seconds)
}

fn state_name(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Loading => "loading",
        PlaybackState::Ready => "ready",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
        PlaybackState::Ended => "ended",
    }
}

#[derive(serde::Serialize)]
struct PositionPayload {
    position: f64,
    duration: f64,
}

fn to_js_value<T: serde::Serialize + ?Sized>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn from_js_value<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse track data: {e}")))
}

fn to_js_error(error: PlaybackError) -> JsValue {
    JsValue::from_str(&error.to_string())
}
