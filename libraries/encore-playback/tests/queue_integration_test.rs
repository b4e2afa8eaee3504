//! Queue navigation integration tests
//!
//! Real-world scenarios: playing from a list, next/previous buttons,
//! shuffle and repeat toggles, end-of-track policy.

use encore_playback::testing::{FakeOutput, OutputCall};
use encore_playback::{
    PlaybackEngine, PlaybackError, PlaybackEvent, PlaybackState, PlayerConfig, RepeatMode,
    SeededShuffler, Track,
};
use std::cell::Cell;
use std::rc::Rc;

// ===== Test Helpers =====

fn create_track(id: &str) -> Track {
    Track::new(id, format!("Track {id}"), "Test Artist", format!("https://cdn/{id}.mp3"))
}

fn create_tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| create_track(id)).collect()
}

fn current_id(engine: &PlaybackEngine<FakeOutput>) -> String {
    engine
        .current_track()
        .map(|t| t.id.as_str().to_string())
        .unwrap_or_default()
}

fn queue_ids(engine: &PlaybackEngine<FakeOutput>) -> Vec<String> {
    engine
        .queue()
        .tracks()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect()
}

/// Engine playing `ids[start]` with the output ready
fn playing_engine(ids: &[&str], start: usize) -> (PlaybackEngine<FakeOutput>, FakeOutput) {
    let output = FakeOutput::new();
    let mut engine = PlaybackEngine::new(output.clone(), &PlayerConfig::default())
        .with_shuffler(Box::new(SeededShuffler::new(7)));
    engine.play_queue(create_tracks(ids), start).unwrap();
    output.emit_can_play();
    engine.process_events();
    assert_eq!(engine.state(), PlaybackState::Playing);
    (engine, output)
}

// ===== Queue Creation =====

#[test]
fn test_play_queue_starts_at_index() {
    let (engine, output) = playing_engine(&["1", "2", "3", "4", "5"], 2);

    assert_eq!(current_id(&engine), "3");
    assert_eq!(engine.current_index(), Some(2));
    assert!(engine.is_playing());
    assert_eq!(output.loaded_url().as_deref(), Some("https://cdn/3.mp3"));
    assert_eq!(engine.queue().len(), 5);
}

#[test]
fn test_play_track_replaces_queue() {
    let (mut engine, output) = playing_engine(&["a", "b", "c"], 1);

    engine.play_track(create_track("solo")).unwrap();

    assert_eq!(queue_ids(&engine), vec!["solo"]);
    assert_eq!(engine.current_index(), Some(0));
    assert!(engine.is_playing());
    assert_eq!(output.loaded_url().as_deref(), Some("https://cdn/solo.mp3"));
}

#[test]
fn test_play_queue_rejects_out_of_range_start() {
    let (mut engine, output) = playing_engine(&["a", "b"], 0);
    let loads = output.load_count();

    let err = engine.play_queue(create_tracks(&["x", "y"]), 2).unwrap_err();

    assert!(matches!(err, PlaybackError::InvalidIndex { index: 2, len: 2 }));
    assert_eq!(queue_ids(&engine), vec!["a", "b"]);
    assert_eq!(current_id(&engine), "a");
    assert_eq!(output.load_count(), loads);
}

#[test]
fn test_play_queue_rejects_empty_list() {
    let output = FakeOutput::new();
    let mut engine = PlaybackEngine::new(output.clone(), &PlayerConfig::default());

    assert!(matches!(
        engine.play_queue(Vec::new(), 0),
        Err(PlaybackError::InvalidIndex { index: 0, len: 0 })
    ));
    assert!(engine.current_track().is_none());
    assert_eq!(output.load_count(), 0);
}

#[test]
fn test_play_queue_rejects_track_without_audio() {
    let (mut engine, _output) = playing_engine(&["a"], 0);
    let mut tracks = create_tracks(&["x", "y"]);
    tracks[1].audio_url = String::new();

    let err = engine.play_queue(tracks, 0).unwrap_err();

    assert!(matches!(err, PlaybackError::MissingAudioUrl(ref id) if id.as_str() == "y"));
    assert_eq!(current_id(&engine), "a");
}

#[test]
fn test_play_queue_emits_queue_track_and_state_events() {
    let output = FakeOutput::new();
    let mut engine = PlaybackEngine::new(output, &PlayerConfig::default());

    engine.play_queue(create_tracks(&["a", "b"]), 1).unwrap();
    let events = engine.drain_events();

    assert!(matches!(events[0], PlaybackEvent::QueueChanged { length: 2 }));
    assert!(matches!(
        events[1],
        PlaybackEvent::TrackChanged {
            ref track_id,
            previous_track_id: None,
            index: 1,
        } if track_id.as_str() == "b"
    ));
    assert!(matches!(
        events[2],
        PlaybackEvent::StateChanged {
            state: PlaybackState::Loading
        }
    ));
}

// ===== Next / Previous =====

#[test]
fn test_next_until_end_then_wrap_with_repeat_all() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 0);

    engine.play_next().unwrap();
    engine.play_next().unwrap();
    assert_eq!(current_id(&engine), "C");
    assert_eq!(engine.current_index(), Some(2));

    // End of queue, repeat off: nothing happens
    let loads = output.load_count();
    engine.play_next().unwrap();
    assert_eq!(current_id(&engine), "C");
    assert!(engine.is_playing());
    assert_eq!(output.load_count(), loads);

    engine.set_repeat(RepeatMode::All);
    engine.play_next().unwrap();
    assert_eq!(current_id(&engine), "A");
    assert_eq!(engine.current_index(), Some(0));
    assert_eq!(output.load_count(), loads + 1);
}

#[test]
fn test_next_on_empty_queue_is_noop() {
    let output = FakeOutput::new();
    let mut engine = PlaybackEngine::new(output.clone(), &PlayerConfig::default());

    engine.play_next().unwrap();
    engine.play_previous().unwrap();

    assert!(engine.current_track().is_none());
    assert_eq!(output.load_count(), 0);
}

#[test]
fn test_previous_after_three_seconds_restarts_track() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 1);
    output.emit_time_update(5.0);
    engine.process_events();
    let loads = output.load_count();

    engine.play_previous().unwrap();

    assert_eq!(current_id(&engine), "B");
    assert_eq!(engine.position_secs(), 0.0);
    assert_eq!(output.current_time_value(), 0.0);
    assert_eq!(output.load_count(), loads);
}

#[test]
fn test_previous_near_start_goes_back() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 1);
    output.emit_time_update(1.0);
    engine.process_events();

    engine.play_previous().unwrap();

    assert_eq!(current_id(&engine), "A");
    assert_eq!(engine.current_index(), Some(0));
    assert_eq!(output.loaded_url().as_deref(), Some("https://cdn/A.mp3"));
}

#[test]
fn test_previous_at_first_track_is_noop() {
    let (mut engine, output) = playing_engine(&["A", "B"], 0);
    output.emit_time_update(1.0);
    engine.process_events();
    let loads = output.load_count();

    engine.play_previous().unwrap();

    assert_eq!(current_id(&engine), "A");
    assert_eq!(output.load_count(), loads);
    assert!(!engine.can_play_previous());
}

#[test]
fn test_previous_at_exactly_threshold_goes_back() {
    let (mut engine, output) = playing_engine(&["A", "B"], 1);
    output.emit_time_update(3.0);
    engine.process_events();

    engine.play_previous().unwrap();

    assert_eq!(current_id(&engine), "A");
}

#[test]
fn test_skip_to_validates_index() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 0);

    assert!(matches!(
        engine.skip_to(3),
        Err(PlaybackError::InvalidIndex { index: 3, len: 3 })
    ));
    assert_eq!(current_id(&engine), "A");

    engine.skip_to(2).unwrap();
    assert_eq!(current_id(&engine), "C");
    assert_eq!(output.loaded_url().as_deref(), Some("https://cdn/C.mp3"));
}

#[test]
fn test_can_play_next_follows_repeat() {
    let (mut engine, _output) = playing_engine(&["A", "B"], 1);

    assert!(!engine.can_play_next());
    engine.set_repeat(RepeatMode::All);
    assert!(engine.can_play_next());
    engine.set_repeat(RepeatMode::One);
    assert!(!engine.can_play_next());
}

// ===== Shuffle & Repeat =====

#[test]
fn test_shuffle_keeps_current_track_first_and_restores_order() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 1);
    let loads = output.load_count();

    engine.toggle_shuffle();
    assert!(engine.mode().shuffle);
    assert_eq!(queue_ids(&engine)[0], "B");
    assert_eq!(engine.current_index(), Some(0));
    assert_eq!(current_id(&engine), "B");

    engine.toggle_shuffle();
    assert!(!engine.mode().shuffle);
    assert_eq!(queue_ids(&engine), vec!["A", "B", "C"]);
    assert_eq!(engine.current_index(), Some(1));

    // Reordering never reloads the playing track
    assert_eq!(output.load_count(), loads);
}

#[test]
fn test_unshuffle_relocates_track_reached_while_shuffled() {
    let (mut engine, _output) = playing_engine(&["A", "B", "C", "D", "E"], 0);

    engine.toggle_shuffle();
    engine.play_next().unwrap();
    engine.play_next().unwrap();
    let reached = current_id(&engine);

    engine.toggle_shuffle();

    assert_eq!(queue_ids(&engine), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(current_id(&engine), reached);
}

#[test]
fn test_set_shuffle_emits_mode_and_queue_events() {
    let (mut engine, _output) = playing_engine(&["A", "B", "C"], 0);
    engine.drain_events();

    engine.set_shuffle(true);
    let events = engine.drain_events();

    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::ModeChanged { mode } if mode.shuffle)));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::QueueChanged { length: 3 })));
}

#[test]
fn test_play_queue_with_shuffle_on_shuffles_new_queue() {
    let (mut engine, _output) = playing_engine(&["A", "B"], 0);
    engine.toggle_shuffle();

    let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    engine.play_queue(create_tracks(&refs), 5).unwrap();

    assert!(engine.mode().shuffle);
    assert_eq!(engine.mode().shuffle, engine.queue().is_shuffled());
    assert_eq!(current_id(&engine), "5");
    assert_eq!(engine.current_index(), Some(0));

    // One toggle restores the order it was given
    engine.toggle_shuffle();
    assert!(!engine.mode().shuffle);
    assert_eq!(queue_ids(&engine), ids);
    assert_eq!(engine.current_index(), Some(5));
}

#[test]
fn test_shuffle_from_config_applies_to_first_queue() {
    let output = FakeOutput::new();
    let mut config = PlayerConfig::default();
    config.playback.shuffle = true;
    let mut engine = PlaybackEngine::new(output.clone(), &config)
        .with_shuffler(Box::new(SeededShuffler::new(3)));

    engine
        .play_queue(create_tracks(&["A", "B", "C", "D"]), 2)
        .unwrap();

    assert_eq!(engine.mode().shuffle, engine.queue().is_shuffled());
    assert_eq!(queue_ids(&engine)[0], "C");
    assert_eq!(output.loaded_url().as_deref(), Some("https://cdn/C.mp3"));
    assert!(engine.drain_events().iter().any(|e| matches!(
        e,
        PlaybackEvent::TrackChanged { index: 0, .. }
    )));
}

#[test]
fn test_toggle_repeat_cycles_three_modes() {
    let (mut engine, _output) = playing_engine(&["A"], 0);
    assert_eq!(engine.mode().repeat, RepeatMode::Off);

    engine.toggle_repeat();
    assert_eq!(engine.mode().repeat, RepeatMode::All);
    engine.toggle_repeat();
    assert_eq!(engine.mode().repeat, RepeatMode::One);
    engine.toggle_repeat();
    assert_eq!(engine.mode().repeat, RepeatMode::Off);
}

// ===== Transport =====

#[test]
fn test_toggle_play_twice_from_paused_is_a_play_pause_pair() {
    let (mut engine, output) = playing_engine(&["A"], 0);
    engine.toggle_play().unwrap();
    assert_eq!(engine.state(), PlaybackState::Paused);
    output.clear_calls();

    engine.toggle_play().unwrap();
    engine.toggle_play().unwrap();

    assert_eq!(engine.state(), PlaybackState::Paused);
    assert!(!engine.is_playing());
    assert_eq!(output.calls(), vec![OutputCall::Play, OutputCall::Pause]);
}

#[test]
fn test_toggle_play_while_loading_defers_to_can_play() {
    let output = FakeOutput::new();
    let mut engine = PlaybackEngine::new(output.clone(), &PlayerConfig::default());
    engine.play_track(create_track("A")).unwrap();

    engine.toggle_play().unwrap();
    assert!(!engine.is_playing());
    output.emit_can_play();
    engine.process_events();
    assert_eq!(engine.state(), PlaybackState::Ready);
    assert_eq!(output.play_count(), 0);

    engine.toggle_play().unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(output.play_count(), 1);
}

// ===== End of Track =====

#[test]
fn test_track_end_advances_queue() {
    let (mut engine, output) = playing_engine(&["A", "B"], 0);

    output.emit_ended();
    engine.process_events();

    assert_eq!(current_id(&engine), "B");
    assert_eq!(engine.state(), PlaybackState::Loading);
    assert!(engine.is_playing());
    let events = engine.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TrackFinished { track_id } if track_id.as_str() == "A")));
}

#[test]
fn test_last_track_end_stops_playback() {
    let (mut engine, output) = playing_engine(&["A", "B"], 1);
    let loads = output.load_count();

    output.emit_ended();
    engine.process_events();

    assert_eq!(current_id(&engine), "B");
    assert_eq!(engine.state(), PlaybackState::Ended);
    assert!(!engine.is_playing());
    assert_eq!(output.load_count(), loads);
}

#[test]
fn test_last_track_end_wraps_with_repeat_all() {
    let (mut engine, output) = playing_engine(&["A", "B"], 1);
    engine.set_repeat(RepeatMode::All);

    output.emit_ended();
    engine.process_events();

    assert_eq!(current_id(&engine), "A");
    assert!(engine.is_playing());
}

#[test]
fn test_repeat_one_restarts_same_track() {
    let (mut engine, output) = playing_engine(&["A", "B", "C"], 1);
    engine.set_repeat(RepeatMode::One);
    output.emit_time_update(180.0);
    engine.process_events();
    let loads = output.load_count();

    output.emit_ended();
    engine.process_events();

    assert_eq!(engine.current_index(), Some(1));
    assert_eq!(engine.position_secs(), 0.0);
    assert_eq!(output.current_time_value(), 0.0);
    assert!(engine.is_playing());
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(output.load_count(), loads);
}

#[test]
fn test_play_after_end_restarts_from_zero() {
    let (mut engine, output) = playing_engine(&["A"], 0);
    output.emit_time_update(200.0);
    output.emit_ended();
    engine.process_events();
    assert_eq!(engine.state(), PlaybackState::Ended);

    engine.toggle_play().unwrap();

    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(output.current_time_value(), 0.0);
}

// ===== Navigation =====

#[test]
fn test_navigation_fires_on_play_commands_only() {
    let (mut engine, _output) = playing_engine(&["A", "B"], 0);
    let navigations = Rc::new(Cell::new(0));
    let counter = Rc::clone(&navigations);
    engine.set_navigation_handler(move || counter.set(counter.get() + 1));

    engine.play_track(create_track("X")).unwrap();
    engine.play_queue(create_tracks(&["A", "B"]), 0).unwrap();
    engine.play_next().unwrap();
    engine.toggle_play().unwrap();

    assert_eq!(navigations.get(), 2);

    engine.clear_navigation_handler();
    engine.play_track(create_track("Y")).unwrap();
    assert_eq!(navigations.get(), 2);
}
