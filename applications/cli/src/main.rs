/// Encore - headless playback driver
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use encore_cli::{
    settings::load_config,
    simulated::{SimulatedOutput, SimulatedVideo},
    timers::TokioScheduler,
    tracks::load_tracks,
};
use encore_playback::{
    format_time, MediaSynchronizer, PlaybackEngine, PlaybackEvent, PlaybackState, RepeatMode,
    TrackSource,
};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Real time between two virtual clock steps
const TICK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Drive the Encore playback engine against a simulated output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a track list to its end
    Play {
        /// Track list (JSON array or TOML with [[tracks]])
        tracks: PathBuf,
        /// Id of the track to start from
        #[arg(long)]
        start: Option<String>,
        /// Shuffle the queue around the starting track
        #[arg(long)]
        shuffle: bool,
        /// Repeat mode, overriding the configuration
        #[arg(long, value_enum)]
        repeat: Option<RepeatArg>,
        /// Configuration file path
        #[arg(short, long, env = "ENCORE_CONFIG")]
        config: Option<PathBuf>,
        /// Length of every simulated track in seconds
        #[arg(long, default_value_t = 30.0)]
        track_length: f64,
        /// Virtual seconds per real second
        #[arg(long, default_value_t = 10.0)]
        speed: f64,
        /// Relative clock error of the simulated video
        #[arg(long, default_value_t = 0.02)]
        video_drift: f64,
    },
    /// List the tracks of a track list
    List {
        tracks: PathBuf,
        /// Only show tracks whose title or artist matches
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long, env = "ENCORE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Off,
    All,
    One,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::All => RepeatMode::All,
            RepeatArg::One => RepeatMode::One,
        }
    }
}

struct PlayOptions {
    tracks: PathBuf,
    start: Option<String>,
    shuffle: bool,
    repeat: Option<RepeatArg>,
    config: Option<PathBuf>,
    track_length: f64,
    speed: f64,
    video_drift: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_playback=info,encore_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            tracks,
            start,
            shuffle,
            repeat,
            config,
            track_length,
            speed,
            video_drift,
        } => {
            play(PlayOptions {
                tracks,
                start,
                shuffle,
                repeat,
                config,
                track_length,
                speed,
                video_drift,
            })
            .await?;
        }
        Commands::List { tracks, search } => {
            let source = load_tracks(&tracks)?;
            let listed = match search {
                Some(query) => source.search(&query)?,
                None => source.tracks()?,
            };
            for track in &listed {
                let video = if track.has_video() { " [video]" } else { "" };
                println!("{:<12} {} - {}{}", track.id, track.artist, track.title, video);
            }
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn play(options: PlayOptions) -> anyhow::Result<()> {
    if !options.track_length.is_finite() || options.track_length <= 0.0 {
        bail!("track length must be positive");
    }
    if !options.speed.is_finite() || options.speed <= 0.0 {
        bail!("speed must be positive");
    }

    let mut config = load_config(options.config.as_deref())?;
    if options.shuffle {
        config.playback.shuffle = true;
    }
    if let Some(repeat) = options.repeat {
        config.playback.repeat = repeat.into();
    }

    let tracks = load_tracks(&options.tracks)?.tracks()?;
    if tracks.is_empty() {
        bail!("track list {} is empty", options.tracks.display());
    }
    let start_index = match options.start {
        Some(ref id) => tracks
            .iter()
            .position(|track| track.id.as_str() == id)
            .with_context(|| format!("no track with id {id}"))?,
        None => 0,
    };

    let output = SimulatedOutput::new(options.track_length);
    let video = SimulatedVideo::new(options.video_drift);
    let (timer_tx, mut timer_rx) = unbounded_channel();
    let scheduler = TokioScheduler::new(timer_tx);

    let mut engine = PlaybackEngine::new(output.clone(), &config);
    let mut sync = MediaSynchronizer::new(scheduler, config.sync.clone());

    let queue_length = tracks.len();
    if let Err(err) = engine.play_queue(tracks, start_index) {
        warn!(error = %err, "first track failed to load");
    }

    let mut ticks = tokio::time::interval(TICK);
    let step = TICK.as_secs_f64() * options.speed;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    let mut consecutive_failures = 0usize;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                output.advance(step);
                video.advance(step);
            }
            Some(id) = timer_rx.recv() => {
                let clock = engine.clock();
                sync.on_timer(id, &clock);
            }
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
        }

        engine.process_events();

        let clock = engine.clock();
        let has_video = engine.current_track().is_some_and(|track| track.has_video());
        if has_video && !sync.is_open() {
            if let Err(err) = sync.open(video.clone(), &clock) {
                warn!(error = %err, "video sync unavailable");
            }
        }
        sync.sync(&clock);

        for event in engine.drain_events() {
            match event {
                PlaybackEvent::Error { .. } => consecutive_failures += 1,
                PlaybackEvent::StateChanged {
                    state: PlaybackState::Playing,
                } => consecutive_failures = 0,
                _ => {}
            }
            report(&engine, &event);
        }

        match engine.state() {
            PlaybackState::Ended if !engine.is_playing() => {
                info!("queue finished");
                break;
            }
            PlaybackState::Idle if !engine.is_playing() => {
                if consecutive_failures >= queue_length || !engine.can_play_next() {
                    warn!("no playable track left");
                    break;
                }
                if let Err(err) = engine.play_next() {
                    debug!(error = %err, "skipping unplayable track");
                }
            }
            _ => {}
        }
    }

    if sync.is_open() {
        info!(corrections = sync.corrections(), "video sync closed");
        sync.close();
    }
    engine.shutdown();
    Ok(())
}

fn report(engine: &PlaybackEngine<SimulatedOutput>, event: &PlaybackEvent) {
    match event {
        PlaybackEvent::TrackChanged {
            track_id, index, ..
        } => {
            let track = engine.queue().tracks().iter().find(|t| &t.id == track_id);
            if let Some(track) = track {
                info!(
                    index,
                    id = %track.id,
                    video = track.has_video(),
                    "now playing: {} - {}",
                    track.artist,
                    track.title
                );
            }
        }
        PlaybackEvent::PositionUpdate {
            position_secs,
            duration_secs,
        } => {
            debug!(
                "{} / {}",
                format_time(*position_secs),
                format_time(*duration_secs)
            );
        }
        PlaybackEvent::Error { message } => warn!(%message, "playback error"),
        other => debug!(?other, "playback event"),
    }
}
