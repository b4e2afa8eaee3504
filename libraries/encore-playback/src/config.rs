/// Player configuration
use crate::error::{PlaybackError, Result};
use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_playback")]
    pub playback: PlaybackSettings,

    #[serde(default = "default_sync")]
    pub sync: SyncSettings,

    #[serde(default = "default_visualizer")]
    pub visualizer: VisualizerSettings,

    #[serde(default = "default_controls")]
    pub controls: ControlsSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Volume applied to the output at startup (0.0-1.0)
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Past this position "previous" restarts the current track instead
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: f64,

    #[serde(default)]
    pub repeat: RepeatMode,

    #[serde(default)]
    pub shuffle: bool,

    /// Pins the shuffle RNG for reproducible ordering
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Offset that triggers a one-off alignment on track change or window open
    #[serde(default = "default_align_threshold_secs")]
    pub align_threshold_secs: f64,

    /// Offset that triggers a correction during the periodic drift check
    #[serde(default = "default_drift_threshold_secs")]
    pub drift_threshold_secs: f64,

    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VisualizerSettings {
    /// Analyser FFT size; the feed exposes `fft_size / 2` bins
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlsSettings {
    #[serde(default = "default_auto_hide_ms")]
    pub auto_hide_ms: u64,
}

impl SyncSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl ControlsSettings {
    pub fn auto_hide_delay(&self) -> Duration {
        Duration::from_millis(self.auto_hide_ms)
    }
}

impl VisualizerSettings {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl PlayerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let volume = self.playback.initial_volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::Config(format!(
                "playback.initial_volume must be within 0.0..=1.0, got {volume}"
            )));
        }

        if !self.playback.restart_threshold_secs.is_finite()
            || self.playback.restart_threshold_secs < 0.0
        {
            return Err(PlaybackError::Config(
                "playback.restart_threshold_secs must be a non-negative number".to_string(),
            ));
        }

        if !(1000..=2000).contains(&self.sync.check_interval_ms) {
            return Err(PlaybackError::Config(format!(
                "sync.check_interval_ms must be within 1000..=2000, got {}",
                self.sync.check_interval_ms
            )));
        }

        if self.sync.align_threshold_secs <= 0.0
            || self.sync.drift_threshold_secs < self.sync.align_threshold_secs
        {
            return Err(PlaybackError::Config(
                "sync thresholds must be positive and drift >= align".to_string(),
            ));
        }

        let fft = self.visualizer.fft_size;
        if !fft.is_power_of_two() || !(32..=32768).contains(&fft) {
            return Err(PlaybackError::Config(format!(
                "visualizer.fft_size must be a power of two within 32..=32768, got {fft}"
            )));
        }

        Ok(())
    }
}

// Default values
fn default_playback() -> PlaybackSettings {
    PlaybackSettings {
        initial_volume: default_initial_volume(),
        restart_threshold_secs: default_restart_threshold_secs(),
        repeat: RepeatMode::Off,
        shuffle: false,
        shuffle_seed: None,
    }
}

fn default_initial_volume() -> f32 {
    0.7
}

fn default_restart_threshold_secs() -> f64 {
    3.0
}

fn default_sync() -> SyncSettings {
    SyncSettings {
        align_threshold_secs: default_align_threshold_secs(),
        drift_threshold_secs: default_drift_threshold_secs(),
        check_interval_ms: default_check_interval_ms(),
    }
}

fn default_align_threshold_secs() -> f64 {
    0.5
}

fn default_drift_threshold_secs() -> f64 {
    1.0
}

fn default_check_interval_ms() -> u64 {
    1000
}

fn default_visualizer() -> VisualizerSettings {
    VisualizerSettings {
        fft_size: default_fft_size(),
    }
}

fn default_fft_size() -> usize {
    256
}

fn default_controls() -> ControlsSettings {
    ControlsSettings {
        auto_hide_ms: default_auto_hide_ms(),
    }
}

fn default_auto_hide_ms() -> u64 {
    3000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playback: default_playback(),
            sync: default_sync(),
            visualizer: default_visualizer(),
            controls: default_controls(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        default_playback()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        default_sync()
    }
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        default_visualizer()
    }
}

impl Default for ControlsSettings {
    fn default() -> Self {
        default_controls()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.playback.initial_volume, 0.7);
        assert_eq!(config.playback.restart_threshold_secs, 3.0);
        assert_eq!(config.sync.check_interval(), Duration::from_secs(1));
        assert_eq!(config.visualizer.bin_count(), 128);
        assert_eq!(config.controls.auto_hide_delay(), Duration::from_secs(3));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: PlayerConfig = toml::from_str(
            r#"
            [playback]
            repeat = "all"
            shuffle_seed = 7

            [sync]
            check_interval_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.repeat, RepeatMode::All);
        assert_eq!(config.playback.shuffle_seed, Some(7));
        assert_eq!(config.playback.initial_volume, 0.7);
        assert_eq!(config.sync.check_interval_ms, 1500);
        assert_eq!(config.sync.drift_threshold_secs, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = PlayerConfig::default();
        config.playback.initial_volume = 1.5;
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));

        let mut config = PlayerConfig::default();
        config.sync.check_interval_ms = 16;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.visualizer.fft_size = 300;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.sync.drift_threshold_secs = 0.2;
        assert!(config.validate().is_err());
    }
}
