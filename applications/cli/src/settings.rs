//! Configuration loading
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. `encore.toml` in the working directory, or the file given on the
//!    command line
//! 3. environment variables prefixed with `ENCORE_`, nested with `__`
//!    (`ENCORE_PLAYBACK__INITIAL_VOLUME=0.4`)

use anyhow::{Context, Result};
use encore_playback::PlayerConfig;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "encore.toml";

pub fn load_config(path: Option<&Path>) -> Result<PlayerConfig> {
    let mut settings = config::Config::builder();

    match path {
        Some(path) => {
            settings = settings.add_source(config::File::from(path.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                settings = settings.add_source(config::File::from(default_path));
            }
        }
    }

    settings = settings.add_source(
        config::Environment::with_prefix("ENCORE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: PlayerConfig = settings
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_playback::RepeatMode;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[playback]\ninitial_volume = 0.25\nrepeat = \"all\"\n\n[sync]\ncheck_interval_ms = 2000"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.playback.initial_volume, 0.25);
        assert_eq!(config.playback.repeat, RepeatMode::All);
        assert_eq!(config.sync.check_interval_ms, 2000);
        assert_eq!(config.visualizer.fft_size, 256);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sync]\ncheck_interval_ms = 50").unwrap();

        assert!(load_config(Some(file.path())).is_err());
    }
}
