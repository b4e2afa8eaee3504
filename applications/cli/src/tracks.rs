//! Track list files
//!
//! Either a JSON array of tracks or a TOML document with `[[tracks]]` tables,
//! both in the store's row shape (`id`, `title`, `artist`, `audio_url`, ...).

use anyhow::{bail, Context, Result};
use encore_playback::{StaticTrackSource, Track};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct TrackFile {
    tracks: Vec<Track>,
}

/// Read a track list, picking the format from the file extension
pub fn load_tracks(path: &Path) -> Result<StaticTrackSource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read track list {}", path.display()))?;

    let tracks = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => {
            let file: TrackFile = toml::from_str(&content)
                .with_context(|| format!("invalid TOML track list {}", path.display()))?;
            file.tracks
        }
        Some("json") | None => serde_json::from_str::<Vec<Track>>(&content)
            .with_context(|| format!("invalid JSON track list {}", path.display()))?,
        Some(other) => bail!("unsupported track list format: .{other}"),
    };

    tracing::debug!(count = tracks.len(), path = %path.display(), "track list loaded");
    Ok(StaticTrackSource::new(tracks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_playback::TrackSource;
    use std::io::Write;

    #[test]
    fn loads_json_array() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"id":"1","title":"One","artist":"A","audio_url":"https://cdn/1.mp3"}}]"#
        )
        .unwrap();

        let source = load_tracks(file.path()).unwrap();
        assert_eq!(source.tracks().unwrap()[0].title, "One");
    }

    #[test]
    fn loads_toml_tables() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "[[tracks]]\nid = \"1\"\ntitle = \"One\"\nartist = \"A\"\naudio_url = \"https://cdn/1.mp3\"\nvideo_url = \"https://cdn/1.mp4\"\n"
        )
        .unwrap();

        let source = load_tracks(file.path()).unwrap();
        assert_eq!(source.videos().unwrap().len(), 1);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        assert!(load_tracks(file.path()).is_err());
    }
}
