//! Track source traits
//!
//! The engine never fetches tracks itself. Whatever owns the catalogue (a
//! remote store, a playlist file, a fixture) implements [`TrackSource`] and
//! hands the resulting lists to [`crate::PlaybackEngine::play_queue`].

use crate::error::Result;
use crate::types::{Track, TrackId};

/// Supplier of track lists
pub trait TrackSource {
    /// All tracks, in catalogue order
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read
    fn tracks(&self) -> Result<Vec<Track>>;

    /// Look up a single track
    fn track(&self, id: &TrackId) -> Result<Option<Track>> {
        Ok(self.tracks()?.into_iter().find(|t| &t.id == id))
    }

    /// Case-insensitive match on title or artist
    fn search(&self, query: &str) -> Result<Vec<Track>> {
        let needle = query.trim().to_lowercase();
        let tracks = self.tracks()?;
        if needle.is_empty() {
            return Ok(tracks);
        }

        Ok(tracks
            .into_iter()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.artist.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Tracks that carry a synchronized video
    fn videos(&self) -> Result<Vec<Track>> {
        Ok(self.tracks()?.into_iter().filter(Track::has_video).collect())
    }
}

/// In-memory catalogue
#[derive(Debug, Clone, Default)]
pub struct StaticTrackSource {
    tracks: Vec<Track>,
}

impl StaticTrackSource {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FromIterator<Track> for StaticTrackSource {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl TrackSource for StaticTrackSource {
    fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> StaticTrackSource {
        [
            Track::new("1", "Night Drive", "Neon Coast", "https://cdn/1.mp3"),
            Track::new("2", "Morning", "Field Notes", "https://cdn/2.mp3")
                .with_video("https://cdn/2.mp4"),
            Track::new("3", "Coastline", "Drive Shaft", "https://cdn/3.mp3"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn search_matches_title_and_artist() {
        let source = catalogue();
        let found = source.search("DRIVE").unwrap();
        let ids: Vec<_> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn blank_query_returns_everything() {
        assert_eq!(catalogue().search("  ").unwrap().len(), 3);
    }

    #[test]
    fn lookup_and_video_filter() {
        let source = catalogue();
        assert!(source.track(&TrackId::new("2")).unwrap().is_some());
        assert!(source.track(&TrackId::new("9")).unwrap().is_none());
        assert_eq!(source.videos().unwrap().len(), 1);
    }
}
