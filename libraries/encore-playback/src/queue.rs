//! Play queue with a position pointer
//!
//! The current track is never stored separately: it is always
//! `tracks[current_index]`, so the two cannot diverge.
//!
//! ```text
//! tracks:         [A] [B] [C] [D]
//! current_index:       ^
//! original_order: [A] [B] [C] [D]   (saved copy while shuffled)
//! ```

use crate::error::{PlaybackError, Result};
use crate::shuffle::Shuffler;
use crate::types::Track;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    /// Tracks in play order
    tracks: Vec<Track>,

    /// Position of the current track in `tracks`
    current_index: usize,

    /// Order before shuffle was applied (for restoring)
    original_order: Vec<Track>,

    /// Whether `tracks` is currently a shuffled permutation
    is_shuffled: bool,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue and point at `start_index`
    ///
    /// Validates before touching anything: on error the queue is unchanged.
    pub fn replace(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        if start_index >= tracks.len() {
            return Err(PlaybackError::InvalidIndex {
                index: start_index,
                len: tracks.len(),
            });
        }

        if let Some(track) = tracks.iter().find(|t| !t.is_playable()) {
            return Err(PlaybackError::MissingAudioUrl(track.id.clone()));
        }

        self.original_order.clone_from(&tracks);
        self.tracks = tracks;
        self.current_index = start_index;
        self.is_shuffled = false;
        Ok(())
    }

    /// Track at the position pointer
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn original_order(&self) -> &[Track] {
        &self.original_order
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.is_shuffled
    }

    /// Whether the pointer is at the final entry
    pub fn is_at_end(&self) -> bool {
        !self.is_empty() && self.current_index + 1 >= self.tracks.len()
    }

    pub fn has_previous(&self) -> bool {
        !self.is_empty() && self.current_index > 0
    }

    /// Move the pointer forward one entry
    ///
    /// Returns false at the end of the queue (pointer unchanged).
    pub fn advance(&mut self) -> bool {
        if self.is_empty() || self.is_at_end() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Move the pointer back one entry
    pub fn go_back(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Point at `index`
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::InvalidIndex {
                index,
                len: self.tracks.len(),
            });
        }
        self.current_index = index;
        Ok(())
    }

    /// Shuffle around the current track
    ///
    /// Saves the current order, takes the current track out, shuffles the
    /// remainder and puts the current track back in front, so the same track
    /// stays current at index 0.
    pub fn shuffle(&mut self, shuffler: &mut dyn Shuffler) {
        if !self.is_shuffled {
            self.original_order.clone_from(&self.tracks);
        }
        self.is_shuffled = true;

        if self.tracks.is_empty() {
            return;
        }

        let current = self.tracks.remove(self.current_index);
        shuffler.shuffle(&mut self.tracks);
        self.tracks.insert(0, current);
        self.current_index = 0;
    }

    /// Restore the order saved by [`Queue::shuffle`]
    ///
    /// The pointer follows the current track to its original position, or
    /// falls back to 0 when it cannot be found.
    pub fn restore_original_order(&mut self) {
        if !self.is_shuffled {
            return;
        }

        let current_id = self.current().map(|t| t.id.clone());
        self.tracks = self.original_order.clone();
        self.current_index = current_id
            .and_then(|id| self.tracks.iter().position(|t| t.id == id))
            .unwrap_or(0);
        self.is_shuffled = false;
    }

    /// Clear entire queue
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.original_order.clear();
        self.current_index = 0;
        self.is_shuffled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::SeededShuffler;

    fn create_test_track(id: &str) -> Track {
        Track::new(id, format!("Track {id}"), "Test Artist", format!("https://cdn/{id}.mp3"))
    }

    fn abc() -> Vec<Track> {
        vec![
            create_test_track("A"),
            create_test_track("B"),
            create_test_track("C"),
        ]
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn create_empty_queue() {
        let queue = Queue::new();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert!(!queue.is_at_end());
    }

    #[test]
    fn replace_points_at_start_index() {
        let mut queue = Queue::new();
        queue.replace(abc(), 1).unwrap();

        assert_eq!(queue.current().unwrap().id.as_str(), "B");
        assert_eq!(ids(queue.original_order()), vec!["A", "B", "C"]);
    }

    #[test]
    fn replace_rejects_bad_index_without_mutation() {
        let mut queue = Queue::new();
        queue.replace(abc(), 2).unwrap();

        let err = queue.replace(vec![create_test_track("X")], 1).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidIndex { index: 1, len: 1 }));
        assert_eq!(queue.current().unwrap().id.as_str(), "C");
        assert_eq!(queue.len(), 3);

        assert!(queue.replace(Vec::new(), 0).is_err());
    }

    #[test]
    fn replace_rejects_track_without_audio() {
        let mut queue = Queue::new();
        let mut tracks = abc();
        tracks[2].audio_url.clear();

        let err = queue.replace(tracks, 0).unwrap_err();
        assert!(matches!(err, PlaybackError::MissingAudioUrl(id) if id.as_str() == "C"));
        assert!(queue.is_empty());
    }

    #[test]
    fn advance_stops_at_end() {
        let mut queue = Queue::new();
        queue.replace(abc(), 0).unwrap();

        assert!(queue.advance());
        assert!(queue.advance());
        assert!(queue.is_at_end());
        assert!(!queue.advance());
        assert_eq!(queue.current_index(), 2);
    }

    #[test]
    fn go_back_stops_at_start() {
        let mut queue = Queue::new();
        queue.replace(abc(), 1).unwrap();

        assert!(queue.go_back());
        assert!(!queue.go_back());
        assert_eq!(queue.current_index(), 0);
    }

    #[test]
    fn shuffle_keeps_current_first() {
        let mut queue = Queue::new();
        queue.replace(abc(), 1).unwrap();

        queue.shuffle(&mut SeededShuffler::new(7));

        assert!(queue.is_shuffled());
        assert_eq!(queue.current_index(), 0);
        assert_eq!(queue.current().unwrap().id.as_str(), "B");
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn restore_original_order_relocates_current() {
        let mut queue = Queue::new();
        queue.replace(abc(), 1).unwrap();

        queue.shuffle(&mut SeededShuffler::new(7));
        queue.advance();
        let now_current = queue.current().unwrap().id.clone();

        queue.restore_original_order();

        assert!(!queue.is_shuffled());
        assert_eq!(ids(queue.tracks()), vec!["A", "B", "C"]);
        assert_eq!(queue.current().unwrap().id, now_current);
    }

    #[test]
    fn restore_without_shuffle_is_noop() {
        let mut queue = Queue::new();
        queue.replace(abc(), 2).unwrap();
        queue.restore_original_order();
        assert_eq!(queue.current_index(), 2);
    }

    #[test]
    fn jump_to_validates() {
        let mut queue = Queue::new();
        queue.replace(abc(), 0).unwrap();

        queue.jump_to(2).unwrap();
        assert_eq!(queue.current().unwrap().id.as_str(), "C");
        assert!(queue.jump_to(3).is_err());
        assert_eq!(queue.current_index(), 2);
    }

    #[test]
    fn clear_queue() {
        let mut queue = Queue::new();
        queue.replace(abc(), 1).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.original_order().is_empty());
    }
}
