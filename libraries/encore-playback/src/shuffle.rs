//! Shuffle algorithms for queue randomization
//!
//! Both shufflers are Fisher-Yates (`SliceRandom::shuffle`); they differ only
//! in where the randomness comes from.

use crate::types::Track;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

/// Reorders tracks in place
pub trait Shuffler {
    fn shuffle(&mut self, tracks: &mut [Track]);
}

/// Pure random shuffle backed by the thread RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomShuffler;

impl Shuffler for RandomShuffler {
    fn shuffle(&mut self, tracks: &mut [Track]) {
        let mut rng = thread_rng();
        tracks.shuffle(&mut rng);
    }
}

/// Reproducible shuffle for tests and pinned configurations
#[derive(Debug, Clone)]
pub struct SeededShuffler {
    rng: StdRng,
}

impl SeededShuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Shuffler for SeededShuffler {
    fn shuffle(&mut self, tracks: &mut [Track]) {
        tracks.shuffle(&mut self.rng);
    }
}

/// Pick the shuffler for an optional configured seed
pub fn shuffler_for_seed(seed: Option<u64>) -> Box<dyn Shuffler> {
    match seed {
        Some(seed) => Box::new(SeededShuffler::new(seed)),
        None => Box::new(RandomShuffler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn create_test_tracks(count: usize) -> Vec<Track> {
        (0..count)
            .map(|i| {
                Track::new(
                    format!("{i}"),
                    format!("Track {i}"),
                    "Artist",
                    format!("https://cdn/{i}.mp3"),
                )
            })
            .collect()
    }

    fn ids(tracks: &[Track]) -> Vec<String> {
        tracks.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn random_shuffle_preserves_all_tracks() {
        let mut tracks = create_test_tracks(10);
        RandomShuffler.shuffle(&mut tracks);

        let unique: HashSet<String> = ids(&tracks).into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn same_seed_same_order() {
        let mut a = create_test_tracks(20);
        let mut b = create_test_tracks(20);

        SeededShuffler::new(42).shuffle(&mut a);
        SeededShuffler::new(42).shuffle(&mut b);

        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn seeded_shuffle_changes_order() {
        let mut tracks = create_test_tracks(20);
        let original = ids(&tracks);

        SeededShuffler::new(1).shuffle(&mut tracks);

        // 1 in 20! for a fixed seed to be the identity permutation
        assert_ne!(original, ids(&tracks));
    }

    #[test]
    fn empty_and_single_are_untouched() {
        let mut empty: Vec<Track> = Vec::new();
        RandomShuffler.shuffle(&mut empty);
        assert!(empty.is_empty());

        let mut single = create_test_tracks(1);
        shuffler_for_seed(Some(3)).shuffle(&mut single);
        assert_eq!(ids(&single), vec!["0".to_string()]);
    }
}
