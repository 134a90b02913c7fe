//! Descriptor matching.
//!
//! Brute force: every descriptor of the reference photo is compared against
//! every descriptor of the moving photo by Hamming distance. With a few
//! hundred keypoints per photo this is cheaper than building an index.

use super::orb::{Descriptor, Keypoint};
use crate::core::backend::DescriptorMatcher;
use rayon::prelude::*;

/// A pairing of one query keypoint with its nearest train keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index into the query (reference photo) keypoints
    pub query: usize,
    /// Index into the train (moving photo) keypoints
    pub train: usize,
    /// Hamming distance between the two descriptors
    pub distance: u32,
}

/// Number of differing bits between two descriptors.
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Nearest-neighbour matcher over Hamming distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl BruteForceMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn match_descriptors(&self, query: &[Keypoint], train: &[Keypoint]) -> Vec<Match> {
        if train.is_empty() {
            return Vec::new();
        }

        query
            .par_iter()
            .enumerate()
            .filter_map(|(query_idx, q)| {
                // min_by_key keeps the first of equal distances
                train
                    .iter()
                    .enumerate()
                    .map(|(train_idx, t)| (train_idx, hamming(&q.descriptor, &t.descriptor)))
                    .min_by_key(|&(_, distance)| distance)
                    .map(|(train_idx, distance)| Match {
                        query: query_idx,
                        train: train_idx,
                        distance,
                    })
            })
            .collect()
    }
}

/// Keep the `limit` closest matches, ordered by distance.
///
/// The sort is stable so equal distances keep their query order and the
/// result is reproducible.
pub fn select_good_matches(mut matches: Vec<Match>, limit: usize) -> Vec<Match> {
    matches.sort_by_key(|m| m.distance);
    matches.truncate(limit);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypoint(descriptor: Descriptor) -> Keypoint {
        Keypoint {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            octave: 0,
            response: 1.0,
            descriptor,
        }
    }

    fn with_bits(bits: &[usize]) -> Descriptor {
        let mut descriptor = [0u8; 32];
        for &bit in bits {
            descriptor[bit / 8] |= 1 << (bit % 8);
        }
        descriptor
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(hamming(&[0; 32], &[0; 32]), 0);
        assert_eq!(hamming(&[0; 32], &[0xFF; 32]), 256);
        assert_eq!(hamming(&with_bits(&[0, 9, 255]), &with_bits(&[9])), 2);
    }

    #[test]
    fn each_query_gets_nearest_train() {
        let train = vec![
            keypoint(with_bits(&[0, 1, 2, 3])),
            keypoint(with_bits(&[100, 101])),
        ];
        let query = vec![
            keypoint(with_bits(&[100])),
            keypoint(with_bits(&[0, 1, 2])),
        ];

        let matches = BruteForceMatcher::new().match_descriptors(&query, &train);
        assert_eq!(
            matches,
            vec![
                Match {
                    query: 0,
                    train: 1,
                    distance: 1
                },
                Match {
                    query: 1,
                    train: 0,
                    distance: 1
                },
            ]
        );
    }

    #[test]
    fn ties_go_to_first_train() {
        let train = vec![keypoint(with_bits(&[1])), keypoint(with_bits(&[2]))];
        let query = vec![keypoint(with_bits(&[]))];

        let matches = BruteForceMatcher::new().match_descriptors(&query, &train);
        assert_eq!(matches[0].train, 0);
    }

    #[test]
    fn empty_train_gives_no_matches() {
        let query = vec![keypoint([0; 32])];
        assert!(BruteForceMatcher::new()
            .match_descriptors(&query, &[])
            .is_empty());
    }

    #[test]
    fn good_matches_are_sorted_and_capped() {
        let matches = vec![
            Match {
                query: 0,
                train: 0,
                distance: 30,
            },
            Match {
                query: 1,
                train: 0,
                distance: 5,
            },
            Match {
                query: 2,
                train: 0,
                distance: 30,
            },
            Match {
                query: 3,
                train: 0,
                distance: 12,
            },
        ];

        let good = select_good_matches(matches, 3);
        let order: Vec<usize> = good.iter().map(|m| m.query).collect();
        assert_eq!(order, vec![1, 3, 0]);
    }
}
