use ar_core::Correspondence;
use bitarray::{BitArray, Hamming};
use space::Metric;

/// Controls how aggressively the matcher filters raw nearest-neighbor
/// matches before pose solving.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// The fraction of reference descriptors whose matches are kept, best
    /// distance first.
    pub keep_fraction: f64,
    /// Absolute cap on the number of returned correspondences, applied
    /// after the fraction, to bound the cost of pose solving.
    pub max_matches: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            keep_fraction: 0.15,
            max_matches: 30,
        }
    }
}

/// Assigns each reference descriptor its nearest frame descriptor by
/// Hamming distance (one-directional, not mutual nearest neighbor), sorts
/// the result ascending by distance, and truncates to the configured
/// fraction and cap.
///
/// An empty frame descriptor set yields an empty result; downstream pose
/// solving treats that as "no pose available this tick".
pub fn match_descriptors<const B: usize>(
    reference: &[BitArray<B>],
    frame: &[BitArray<B>],
    config: &MatchConfig,
) -> Vec<Correspondence> {
    if reference.is_empty() || frame.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Correspondence> = reference
        .iter()
        .enumerate()
        .map(|(reference_index, reference_descriptor)| {
            let (frame_index, distance) = frame
                .iter()
                .enumerate()
                .map(|(frame_index, frame_descriptor)| {
                    (
                        frame_index,
                        Hamming.distance(reference_descriptor, frame_descriptor),
                    )
                })
                .min_by_key(|&(_, distance)| distance)
                .unwrap();
            Correspondence {
                distance,
                reference: reference_index,
                frame: frame_index,
            }
        })
        .collect();

    matches.sort_unstable();
    let keep = (reference.len() as f64 * config.keep_fraction) as usize;
    matches.truncate(keep.min(config.max_matches));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn random_descriptors(count: usize, seed: u64) -> Vec<BitArray<32>> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..count).map(|_| BitArray::new(rng.gen())).collect()
    }

    #[test]
    fn keeps_the_best_fraction_sorted() {
        let reference = random_descriptors(100, 1);
        let frame = random_descriptors(100, 2);
        let matches = match_descriptors(&reference, &frame, &MatchConfig::default());
        assert_eq!(matches.len(), (100.0 * 0.15) as usize);
        for window in matches.windows(2) {
            assert!(window[0].distance <= window[1].distance);
        }
    }

    #[test]
    fn cap_bounds_large_inputs() {
        let reference = random_descriptors(400, 3);
        let frame = random_descriptors(100, 4);
        let config = MatchConfig::default();
        let matches = match_descriptors(&reference, &frame, &config);
        assert_eq!(matches.len(), config.max_matches);
    }

    #[test]
    fn empty_frame_produces_no_matches() {
        let reference = random_descriptors(100, 5);
        let matches = match_descriptors(&reference, &[], &MatchConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn identical_descriptors_match_at_distance_zero() {
        let reference = random_descriptors(20, 6);
        let matches = match_descriptors(&reference, &reference, &MatchConfig::default());
        assert_eq!(matches.len(), 3);
        for m in &matches {
            assert_eq!(m.distance, 0);
            assert_eq!(m.reference, m.frame);
        }
    }
}
