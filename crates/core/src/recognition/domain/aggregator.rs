use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::shared::embedding::Embedding;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("embedding set is empty")]
    EmptySet,
    #[error(
        "no stable consensus: best trial covered {best_inliers} of {total} \
         embeddings (needed {needed}) within {trials} trials"
    )]
    InsufficientStability {
        best_inliers: usize,
        needed: usize,
        total: usize,
        trials: usize,
    },
}

/// Source of trial candidate indices for the aggregator.
///
/// Production uses [`RandomCandidates`]; tests substitute a fixed sequence
/// to make trial order deterministic.
pub trait CandidateSource: Send {
    /// Index of the next trial candidate, in `0..n`.
    fn pick(&mut self, n: usize) -> usize;
}

/// Uniform random candidate selection backed by a seedable PRNG.
pub struct RandomCandidates {
    rng: StdRng,
}

impl RandomCandidates {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed seed, for repeatable runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomCandidates {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSource for RandomCandidates {
    fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}

/// A successful aggregation: the consensus mean plus how it was reached.
#[derive(Clone, Debug)]
pub struct Consensus {
    pub embedding: Embedding,
    /// Embeddings that contributed to the mean (candidate included).
    pub inliers: usize,
    /// Trials consumed before consensus, starting at 1.
    pub trials: usize,
}

/// Outlier-rejecting mean over a set of same-identity embeddings.
///
/// Repeatedly picks one input embedding as a candidate center and counts how
/// many inputs fall within `dist_threshold` (L2) of it; once a candidate
/// covers at least `ratio_threshold` of the set, the elementwise mean of
/// that inlier set is the result. Because the "model" is a single point in
/// embedding space, the consensus mean doubles as the refit; no second
/// least-squares pass is needed.
///
/// Runs at most `2 × N` trials and fails with
/// [`AggregateError::InsufficientStability`] if none reaches the ratio; the
/// caller must treat that as enrollment failure, not a degraded estimate.
pub struct RobustAggregator {
    ratio_threshold: f64,
    dist_threshold: f64,
    candidates: Box<dyn CandidateSource>,
}

impl RobustAggregator {
    /// `ratio_threshold` must be in (0, 1]; `dist_threshold` must be finite
    /// and non-negative (0 degenerates to requiring exact duplicates).
    pub fn new(ratio_threshold: f64, dist_threshold: f64) -> Self {
        Self::with_candidate_source(
            ratio_threshold,
            dist_threshold,
            Box::new(RandomCandidates::new()),
        )
    }

    pub fn with_candidate_source(
        ratio_threshold: f64,
        dist_threshold: f64,
        candidates: Box<dyn CandidateSource>,
    ) -> Self {
        assert!(
            ratio_threshold > 0.0 && ratio_threshold <= 1.0,
            "ratio threshold must be in (0, 1], got {ratio_threshold}"
        );
        assert!(
            dist_threshold.is_finite() && dist_threshold >= 0.0,
            "distance threshold must be finite and non-negative, got {dist_threshold}"
        );
        Self {
            ratio_threshold,
            dist_threshold,
            candidates,
        }
    }

    pub fn aggregate(&mut self, set: &[Embedding]) -> Result<Consensus, AggregateError> {
        let n = set.len();
        if n == 0 {
            return Err(AggregateError::EmptySet);
        }

        let required = self.ratio_threshold * n as f64;
        let max_trials = 2 * n;
        let mut best_inliers = 0;

        for trial in 1..=max_trials {
            let center = &set[self.candidates.pick(n)];
            let inliers: Vec<&Embedding> = set
                .iter()
                .filter(|e| center.distance(e) <= self.dist_threshold)
                .collect();

            best_inliers = best_inliers.max(inliers.len());
            if inliers.len() as f64 >= required {
                return Ok(Consensus {
                    embedding: mean_of(&inliers),
                    inliers: inliers.len(),
                    trials: trial,
                });
            }
        }

        Err(AggregateError::InsufficientStability {
            best_inliers,
            needed: required.ceil() as usize,
            total: n,
            trials: max_trials,
        })
    }
}

/// Elementwise arithmetic mean, accumulated in `f64`. `rows` is non-empty.
fn mean_of(rows: &[&Embedding]) -> Embedding {
    let dim = rows[0].dim();
    let mut acc = vec![0.0f64; dim];
    for row in rows {
        for (slot, v) in acc.iter_mut().zip(row.as_slice()) {
            *slot += *v as f64;
        }
    }
    let count = rows.len() as f64;
    Embedding::new(acc.into_iter().map(|sum| (sum / count) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic candidate order for trial-by-trial assertions.
    struct FixedCandidates {
        picks: Vec<usize>,
        next: usize,
    }

    impl FixedCandidates {
        fn new(picks: Vec<usize>) -> Self {
            Self { picks, next: 0 }
        }
    }

    impl CandidateSource for FixedCandidates {
        fn pick(&mut self, _n: usize) -> usize {
            let idx = self.picks[self.next % self.picks.len()];
            self.next += 1;
            idx
        }
    }

    fn embedding(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    /// Nine points within 0.1 of each other plus one far outlier; the spec
    /// scenario for ratio 0.9 / distance 0.4.
    fn clustered_set() -> (Vec<Embedding>, Embedding) {
        let mut set = Vec::new();
        for i in 0..9 {
            let offset = (i as f32 - 4.0) * 0.01; // spread well inside 0.1
            set.push(embedding(&[1.0 + offset, -0.5 - offset]));
        }
        // cluster mean before the outlier is appended
        let refs: Vec<&Embedding> = set.iter().collect();
        let cluster_mean = mean_of(&refs);
        set.push(embedding(&[2.4, 0.9])); // ~2 away from the cluster
        (set, cluster_mean)
    }

    #[test]
    fn test_rejects_single_outlier_and_returns_cluster_mean() {
        let (set, cluster_mean) = clustered_set();
        for seed in 0..5 {
            let mut agg = RobustAggregator::with_candidate_source(
                0.9,
                0.4,
                Box::new(RandomCandidates::seeded(seed)),
            );
            let consensus = agg.aggregate(&set).unwrap();
            assert_eq!(consensus.inliers, 9);
            assert!(consensus.trials <= 20);
            for (got, want) in consensus
                .embedding
                .as_slice()
                .iter()
                .zip(cluster_mean.as_slice())
            {
                assert_relative_eq!(*got, *want, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_outlier_candidate_does_not_reach_consensus() {
        let (set, _) = clustered_set();
        // Trial 1 picks the outlier (index 9): only itself is an inlier, so
        // the loop must continue; trial 2 picks a cluster member and stops.
        let mut agg = RobustAggregator::with_candidate_source(
            0.9,
            0.4,
            Box::new(FixedCandidates::new(vec![9, 0])),
        );
        let consensus = agg.aggregate(&set).unwrap();
        assert_eq!(consensus.trials, 2);
        assert_eq!(consensus.inliers, 9);
    }

    #[test]
    fn test_scattered_set_fails_with_stability_error() {
        // Pairwise distances of 1.0: no candidate ever covers 90%.
        let set: Vec<Embedding> = (0..5).map(|i| embedding(&[i as f32, 0.0])).collect();
        let mut agg = RobustAggregator::with_candidate_source(
            0.9,
            0.4,
            Box::new(RandomCandidates::seeded(7)),
        );
        match agg.aggregate(&set) {
            Err(AggregateError::InsufficientStability {
                best_inliers,
                needed,
                total,
                trials,
            }) => {
                assert_eq!(best_inliers, 1);
                assert_eq!(needed, 5);
                assert_eq!(total, 5);
                assert_eq!(trials, 10);
            }
            other => panic!("expected stability error, got {other:?}"),
        }
    }

    #[test]
    fn test_single_element_returns_that_element() {
        let set = vec![embedding(&[0.25, -0.75, 0.5])];
        let mut agg = RobustAggregator::new(0.9, 0.4);
        let consensus = agg.aggregate(&set).unwrap();
        assert_eq!(consensus.embedding, set[0]);
        assert_eq!(consensus.inliers, 1);
    }

    #[test]
    fn test_empty_set_is_an_error() {
        let mut agg = RobustAggregator::new(0.9, 0.4);
        assert!(matches!(
            agg.aggregate(&[]),
            Err(AggregateError::EmptySet)
        ));
    }

    #[test]
    fn test_zero_distance_threshold_requires_exact_duplicates() {
        let dup = embedding(&[1.0, 2.0]);
        let set = vec![dup.clone(), dup.clone(), embedding(&[1.0, 2.5])];
        // Candidate 0 covers the two duplicates: 2 >= 0.6 * 3.
        let mut agg = RobustAggregator::with_candidate_source(
            0.6,
            0.0,
            Box::new(FixedCandidates::new(vec![0])),
        );
        let consensus = agg.aggregate(&set).unwrap();
        assert_eq!(consensus.inliers, 2);
        assert_eq!(consensus.embedding, dup);
    }

    #[test]
    fn test_full_ratio_requires_every_embedding() {
        let set = vec![embedding(&[0.0]), embedding(&[0.3]), embedding(&[1.0])];
        let mut agg = RobustAggregator::with_candidate_source(
            1.0,
            0.4,
            Box::new(RandomCandidates::seeded(3)),
        );
        assert!(matches!(
            agg.aggregate(&set),
            Err(AggregateError::InsufficientStability { .. })
        ));
    }

    #[test]
    fn test_consensus_mean_includes_the_candidate_itself() {
        // Two points within threshold of each other; candidate is always an
        // inlier of its own trial, so the mean covers both.
        let set = vec![embedding(&[0.0, 0.0]), embedding(&[0.2, 0.0])];
        let mut agg = RobustAggregator::with_candidate_source(
            1.0,
            0.4,
            Box::new(FixedCandidates::new(vec![0])),
        );
        let consensus = agg.aggregate(&set).unwrap();
        assert_relative_eq!(consensus.embedding.as_slice()[0], 0.1, epsilon = 1e-6);
    }

    #[test]
    #[should_panic(expected = "ratio threshold must be in (0, 1]")]
    fn test_ratio_above_one_panics() {
        RobustAggregator::new(1.1, 0.4);
    }

    #[test]
    #[should_panic(expected = "distance threshold must be finite and non-negative")]
    fn test_negative_distance_panics() {
        RobustAggregator::new(0.9, -0.1);
    }
}
