//! Deterministic downsampling.
//!
//! A dataset above the threshold is reduced once per run to a seeded simple
//! random sample without replacement. Evenly strided rows would alias with
//! any column that repeats with the row index. Kept indices are sorted so
//! row order survives for time-series analysis.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use tabula_core::SamplingConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePlan {
    pub original_rows: usize,
    pub sampled_rows: usize,
    pub sampled: bool,
}

/// Row indices to keep, ascending. Identity when no sampling is needed.
pub fn sample_indices(total: usize, config: &SamplingConfig) -> Vec<usize> {
    if total <= config.sample_threshold || config.sample_size == 0 || config.sample_size >= total {
        return (0..total).collect();
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut picked = sample(&mut rng, total, config.sample_size).into_vec();
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_inputs_are_untouched() {
        let idx = sample_indices(100, &SamplingConfig::default());
        assert_eq!(idx, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn large_inputs_are_capped_and_ordered() {
        let config = SamplingConfig::default();
        let idx = sample_indices(30_000, &config);
        assert_eq!(idx.len(), config.sample_size);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert!(*idx.last().unwrap() < 30_000);
    }

    #[test]
    fn sampling_is_deterministic() {
        let config = SamplingConfig::default();
        assert_eq!(sample_indices(12_345, &config), sample_indices(12_345, &config));
    }

    #[test]
    fn seed_changes_the_sample() {
        let a = SamplingConfig::default();
        let b = SamplingConfig { seed: a.seed + 1, ..a.clone() };
        assert_ne!(sample_indices(30_000, &a), sample_indices(30_000, &b));
    }

    #[test]
    fn periodic_rows_do_not_alias() {
        // 30,000 / 5,000 is a stride of 6, a multiple of every period below.
        let idx = sample_indices(30_000, &SamplingConfig::default());
        for period in [2, 3, 6] {
            let mut seen = vec![0usize; period];
            for i in &idx {
                seen[i % period] += 1;
            }
            let expected = idx.len() / period;
            assert!(
                seen.iter().all(|&c| c > expected / 2),
                "period {period} residues: {seen:?}"
            );
        }
        let mut dedup = idx.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), idx.len());
    }
}
