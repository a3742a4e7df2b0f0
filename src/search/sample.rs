use std::collections::BTreeSet;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use tracing::trace;
use crate::core::error::{Error, Result};
use crate::core::types::Hit;
use crate::search::hits::Hits;
use crate::search::state::{count_docs, HitsState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleSize {
    /// Fraction of the total, in `[0, 1]`
    Ratio(f64),
    Count(usize),
}

/// How many results to sample and with which seed.
///
/// The seed is fixed at construction so the same parameters always draw the
/// same sample from the same results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleParameters {
    size: SampleSize,
    seed: u64,
}

impl SampleParameters {
    pub fn ratio(ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(Error::invalid_argument(format!("sample ratio {} is outside [0, 1]", ratio)));
        }
        Ok(SampleParameters { size: SampleSize::Ratio(ratio), seed: rand::random() })
    }

    pub fn count(count: usize) -> Self {
        SampleParameters { size: SampleSize::Count(count), seed: rand::random() }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn size(&self) -> SampleSize {
        self.size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sample size for a population of `total`, never more than `total`
    pub fn number_of_hits(&self, total: usize) -> usize {
        let wanted = match self.size {
            SampleSize::Ratio(ratio) => (ratio * total as f64).round() as usize,
            SampleSize::Count(count) => count,
        };
        wanted.min(total)
    }
}

/// Distinct indices below `total`, in ascending order
pub(crate) fn sample_indices(parameters: &SampleParameters, total: usize) -> Vec<usize> {
    let k = parameters.number_of_hits(total);
    if k >= total {
        return (0..total).collect();
    }
    let mut rng = StdRng::seed_from_u64(parameters.seed);
    let mut chosen = BTreeSet::new();
    while chosen.len() < k {
        // Already drawn indices are simply drawn again
        chosen.insert(rng.gen_range(0..total));
    }
    chosen.into_iter().collect()
}

impl Hits {
    /// Uniform sample without replacement, in original hit order
    pub fn sample(&self, parameters: SampleParameters) -> Result<Hits> {
        self.ensure_all_read()?;
        let (selected, max_stats) = {
            let state = self.state();
            let selected: Vec<Hit> = sample_indices(&parameters, state.hits.len())
                .into_iter()
                .map(|i| state.hits[i])
                .collect();
            (selected, state.max_stats)
        };
        trace!(results = self.id(), sampled = selected.len(), seed = parameters.seed(), "hits sample");

        let captures = self.captures_for(&selected);
        let size = selected.len();
        let docs = count_docs(&selected);
        let state = HitsState::fixed(selected, captures, size, docs, max_stats);
        Ok(Hits::fixed(self.query_info(), state).with_sample_parameters(parameters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_must_be_a_fraction() {
        assert!(SampleParameters::ratio(1.5).is_err());
        assert!(SampleParameters::ratio(-0.1).is_err());
        assert!(SampleParameters::ratio(0.0).is_ok());
    }

    #[test]
    fn size_is_capped_at_total() {
        let params = SampleParameters::count(50).with_seed(1);
        assert_eq!(params.number_of_hits(10), 10);
        let ratio = SampleParameters::ratio(0.25).unwrap().with_seed(1);
        assert_eq!(ratio.number_of_hits(10), 3);
    }

    #[test]
    fn indices_are_distinct_sorted_and_reproducible() {
        let params = SampleParameters::count(30).with_seed(42);
        let a = sample_indices(&params, 100);
        let b = sample_indices(&params, 100);
        assert_eq!(a.len(), 30);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|&i| i < 100));
    }

    #[test]
    fn everything_when_sample_covers_total() {
        let params = SampleParameters::count(5).with_seed(7);
        assert_eq!(sample_indices(&params, 5), vec![0, 1, 2, 3, 4]);
    }
}
