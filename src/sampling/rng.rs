//! Per-rank random number streams.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Golden ratio increment used to spread rank seeds apart.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Uniform and Gaussian samples for one rank.
///
/// Ranks draw from independent streams; nothing is shared between them.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream for `rank`. Without a base seed the run is not reproducible.
    pub fn for_rank(seed: Option<u64>, rank: usize) -> Self {
        let base = seed.unwrap_or_else(rand::random::<u64>);
        Self::from_seed(base.wrapping_add((rank as u64).wrapping_mul(SEED_STRIDE)))
    }

    /// Sample from U[0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Sample from N(0, 1).
    pub fn gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    /// True with probability `p`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.uniform() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RandomSource::for_rank(Some(7), 2);
        let mut b = RandomSource::for_rank(Some(7), 2);
        for _ in 0..10 {
            assert_eq!(a.uniform(), b.uniform());
            assert_eq!(a.gaussian(), b.gaussian());
        }
    }

    #[test]
    fn test_ranks_get_different_streams() {
        let mut a = RandomSource::for_rank(Some(7), 0);
        let mut b = RandomSource::for_rank(Some(7), 1);
        let xs: Vec<f64> = (0..5).map(|_| a.uniform()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.uniform()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_bernoulli_limits() {
        let mut rng = RandomSource::from_seed(1);
        assert!((0..100).all(|_| !rng.bernoulli(0.0)));
        assert!((0..100).all(|_| rng.bernoulli(1.0)));
    }
}
