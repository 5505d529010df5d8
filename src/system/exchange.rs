//! Table of exchangeable particle pairs.

use super::Particle;
use crate::sampling::Sign;

/// A pair of identical particles whose positions may be swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangePair {
    /// Lower particle index
    pub first: usize,
    /// Higher particle index
    pub second: usize,
    /// Sign the wavefunction picks up under the swap
    pub sign: Sign,
}

/// Exchange pairs of a template system, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeTable {
    pairs: Vec<ExchangePair>,
}

impl ExchangeTable {
    /// Collect every pair `(j, i)`, `j < i`, with non-zero exchange symmetry.
    pub fn from_particles(particles: &[Particle]) -> Self {
        let mut pairs = Vec::new();
        for (i, p1) in particles.iter().enumerate() {
            for (j, p2) in particles.iter().enumerate().take(i) {
                let sign = match p1.exchange_symmetry(p2) {
                    1 => Sign::Positive,
                    -1 => Sign::Negative,
                    _ => continue,
                };
                pairs.push(ExchangePair { first: j, second: i, sign });
            }
        }
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ExchangePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
