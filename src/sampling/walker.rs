//! A single DMC walker.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::system::Position;

/// Which sheet of the (anti)symmetric wavefunction a walker samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn as_i32(self) -> i32 {
        match self {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.as_i32() as f64
    }
}

impl Mul for Sign {
    type Output = Sign;

    fn mul(self, rhs: Sign) -> Sign {
        if self == rhs {
            Sign::Positive
        } else {
            Sign::Negative
        }
    }
}

/// One stochastic sample of the full particle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker {
    /// Particle positions, in template order
    pub configuration: Vec<Position>,
    /// Branching weight accumulated since the last branching step
    pub weight: f64,
    pub sign: Sign,
    /// Ancestor at the start of the current iteration
    pub lineage_id: u64,
}

impl Walker {
    pub fn new(configuration: Vec<Position>, lineage_id: u64) -> Self {
        Self {
            configuration,
            weight: 1.0,
            sign: Sign::Positive,
            lineage_id,
        }
    }

    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn particle_count(&self) -> usize {
        self.configuration.len()
    }

    /// `sign × weight`, the walker's contribution to the signed population.
    pub fn signed_weight(&self) -> f64 {
        self.sign.as_f64() * self.weight
    }

    /// Swap two particles' positions and pick up the exchange sign.
    pub fn exchange(&mut self, first: usize, second: usize, sign: Sign) {
        self.configuration.swap(first, second);
        self.sign = self.sign * sign;
    }

    /// Mass-weighted squared distance Σₖ mₖ |xₖ - yₖ|² to another walker.
    pub fn distance_squared(&self, other: &Walker, masses: &[f64]) -> f64 {
        self.configuration
            .iter()
            .zip(&other.configuration)
            .zip(masses)
            .map(|((a, b), m)| m * (a - b).norm_squared())
            .sum()
    }
}
