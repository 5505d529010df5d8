use super::Potential;
use crate::system::{Particle, Position};

/// Isotropic harmonic well centred on the origin.
///
/// V = Σᵢ ½ mᵢ ω² |rᵢ|²
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicWell {
    pub omega: f64,
}

impl HarmonicWell {
    pub fn new(omega: f64) -> Self {
        Self { omega }
    }
}

impl Potential for HarmonicWell {
    fn evaluate(&self, configuration: &[Position], particles: &[Particle]) -> f64 {
        let w2 = self.omega * self.omega;
        configuration
            .iter()
            .zip(particles)
            .map(|(r, p)| 0.5 * p.mass * w2 * r.norm_squared())
            .sum()
    }

    fn one_line_description(&self) -> String {
        format!("Harmonic well (omega: {})", self.omega)
    }
}
