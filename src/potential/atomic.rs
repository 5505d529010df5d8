use super::Potential;
use crate::system::{Particle, Position};

/// Fixed point charge (a clamped nucleus) at `center`.
///
/// V = Σᵢ qᵢ Z / |rᵢ - R|
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicPotential {
    pub charge: f64,
    pub center: Position,
}

impl AtomicPotential {
    pub fn new(charge: f64, center: Position) -> Self {
        Self { charge, center }
    }
}

impl Potential for AtomicPotential {
    fn evaluate(&self, configuration: &[Position], particles: &[Particle]) -> f64 {
        configuration
            .iter()
            .zip(particles)
            .filter(|(_, p)| p.charge != 0.0)
            .map(|(r, p)| p.charge * self.charge / (r - &self.center).norm())
            .sum()
    }

    fn one_line_description(&self) -> String {
        let coords: Vec<String> = self.center.iter().map(|x| format!("{}", x)).collect();
        format!("Atomic potential (charge: {}) at ({})", self.charge, coords.join(", "))
    }
}
