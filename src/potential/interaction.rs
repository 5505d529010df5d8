use super::Potential;
use crate::system::{Particle, Position};

/// Coulomb interaction between every pair of charged particles.
///
/// V = Σᵢ<ⱼ qᵢ qⱼ / |rᵢ - rⱼ|
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoulombInteraction;

impl Potential for CoulombInteraction {
    fn evaluate(&self, configuration: &[Position], particles: &[Particle]) -> f64 {
        let mut energy = 0.0;
        for i in 0..configuration.len() {
            let qi = particles[i].charge;
            if qi == 0.0 {
                continue;
            }
            for j in 0..i {
                let qj = particles[j].charge;
                if qj == 0.0 {
                    continue;
                }
                energy += qi * qj / (&configuration[i] - &configuration[j]).norm();
            }
        }
        energy
    }

    fn one_line_description(&self) -> String {
        "Coulomb interaction between particles".to_string()
    }
}
