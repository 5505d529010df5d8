//! Particle species making up the template system.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::Position;
use crate::error::{DmcError, Result};

/// One particle of the template system.
///
/// The template positions seed the walker configurations; mass, charge and
/// spin decide how the particle diffuses, interacts and exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub charge: f64,
    /// Spin in units of 1/2 (odd = fermion, even = boson)
    #[serde(default)]
    pub half_spins: u32,
    /// Template position, one entry per dimension
    pub coords: Vec<f64>,
}

impl Particle {
    pub fn new(name: &str, mass: f64, charge: f64, half_spins: u32, coords: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            mass,
            charge,
            half_spins,
            coords,
        }
    }

    /// Template position as a `Position` vector.
    pub fn position(&self) -> Position {
        DVector::from_column_slice(&self.coords)
    }

    /// Sign picked up by the wavefunction when this particle is swapped with
    /// `other`: +1 for identical bosons, -1 for identical fermions, 0 when the
    /// two are distinguishable.
    pub fn exchange_symmetry(&self, other: &Particle) -> i32 {
        let identical = self.name == other.name
            && self.mass == other.mass
            && self.charge == other.charge
            && self.half_spins == other.half_spins;
        if !identical {
            0
        } else if self.half_spins % 2 == 0 {
            1
        } else {
            -1
        }
    }

    pub(crate) fn validate(&self, dimensions: usize) -> Result<()> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(DmcError::config(format!(
                "particle '{}' must have a positive mass, got {}",
                self.name, self.mass
            )));
        }
        if self.coords.len() != dimensions {
            return Err(DmcError::config(format!(
                "particle '{}' has {} coordinates but the system has {} dimensions",
                self.name,
                self.coords.len(),
                dimensions
            )));
        }
        Ok(())
    }

    pub fn one_line_description(&self) -> String {
        let coords: Vec<String> = self.coords.iter().map(|x| format!("{}", x)).collect();
        format!(
            "{} (mass: {}, charge: {}, half spins: {}) at ({})",
            self.name,
            self.mass,
            self.charge,
            self.half_spins,
            coords.join(", ")
        )
    }
}
