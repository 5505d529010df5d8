//! Potential module - external and inter-particle potential energies.
//!
//! Every potential implements [`Potential`]; a [`PotentialSet`] adds them up.
//! New kinds of potential only need an `evaluate` and a description.

mod atomic;
mod grid;
mod harmonic;
mod interaction;

pub use atomic::AtomicPotential;
pub use grid::{GridAxis, GridPotential};
pub use harmonic::HarmonicWell;
pub use interaction::CoulombInteraction;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DmcError, Result};
use crate::system::{Particle, Position};

/// A scalar potential energy of a full particle configuration.
pub trait Potential: Send + Sync {
    /// Potential energy of `configuration`, whose entries line up with `particles`.
    fn evaluate(&self, configuration: &[Position], particles: &[Particle]) -> f64;

    /// Short human readable summary for the progress file.
    fn one_line_description(&self) -> String;
}

/// Potentials that act on the system together; energies add.
#[derive(Default)]
pub struct PotentialSet {
    potentials: Vec<Box<dyn Potential>>,
}

impl PotentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, potential: Box<dyn Potential>) {
        self.potentials.push(potential);
    }

    pub fn with(mut self, potential: impl Potential + 'static) -> Self {
        self.potentials.push(Box::new(potential));
        self
    }

    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Potential> {
        self.potentials.iter().map(|p| p.as_ref())
    }

    pub fn evaluate(&self, configuration: &[Position], particles: &[Particle]) -> f64 {
        self.potentials
            .iter()
            .map(|p| p.evaluate(configuration, particles))
            .sum()
    }
}

/// Potential entry of the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PotentialSpec {
    /// V = ½ m ω² |r|² for every particle
    HarmonicWell { omega: f64 },
    /// Fixed point charge interacting with every charged particle
    Atomic { charge: f64, coords: Vec<f64> },
    /// Pairwise Coulomb repulsion/attraction between the particles
    CoulombInteraction,
    /// External potential tabulated in a YAML grid file
    Grid { file: PathBuf },
}

impl PotentialSpec {
    pub fn build(&self, dimensions: usize) -> Result<Box<dyn Potential>> {
        match self {
            PotentialSpec::HarmonicWell { omega } => {
                if !omega.is_finite() {
                    return Err(DmcError::config(format!(
                        "harmonic well frequency must be finite, got {}",
                        omega
                    )));
                }
                Ok(Box::new(HarmonicWell::new(*omega)))
            }
            PotentialSpec::Atomic { charge, coords } => {
                if coords.len() != dimensions {
                    return Err(DmcError::config(format!(
                        "atomic potential has {} coordinates but the system has {} dimensions",
                        coords.len(),
                        dimensions
                    )));
                }
                Ok(Box::new(AtomicPotential::new(*charge, Position::from_column_slice(coords))))
            }
            PotentialSpec::CoulombInteraction => Ok(Box::new(CoulombInteraction)),
            PotentialSpec::Grid { file } => Ok(Box::new(GridPotential::read(file, dimensions)?)),
        }
    }
}
