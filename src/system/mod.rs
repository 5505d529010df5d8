//! System module - particle template, exchange table and potentials.

mod exchange;
mod particle;

pub use exchange::{ExchangePair, ExchangeTable};
pub use particle::Particle;

use nalgebra::DVector;

use crate::error::{DmcError, Result};
use crate::potential::PotentialSet;

/// Position of one particle in D dimensions.
pub type Position = DVector<f64>;

/// The physical system a run samples: particles, their exchange pairs and the
/// potentials acting on them. Read-only once built.
pub struct System {
    dimensions: usize,
    particles: Vec<Particle>,
    masses: Vec<f64>,
    exchange: ExchangeTable,
    potentials: PotentialSet,
}

impl System {
    /// Build a system, deriving the exchange table from the particles.
    pub fn new(
        dimensions: usize,
        particles: Vec<Particle>,
        potentials: PotentialSet,
    ) -> Result<Self> {
        if dimensions == 0 {
            return Err(DmcError::config("dimensions must be at least 1"));
        }
        if particles.is_empty() {
            return Err(DmcError::config("the system needs at least one particle"));
        }
        for particle in &particles {
            particle.validate(dimensions)?;
        }
        let masses = particles.iter().map(|p| p.mass).collect();
        let exchange = ExchangeTable::from_particles(&particles);
        Ok(Self {
            dimensions,
            particles,
            masses,
            exchange,
            potentials,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn exchange_table(&self) -> &ExchangeTable {
        &self.exchange
    }

    pub fn potentials(&self) -> &PotentialSet {
        &self.potentials
    }

    pub fn total_charge(&self) -> f64 {
        self.particles.iter().map(|p| p.charge).sum()
    }

    /// Configuration with every particle at its template position.
    pub fn template_configuration(&self) -> Vec<Position> {
        self.particles.iter().map(|p| p.position()).collect()
    }

    /// Total potential energy of a configuration.
    pub fn potential_energy(&self, configuration: &[Position]) -> f64 {
        self.potentials.evaluate(configuration, &self.particles)
    }
}
