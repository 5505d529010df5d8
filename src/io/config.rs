//! Input file handling.
//!
//! The input is a YAML document, for example a 1D two-fermion harmonic well:
//!
//! ```yaml
//! dimensions: 1
//! walkers: 2000
//! iterations: 5000
//! tau: 0.01
//! cancel_scheme: voronoi
//! particles:
//!   - { name: fermion, mass: 1.0, half_spins: 1, coords: [-0.5] }
//!   - { name: fermion, mass: 1.0, half_spins: 1, coords: [0.5] }
//! potentials:
//!   - kind: harmonic_well
//!     omega: 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::comm::{sequentially, Communicator};
use crate::error::{DmcError, Result};
use crate::potential::{PotentialSet, PotentialSpec};
use crate::sampling::CancelScheme;
use crate::system::{Particle, System};

/// Everything the input file can set. Missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dimensions: usize,
    /// Total target population over all ranks
    pub walkers: usize,
    pub iterations: usize,
    pub tau: f64,
    pub tau_c_ratio: f64,
    pub pre_diffusion: f64,
    pub trial_energy: f64,
    pub max_pop_ratio: f64,
    pub min_pop_ratio: f64,
    pub exchange_moves: bool,
    pub exchange_prob: f64,
    pub cancel_scheme: CancelScheme,
    pub correct_separations: bool,
    pub min_separation: f64,
    pub max_branch: usize,
    pub population_damping: f64,
    pub population_gain: f64,
    pub write_wavefunction: bool,
    pub wavefunction_interval: usize,
    pub seed: Option<u64>,
    pub particles: Vec<Particle>,
    pub potentials: Vec<PotentialSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dimensions: 3,
            walkers: 1000,
            iterations: 1000,
            tau: 0.01,
            tau_c_ratio: 1.0,
            pre_diffusion: 1.0,
            trial_energy: 0.0,
            max_pop_ratio: 4.0,
            min_pop_ratio: 0.5,
            exchange_moves: true,
            exchange_prob: 0.5,
            cancel_scheme: CancelScheme::Voronoi,
            correct_separations: false,
            min_separation: 0.01,
            max_branch: 3,
            population_damping: 0.3,
            population_gain: 0.03,
            write_wavefunction: true,
            wavefunction_interval: 1,
            seed: None,
            particles: Vec::new(),
            potentials: Vec::new(),
        }
    }
}

/// Run parameters of one rank, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub dimensions: usize,
    /// Target population of this rank
    pub target_population: usize,
    pub process_count: usize,
    pub dmc_iterations: usize,
    pub tau: f64,
    pub tau_c_ratio: f64,
    pub pre_diffusion: f64,
    /// Starting trial energy
    pub trial_energy: f64,
    pub max_pop_ratio: f64,
    pub min_pop_ratio: f64,
    pub exchange_moves: bool,
    pub exchange_prob: f64,
    pub cancel_scheme: CancelScheme,
    pub correct_separations: bool,
    pub min_separation: f64,
    pub max_branch: usize,
    pub population_damping: f64,
    pub population_gain: f64,
    pub write_wavefunction: bool,
    pub wavefunction_interval: usize,
    pub seed: Option<u64>,
}

impl Params {
    /// Cancellation time step τ_c = τ × tau_c_ratio.
    pub fn tau_c(&self) -> f64 {
        self.tau * self.tau_c_ratio
    }

    /// Target population summed over all ranks.
    pub fn global_target_population(&self) -> usize {
        self.target_population * self.process_count
    }
}

fn require(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(DmcError::Config(message()))
    }
}

impl Config {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Validate the numbers and split the population over `process_count` ranks.
    pub fn params(&self, process_count: usize) -> Result<Params> {
        require(process_count >= 1, || "at least one process is needed".into())?;
        require(self.dimensions >= 1, || "dimensions must be at least 1".into())?;
        require(self.walkers >= process_count, || {
            format!("{} walkers cannot be shared over {} processes", self.walkers, process_count)
        })?;
        require(self.tau > 0.0 && self.tau.is_finite(), || {
            format!("tau must be positive, got {}", self.tau)
        })?;
        require(self.tau_c_ratio > 0.0 && self.tau_c_ratio.is_finite(), || {
            format!("tau_c_ratio must be positive, got {}", self.tau_c_ratio)
        })?;
        require(self.pre_diffusion >= 0.0 && self.pre_diffusion.is_finite(), || {
            format!("pre_diffusion must be non-negative, got {}", self.pre_diffusion)
        })?;
        require(self.trial_energy.is_finite(), || "trial_energy must be finite".into())?;
        require((0.0..=1.0).contains(&self.exchange_prob), || {
            format!("exchange_prob must lie in [0, 1], got {}", self.exchange_prob)
        })?;
        require(
            self.min_pop_ratio > 0.0 && self.min_pop_ratio <= 1.0 && self.max_pop_ratio >= 1.0,
            || {
                format!(
                    "population ratios must satisfy 0 < min_pop_ratio <= 1 <= max_pop_ratio, \
                     got {} and {}",
                    self.min_pop_ratio, self.max_pop_ratio
                )
            },
        )?;
        require(self.min_separation >= 0.0, || {
            format!("min_separation must be non-negative, got {}", self.min_separation)
        })?;
        require(self.max_branch >= 1, || "max_branch must be at least 1".into())?;
        require(self.wavefunction_interval >= 1, || {
            "wavefunction_interval must be at least 1".into()
        })?;
        require(self.population_damping >= 0.0 && self.population_gain >= 0.0, || {
            "population feedback constants must be non-negative".into()
        })?;

        Ok(Params {
            dimensions: self.dimensions,
            target_population: self.walkers / process_count,
            process_count,
            dmc_iterations: self.iterations,
            tau: self.tau,
            tau_c_ratio: self.tau_c_ratio,
            pre_diffusion: self.pre_diffusion,
            trial_energy: self.trial_energy,
            max_pop_ratio: self.max_pop_ratio,
            min_pop_ratio: self.min_pop_ratio,
            exchange_moves: self.exchange_moves,
            exchange_prob: self.exchange_prob,
            cancel_scheme: self.cancel_scheme,
            correct_separations: self.correct_separations,
            min_separation: self.min_separation,
            max_branch: self.max_branch,
            population_damping: self.population_damping,
            population_gain: self.population_gain,
            write_wavefunction: self.write_wavefunction,
            wavefunction_interval: self.wavefunction_interval,
            seed: self.seed,
        })
    }

    /// Build the particle system and its potentials.
    pub fn system(&self) -> Result<System> {
        let mut potentials = PotentialSet::new();
        for spec in &self.potentials {
            potentials.push(spec.build(self.dimensions)?);
        }
        System::new(self.dimensions, self.particles.clone(), potentials)
    }
}

/// Read the input file one rank at a time.
pub fn load_config<C: Communicator + ?Sized>(path: impl AsRef<Path>, comm: &C) -> Result<Config> {
    let path = path.as_ref();
    sequentially(comm, || Config::read(path))
}
