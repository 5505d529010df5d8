//! Sampling module - walkers and the diffusion Monte Carlo pipeline.

mod cancellation;
mod collection;
mod dmc;
mod rng;
mod separation;
mod trial_energy;
mod walker;

pub use cancellation::{CancelScheme, CancellationReport};
pub use collection::{BranchReport, WalkerCollection, WalkerSnapshot};
pub use dmc::{run_dmc, run_from_config, DmcSummary, RunContext};
pub use rng::RandomSource;
pub use separation::{min_pair_distance, SeparationOutcome};
pub use trial_energy::{PopulationStatus, TrialEnergyController};
pub use walker::{Sign, Walker};
