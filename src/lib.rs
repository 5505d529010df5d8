//! Rust DMC - diffusion Monte Carlo for systems of distinguishable, bosonic and
//! fermionic particles.
//!
//! A population of walkers, each a full particle configuration, diffuses in
//! imaginary time and branches according to the potential energy. Fermionic
//! exchange symmetry is sampled with signed walkers: exchange moves flip the
//! sign of a walker and walkers of opposite sign that meet are cancelled.
//! The population may be spread over several ranks, see [`comm`].

pub mod comm;
pub mod error;
pub mod io;
pub mod potential;
pub mod sampling;
pub mod system;

// Re-export commonly used types at crate root
pub use comm::{Communicator, SerialComm, ThreadComm};
pub use error::{DmcError, Result};
pub use io::{load_config, Config, Params, RunOutputs};
pub use potential::{Potential, PotentialSet, PotentialSpec};
pub use sampling::{
    run_dmc, run_from_config, DmcSummary, RunContext, Sign, Walker, WalkerCollection,
};
pub use system::{Particle, Position, System};

#[cfg(test)]
mod tests;
