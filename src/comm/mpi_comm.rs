use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives};

use super::Communicator;
use crate::error::{DmcError, Result};

/// Ranks as MPI processes on `MPI_COMM_WORLD`.
///
/// MPI is finalised when the value is dropped.
pub struct MpiComm {
    world: SimpleCommunicator,
    _universe: Universe,
}

impl MpiComm {
    pub fn initialize() -> Result<Self> {
        let universe =
            mpi::initialize().ok_or_else(|| DmcError::comm("MPI is already initialised"))?;
        let world = universe.world();
        Ok(Self {
            world,
            _universe: universe,
        })
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn sum_all(&self, local: &[f64]) -> Result<Vec<f64>> {
        let mut global = vec![0.0; local.len()];
        self.world.all_reduce_into(local, &mut global[..], SystemOperation::sum());
        Ok(global)
    }
}
