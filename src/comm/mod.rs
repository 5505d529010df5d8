//! Communication between the ranks of a run.
//!
//! Each rank owns one shard of the walker population. Ranks only meet at two
//! points: the rank-ordered configuration read at startup, and the population
//! reduction after every branching step.

#[cfg(feature = "mpi")]
mod mpi_comm;

#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

use std::sync::{Arc, Condvar, Mutex};

use crate::error::{DmcError, Result};

/// Collective operations needed by the DMC driver.
pub trait Communicator {
    /// Index of this rank, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks taking part in the run.
    fn size(&self) -> usize;

    /// Block until every rank has reached the barrier.
    fn barrier(&self) -> Result<()>;

    /// Element-wise sum of `local` over all ranks, returned on every rank.
    fn sum_all(&self, local: &[f64]) -> Result<Vec<f64>>;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Run `f` on one rank at a time, in rank order.
///
/// Every rank passes through all the barriers even when its own `f` fails, so
/// an error on one rank never leaves the others waiting.
pub fn sequentially<C, T, F>(comm: &C, f: F) -> Result<T>
where
    C: Communicator + ?Sized,
    F: FnOnce() -> Result<T>,
{
    let mut f = Some(f);
    let mut result = None;
    for turn in 0..comm.size() {
        if turn == comm.rank() {
            if let Some(f) = f.take() {
                result = Some(f());
            }
        }
        comm.barrier()?;
    }
    result.unwrap_or_else(|| Err(DmcError::comm("rank never got its turn")))
}

/// A run on a single process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn sum_all(&self, local: &[f64]) -> Result<Vec<f64>> {
        Ok(local.to_vec())
    }
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    /// Set once a rank has left the group
    aborted: bool,
}

struct ThreadShared {
    size: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
    slots: Mutex<Vec<Vec<f64>>>,
}

impl ThreadShared {
    /// Barrier that fails instead of blocking forever once a rank is gone.
    fn wait(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DmcError::comm("barrier state poisoned"))?;
        if state.aborted {
            return Err(DmcError::comm("another rank left the run"));
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        loop {
            state = self
                .released
                .wait(state)
                .map_err(|_| DmcError::comm("barrier state poisoned"))?;
            if state.generation != generation {
                return Ok(());
            }
            if state.aborted {
                return Err(DmcError::comm("another rank left the run"));
            }
        }
    }

    fn abort(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.aborted = true;
        self.released.notify_all();
    }
}

/// Ranks living on threads of one process, one `ThreadComm` per thread.
///
/// Dropping a `ThreadComm` takes its rank out of the group: peers waiting in
/// a collective, or entering one later, get `DmcError::Comm`. Ranks that
/// already passed their last collective are not affected.
pub struct ThreadComm {
    rank: usize,
    shared: Arc<ThreadShared>,
}

impl ThreadComm {
    /// Create the communicators of a group of `size` ranks.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(ThreadShared {
            size,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            released: Condvar::new(),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        self.shared.abort();
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<()> {
        self.shared.wait()
    }

    fn sum_all(&self, local: &[f64]) -> Result<Vec<f64>> {
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| DmcError::comm("reduction buffer poisoned"))?;
            slots[self.rank] = local.to_vec();
        }
        self.shared.wait()?;

        let total = match self.shared.slots.lock() {
            Ok(slots) => {
                let mut total = vec![0.0; local.len()];
                let mut mismatch = None;
                for (rank, slot) in slots.iter().enumerate() {
                    if slot.len() != total.len() {
                        mismatch = Some(rank);
                        break;
                    }
                    for (t, x) in total.iter_mut().zip(slot) {
                        *t += x;
                    }
                }
                match mismatch {
                    Some(rank) => Err(DmcError::comm(format!(
                        "rank {} contributed {} values to a reduction of {}",
                        rank,
                        slots[rank].len(),
                        local.len()
                    ))),
                    None => Ok(total),
                }
            }
            Err(_) => Err(DmcError::comm("reduction buffer poisoned")),
        };
        // Nobody may overwrite a slot before every rank has read them all.
        self.shared.wait()?;
        total
    }
}
