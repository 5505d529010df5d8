//! The local shard of the walker ensemble and its per-iteration pipeline.
//!
//! One iteration runs, in this order:
//!
//! 1. `copy` - snapshot of the ensemble before it moves
//! 2. `diffuse` - free diffusion of every particle
//! 3. `apply_cancellations` - annihilate opposite-sign walkers that met
//! 4. `make_exchange_moves` - sample the exchange symmetry
//! 5. `correct_separations` - keep particles apart
//! 6. `branch` - birth/death against the trial energy, global population feedback
//! 7. `write_output` - progress, evolution and wavefunction records
//!
//! Stages never run concurrently and only `branch` talks to other ranks.

use std::collections::HashMap;

use log::{debug, warn};

use super::cancellation::{voronoi_cancel, CancelScheme, CancellationReport};
use super::dmc::RunContext;
use super::rng::RandomSource;
use super::separation::{enforce_min_separation, SeparationOutcome};
use super::trial_energy::PopulationStatus;
use super::walker::Walker;
use crate::comm::Communicator;
use crate::error::{DmcError, Result};
use crate::io::RunOutputs;

/// Walkers as they were before the iteration's diffusion step.
#[derive(Debug, Clone, Default)]
pub struct WalkerSnapshot {
    walkers: Vec<Walker>,
}

impl WalkerSnapshot {
    pub fn walkers(&self) -> &[Walker] {
        &self.walkers
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }
}

/// Outcome of a branching step, local and global.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchReport {
    pub local_population: usize,
    /// Population summed over all ranks
    pub global_population: f64,
    /// Clones created, summed over all ranks
    pub born: usize,
    /// Walkers removed over all ranks, including non-finite ones
    pub died: usize,
    /// Walkers killed on this rank because their energy was not finite
    pub non_finite: usize,
    /// Most walkers descended from a single ancestor on this rank
    pub largest_family: usize,
    /// Global signed-weight average of the potential energy
    pub energy_estimate: f64,
    /// Trial energy after the feedback update
    pub trial_energy: f64,
    /// Global population / global target
    pub population_ratio: f64,
    pub status: PopulationStatus,
}

/// The walkers living on this rank.
pub struct WalkerCollection {
    walkers: Vec<Walker>,
    rng: RandomSource,
}

impl WalkerCollection {
    /// `target_population` walkers at the template positions, spread out by
    /// one diffusion step scaled by `pre_diffusion`.
    pub fn new(ctx: &RunContext, rng: RandomSource) -> Self {
        let template = ctx.system.template_configuration();
        let walkers = (0..ctx.params.target_population)
            .map(|id| Walker::new(template.clone(), id as u64))
            .collect();
        let mut collection = Self { walkers, rng };
        collection.diffuse_scaled(ctx.system.masses(), ctx.params.tau, ctx.params.pre_diffusion);
        collection
    }

    pub fn from_walkers(walkers: Vec<Walker>, rng: RandomSource) -> Self {
        Self { walkers, rng }
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    pub fn walkers(&self) -> &[Walker] {
        &self.walkers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Walker> {
        self.walkers.iter()
    }

    /// Make every walker its own ancestor for the coming iteration.
    pub fn begin_iteration(&mut self) {
        for (id, walker) in self.walkers.iter_mut().enumerate() {
            walker.lineage_id = id as u64;
        }
    }

    pub fn copy(&self) -> WalkerSnapshot {
        WalkerSnapshot {
            walkers: self.walkers.clone(),
        }
    }

    /// Move every coordinate by N(0, τ / 2m).
    pub fn diffuse(&mut self, ctx: &RunContext) {
        self.diffuse_scaled(ctx.system.masses(), ctx.params.tau, 1.0);
    }

    /// Move every coordinate by N(0, scale · τ / 2m).
    pub fn diffuse_scaled(&mut self, masses: &[f64], tau: f64, scale: f64) {
        if scale == 0.0 {
            return;
        }
        let sigmas: Vec<f64> = masses.iter().map(|m| (scale * tau / (2.0 * m)).sqrt()).collect();
        for walker in self.walkers.iter_mut() {
            for (position, sigma) in walker.configuration.iter_mut().zip(&sigmas) {
                for x in position.iter_mut() {
                    *x += sigma * self.rng.gaussian();
                }
            }
        }
    }

    /// Cancel opposite-sign walkers against each other, comparing with the
    /// pre-diffusion snapshot `last`. Only walkers on this rank take part.
    pub fn apply_cancellations(
        &mut self,
        ctx: &RunContext,
        last: &WalkerSnapshot,
    ) -> CancellationReport {
        match ctx.params.cancel_scheme {
            CancelScheme::None => CancellationReport::default(),
            CancelScheme::Voronoi => voronoi_cancel(
                &mut self.walkers,
                &last.walkers,
                ctx.system.masses(),
                ctx.params.tau_c(),
                &mut self.rng,
            ),
        }
    }

    /// For every exchange pair and walker, swap the pair with probability
    /// `exchange_prob`. Returns the number of swaps made.
    pub fn make_exchange_moves(&mut self, ctx: &RunContext) -> usize {
        if !ctx.params.exchange_moves || ctx.params.exchange_prob <= 0.0 {
            return 0;
        }
        let mut swaps = 0;
        for pair in ctx.system.exchange_table().pairs() {
            for walker in self.walkers.iter_mut() {
                if self.rng.bernoulli(ctx.params.exchange_prob) {
                    walker.exchange(pair.first, pair.second, pair.sign);
                    swaps += 1;
                }
            }
        }
        swaps
    }

    /// Enforce `min_separation` between the particles of every walker.
    /// Returns the number of walkers that had to be corrected.
    pub fn correct_separations(&mut self, ctx: &RunContext) -> usize {
        if !ctx.params.correct_separations {
            return 0;
        }
        let masses = ctx.system.masses();
        let min_separation = ctx.params.min_separation;
        let mut corrected = 0;
        for walker in self.walkers.iter_mut() {
            let outcome = enforce_min_separation(
                &mut walker.configuration,
                masses,
                min_separation,
                &mut self.rng,
            );
            match outcome {
                SeparationOutcome::Unchanged => {}
                SeparationOutcome::Corrected => corrected += 1,
                SeparationOutcome::Unresolved => {
                    corrected += 1;
                    warn!(
                        "iteration {}: could not separate the particles of walker {}",
                        ctx.iteration, walker.lineage_id
                    );
                }
            }
        }
        corrected
    }

    /// Replicate or kill walkers by exp(-τ (V - E_T)), then feed the global
    /// population back into the trial energy.
    pub fn branch<C: Communicator + ?Sized>(
        &mut self,
        ctx: &mut RunContext,
        comm: &C,
    ) -> Result<BranchReport> {
        let tau = ctx.params.tau;
        let trial_energy = ctx.trial.trial_energy();
        let max_branch = ctx.params.max_branch;

        let old = std::mem::take(&mut self.walkers);
        let mut next = Vec::with_capacity(old.len());
        let (mut born, mut died, mut non_finite) = (0, 0, 0);
        let (mut weighted_energy, mut weight_sum) = (0.0, 0.0);

        for mut walker in old {
            let energy = ctx.system.potential_energy(&walker.configuration);
            walker.weight *= (-tau * (energy - trial_energy)).exp();
            if !energy.is_finite() || !walker.weight.is_finite() {
                non_finite += 1;
                died += 1;
                continue;
            }
            weighted_energy += walker.signed_weight() * energy;
            weight_sum += walker.signed_weight();

            let copies = ((walker.weight + self.rng.uniform()).floor() as usize).min(max_branch);
            if copies == 0 {
                died += 1;
                continue;
            }
            born += copies - 1;
            walker.weight = 1.0;
            for _ in 1..copies {
                next.push(walker.clone());
            }
            next.push(walker);
        }
        self.walkers = next;

        let mut families: HashMap<u64, usize> = HashMap::new();
        for walker in &self.walkers {
            *families.entry(walker.lineage_id).or_insert(0) += 1;
        }
        let largest_family = families.values().copied().max().unwrap_or(0);

        let global = comm.sum_all(&[
            self.walkers.len() as f64,
            weighted_energy,
            weight_sum,
            born as f64,
            died as f64,
        ])?;
        let global_population = global[0];
        if global_population < 1.0 {
            return Err(DmcError::PopulationCollapse {
                iteration: ctx.iteration,
            });
        }
        let energy_estimate = if global[2] != 0.0 { global[1] / global[2] } else { f64::NAN };

        let target = ctx.params.global_target_population() as f64;
        let status = ctx.trial.update(global_population, target);
        debug!(
            "rank {} iteration {}: {} born, {} died, population {}",
            comm.rank(),
            ctx.iteration,
            born,
            died,
            self.walkers.len()
        );

        Ok(BranchReport {
            local_population: self.walkers.len(),
            global_population,
            born: global[3] as usize,
            died: global[4] as usize,
            non_finite,
            largest_family,
            energy_estimate,
            trial_energy: ctx.trial.trial_energy(),
            population_ratio: global_population / target,
            status,
        })
    }

    /// Record the iteration: progress line and evolution record on the root
    /// rank, warnings and wavefunction samples on every rank.
    pub fn write_output(
        &self,
        ctx: &RunContext,
        outputs: &mut RunOutputs,
        report: &BranchReport,
    ) -> Result<()> {
        let iteration = ctx.iteration;

        outputs.progress.write_line(&format!(
            "iteration {}/{} population {} (local {}) trial energy {:.8} \
             energy estimate {:.8} time {:.3} s",
            iteration,
            ctx.params.dmc_iterations,
            report.global_population,
            report.local_population,
            report.trial_energy,
            report.energy_estimate,
            ctx.elapsed_secs()
        ))?;

        if report.status.is_breach() {
            let message = format!(
                "Warning: iteration {} population ratio {:.4} is outside [{}, {}]",
                iteration,
                report.population_ratio,
                ctx.params.min_pop_ratio,
                ctx.params.max_pop_ratio
            );
            warn!("{}", message);
            outputs.progress.write_line(&message)?;
            outputs.error.write_line(&message)?;
        }
        if report.non_finite > 0 {
            outputs.error.write_line(&format!(
                "Warning: iteration {} killed {} walker(s) with non-finite potential energy",
                iteration, report.non_finite
            ))?;
        }

        outputs.evolution.write_line(&format!(
            "{} {} {} {}",
            iteration, report.global_population, report.trial_energy, report.energy_estimate
        ))?;

        if ctx.params.write_wavefunction && iteration % ctx.params.wavefunction_interval == 0 {
            outputs.wavefunction.write_line(&format!("# iteration {}", iteration))?;
            for walker in &self.walkers {
                let mut fields = vec![format!("{}", walker.signed_weight())];
                for position in &walker.configuration {
                    let coords: Vec<String> = position.iter().map(|x| format!("{}", x)).collect();
                    fields.push(coords.join(" "));
                }
                outputs.wavefunction.write_line(&fields.join(", "))?;
            }
        }

        outputs.progress.flush()?;
        outputs.evolution.flush()
    }
}
