//! Diffusion Monte Carlo driver.

use std::path::Path;
use std::time::Instant;

use log::info;

use super::collection::WalkerCollection;
use super::rng::RandomSource;
use super::trial_energy::TrialEnergyController;
use crate::comm::Communicator;
use crate::error::Result;
use crate::io::{Config, OutputFile, Params, RunOutputs};
use crate::system::System;

/// Run-wide state handed to every stage of an iteration.
pub struct RunContext {
    pub params: Params,
    pub system: System,
    pub trial: TrialEnergyController,
    /// Current iteration, 1-based; 0 before the first one
    pub iteration: usize,
    started: Instant,
}

impl RunContext {
    pub fn new(params: Params, system: System) -> Self {
        let trial = TrialEnergyController::new(params.trial_energy, params.tau)
            .with_feedback(params.population_damping, params.population_gain)
            .with_bounds(params.min_pop_ratio, params.max_pop_ratio);
        Self {
            params,
            system,
            trial,
            iteration: 0,
            started: Instant::now(),
        }
    }

    /// Wall-clock seconds since the context was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// What a finished run hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct DmcSummary {
    pub iterations: usize,
    pub final_population: f64,
    pub final_trial_energy: f64,
    /// Average trial energy over the second half of the run
    pub mean_trial_energy: f64,
    /// Average energy estimate over the second half of the run
    pub mean_energy_estimate: f64,
    /// Iterations whose population left the allowed band
    pub population_breaches: usize,
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn write_run_details(ctx: &RunContext, out: &mut OutputFile) -> Result<()> {
    let p = &ctx.params;
    let system = &ctx.system;
    let lines = [
        "System loaded".to_string(),
        format!("    Dimensions            : {}", system.dimensions()),
        format!("    Particles             : {}", system.particle_count()),
        format!("    Total charge          : {}", system.total_charge()),
        format!("    Exchange pairs        : {}", system.exchange_table().len()),
        format!("    Exchange moves        : {}", yes_no(p.exchange_moves)),
        format!("    Exchange prob         : {}", p.exchange_prob),
        format!("    Cancel scheme         : {}", p.cancel_scheme.name()),
        format!("    Pre diffusion         : {}", p.pre_diffusion),
        format!("    DMC timestep          : {}", p.tau),
        format!("    Cancellation timestep : {} = tau x {}", p.tau_c(), p.tau_c_ratio),
        format!("    Separation correction : {}", yes_no(p.correct_separations)),
        format!(
            "    DMC walkers           : {} (total) {} (per process)",
            p.global_target_population(),
            p.target_population
        ),
        format!(
            "    DMC iterations        : {} => Imaginary time in [0, {}]",
            p.dmc_iterations,
            p.dmc_iterations as f64 * p.tau
        ),
        format!("    Processes             : {}", p.process_count),
        format!("    Write wavefunction    : {}", yes_no(p.write_wavefunction)),
    ];
    for line in &lines {
        out.write_line(line)?;
    }

    out.write_line("Potentials")?;
    if system.potentials().is_empty() {
        out.write_line("    none")?;
    }
    for potential in system.potentials().iter() {
        out.write_line(&format!("    {}", potential.one_line_description()))?;
    }
    out.write_line("Particles")?;
    for (i, particle) in system.particles().iter().enumerate() {
        out.write_line(&format!("    {}: {}", i, particle.one_line_description()))?;
    }
    out.write_line("Exchange pairs (sign, particle 1, particle 2)")?;
    for pair in system.exchange_table().pairs() {
        out.write_line(&format!("    {} {} {}", pair.sign.as_i32(), pair.first, pair.second))?;
    }
    out.write_line("")
}

fn second_half_mean(values: &[f64]) -> f64 {
    let tail: Vec<f64> = values[values.len() / 2..]
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if tail.is_empty() {
        f64::NAN
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

/// Run the full DMC simulation on this rank.
///
/// Every rank must call this with the same parameters; the ranks meet once
/// per iteration in the branching step.
pub fn run_dmc<C: Communicator + ?Sized>(
    ctx: &mut RunContext,
    comm: &C,
    outputs: &mut RunOutputs,
) -> Result<DmcSummary> {
    write_run_details(ctx, &mut outputs.progress)?;
    outputs
        .evolution
        .write_line("# iteration population trial_energy energy_estimate")?;

    let rng = RandomSource::for_rank(ctx.params.seed, comm.rank());
    let mut walkers = WalkerCollection::new(ctx, rng);
    info!(
        "rank {}: {} walkers initialised, starting {} iterations",
        comm.rank(),
        walkers.len(),
        ctx.params.dmc_iterations
    );

    let mut trial_energies = Vec::with_capacity(ctx.params.dmc_iterations);
    let mut estimates = Vec::with_capacity(ctx.params.dmc_iterations);
    let mut final_population = walkers.len() as f64 * comm.size() as f64;
    let mut population_breaches = 0;

    for iteration in 1..=ctx.params.dmc_iterations {
        ctx.iteration = iteration;

        walkers.begin_iteration();
        let last = walkers.copy();
        walkers.diffuse(ctx);
        walkers.apply_cancellations(ctx, &last);
        walkers.make_exchange_moves(ctx);
        walkers.correct_separations(ctx);
        let report = walkers.branch(ctx, comm)?;
        walkers.write_output(ctx, outputs, &report)?;

        if report.status.is_breach() {
            population_breaches += 1;
        }
        final_population = report.global_population;
        trial_energies.push(report.trial_energy);
        estimates.push(report.energy_estimate);
    }

    outputs
        .progress
        .write_line(&format!("Done, total time: {:.3} s.", ctx.elapsed_secs()))?;
    outputs.flush()?;
    info!("rank {}: finished after {:.3} s", comm.rank(), ctx.elapsed_secs());

    Ok(DmcSummary {
        iterations: ctx.params.dmc_iterations,
        final_population,
        final_trial_energy: ctx.trial.trial_energy(),
        mean_trial_energy: second_half_mean(&trial_energies),
        mean_energy_estimate: second_half_mean(&estimates),
        population_breaches,
    })
}

/// Build the run from a parsed input and write its files into `output_dir`.
pub fn run_from_config<C: Communicator + ?Sized>(
    config: &Config,
    comm: &C,
    output_dir: impl AsRef<Path>,
) -> Result<DmcSummary> {
    let params = config.params(comm.size())?;
    let system = config.system()?;
    let mut ctx = RunContext::new(params, system);
    let mut outputs = RunOutputs::open(output_dir, comm.rank())?;
    run_dmc(&mut ctx, comm, &mut outputs)
}
