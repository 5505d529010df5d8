use std::path::PathBuf;
use std::process;
#[cfg(not(feature = "mpi"))]
use std::sync::mpsc;

use clap::Parser;
use log::{error, info};

use rust_dmc::{load_config, run_from_config, Communicator, DmcSummary, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Diffusion Monte Carlo with signed walkers", long_about = None)]
struct Args {
    /// YAML input file
    #[arg(short, long, default_value = "input.yml")]
    config: PathBuf,

    /// Directory receiving progress, evolution, error and wavefunction files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of in-process ranks
    #[arg(short, long, default_value_t = 1)]
    ranks: usize,

    /// Base random seed, overrides the one in the input file
    #[arg(short, long)]
    seed: Option<u64>,
}

fn run_rank<C: Communicator + ?Sized>(args: &Args, comm: &C) -> Result<Option<DmcSummary>> {
    let mut config = load_config(&args.config, comm)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let summary = run_from_config(&config, comm, &args.output_dir)?;
    Ok(comm.is_root().then_some(summary))
}

#[cfg(feature = "mpi")]
fn run(args: &Args) -> Result<Option<DmcSummary>> {
    if args.ranks > 1 {
        log::warn!("--ranks is ignored when running under MPI");
    }
    let comm = rust_dmc::comm::MpiComm::initialize()?;
    run_rank(args, &comm)
}

#[cfg(not(feature = "mpi"))]
fn run(args: &Args) -> Result<Option<DmcSummary>> {
    if args.ranks <= 1 {
        return run_rank(args, &rust_dmc::SerialComm);
    }
    let comms = rust_dmc::ThreadComm::group(args.ranks);
    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = run_rank(args, &comm);
                    // Leaving the group releases peers stuck in a collective.
                    drop(comm);
                    let _ = tx.send(result);
                })
            })
            .collect();
        drop(tx);

        // Results arrive in completion order, the first failure wins.
        let mut outcome = Ok(None);
        for result in rx {
            match result {
                Ok(Some(summary)) if outcome.is_ok() => outcome = Ok(Some(summary)),
                Ok(_) => {}
                Err(e) if outcome.is_ok() => outcome = Err(e),
                Err(e) => error!("{}", e),
            }
        }
        for handle in handles {
            if handle.join().is_err() && outcome.is_ok() {
                outcome = Err(rust_dmc::DmcError::Comm("a rank panicked".into()));
            }
        }
        outcome
    })
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    info!("reading {}", args.config.display());

    match run(&args) {
        Ok(Some(summary)) => {
            println!("DMC Simulation Results");
            println!("----------------------------------------");
            println!("Iterations: {}", summary.iterations);
            println!("Final population: {}", summary.final_population);
            println!("Final trial energy: {:.6}", summary.final_trial_energy);
            println!("Average trial energy (second half): {:.6}", summary.mean_trial_energy);
            println!("Average energy estimate (second half): {:.6}", summary.mean_energy_estimate);
            println!("Population breaches: {}", summary.population_breaches);
        }
        Ok(None) => {}
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
