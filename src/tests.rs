use std::sync::mpsc;
use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::DVector;

use crate::comm::{Communicator, SerialComm, ThreadComm};
use crate::error::DmcError;
use crate::io::{Config, RunOutputs};
use crate::sampling::{
    run_dmc, run_from_config, RandomSource, RunContext, Sign, Walker, WalkerCollection,
};

fn context(yaml: &str) -> RunContext {
    let config = Config::from_yaml_str(yaml).unwrap();
    RunContext::new(config.params(1).unwrap(), config.system().unwrap())
}

#[test]
fn test_free_particle_population_is_stable() {
    let mut ctx = context(
        "
dimensions: 1
walkers: 1000
iterations: 1000
tau: 0.01
seed: 11
exchange_moves: false
cancel_scheme: none
write_wavefunction: false
particles:
  - { name: free, mass: 1.0, coords: [0.0] }
",
    );
    let mut outputs = RunOutputs::in_memory();
    let summary = run_dmc(&mut ctx, &SerialComm, &mut outputs).unwrap();

    // V = 0 everywhere: every weight stays exactly 1.
    assert_eq!(summary.final_population, 1000.0);
    assert_eq!(summary.final_trial_energy, 0.0);
    assert_eq!(summary.population_breaches, 0);
    assert!(outputs.error.contents().is_empty());
    assert!(outputs.wavefunction.contents().is_empty());
    assert!(outputs.progress.contents().contains("Potentials\n    none\n"));
    assert_eq!(outputs.evolution.contents().lines().count(), 1001);
}

#[test]
fn test_bosons_never_change_sign() {
    let mut ctx = context(
        "
dimensions: 1
walkers: 200
tau: 0.01
exchange_prob: 1.0
particles:
  - { name: boson, mass: 1.0, half_spins: 0, coords: [-0.5] }
  - { name: boson, mass: 1.0, half_spins: 0, coords: [0.5] }
potentials:
  - kind: harmonic_well
    omega: 1.0
",
    );
    let mut walkers = WalkerCollection::new(&ctx, RandomSource::from_seed(12));
    for iteration in 1..=50 {
        ctx.iteration = iteration;
        walkers.begin_iteration();
        let last = walkers.copy();
        walkers.diffuse(&ctx);
        let report = walkers.apply_cancellations(&ctx, &last);
        assert_eq!(report.cancelled_pairs, 0);
        walkers.make_exchange_moves(&ctx);
        walkers.correct_separations(&ctx);
        walkers.branch(&mut ctx, &SerialComm).unwrap();
        assert!(walkers.iter().all(|w| w.sign == Sign::Positive));
    }
    assert!(!walkers.is_empty());
}

#[test]
fn test_identical_opposite_sign_pair_cancels() {
    let ctx = context(
        "
dimensions: 3
walkers: 2
particles:
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [0.0, 0.0, 0.0] }
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [1.0, 0.0, 0.0] }
",
    );
    let configuration = ctx.system.template_configuration();
    let walkers = vec![
        Walker::new(configuration.clone(), 0),
        Walker::new(configuration, 1).with_sign(Sign::Negative),
    ];
    let mut walkers = WalkerCollection::from_walkers(walkers, RandomSource::from_seed(13));
    let last = walkers.copy();

    let report = walkers.apply_cancellations(&ctx, &last);
    assert_eq!(report.cancelled_pairs, 1);
    assert!(walkers.is_empty());
}

#[test]
fn test_harmonic_well_energy() {
    let mut ctx = context(
        "
dimensions: 1
walkers: 1000
iterations: 2000
tau: 0.01
seed: 14
exchange_moves: false
cancel_scheme: none
write_wavefunction: false
particles:
  - { name: particle, mass: 1.0, coords: [0.0] }
potentials:
  - kind: harmonic_well
    omega: 1.0
",
    );
    let mut outputs = RunOutputs::in_memory();
    let summary = run_dmc(&mut ctx, &SerialComm, &mut outputs).unwrap();

    // Diffusion with variance τ/2m solves H = -∇²/4m + mω²x²/2, whose ground
    // state has E0 = ω/(2√2). Walkers are distributed as ψ0, so the weighted
    // average of V is the mixed estimate ∫ψ0 V / ∫ψ0 = E0.
    let e0 = 1.0 / (2.0 * 2f64.sqrt());
    assert_relative_eq!(summary.mean_trial_energy, e0, epsilon = 0.03);
    assert_relative_eq!(summary.mean_energy_estimate, e0, epsilon = 0.03);
}

#[test]
fn test_same_seed_same_run() {
    let yaml = "
dimensions: 2
walkers: 100
iterations: 30
seed: 15
write_wavefunction: false
particles:
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [-0.5, 0.0] }
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [0.5, 0.0] }
potentials:
  - kind: harmonic_well
    omega: 1.0
";
    let run = || run_dmc(&mut context(yaml), &SerialComm, &mut RunOutputs::in_memory());
    let first = run().unwrap();
    let second = run().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_fermions_in_a_well_run_with_cancellation() {
    let mut ctx = context(
        "
dimensions: 1
walkers: 300
iterations: 100
seed: 16
correct_separations: true
min_separation: 0.05
particles:
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [-0.5] }
  - { name: fermion, mass: 1.0, half_spins: 1, coords: [0.5] }
potentials:
  - kind: harmonic_well
    omega: 1.0
",
    );
    let mut outputs = RunOutputs::in_memory();
    let summary = run_dmc(&mut ctx, &SerialComm, &mut outputs).unwrap();
    assert!(summary.final_population > 0.0);
    assert!(summary.final_trial_energy.is_finite());

    // Each wavefunction line: signed weight, then one field per particle.
    let samples = outputs.wavefunction.contents();
    let line = samples.lines().find(|l| !l.starts_with('#')).unwrap();
    let fields: Vec<&str> = line.split(", ").collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].parse::<f64>().unwrap().abs(), 1.0);
}

#[test]
fn test_ranks_share_one_population() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_yaml_str(
        "
dimensions: 3
walkers: 400
iterations: 20
seed: 17
cancel_scheme: none
particles:
  - { name: particle, mass: 1.0, coords: [0.0, 0.0, 0.0] }
potentials:
  - kind: harmonic_well
    omega: 1.0
",
    )
    .unwrap();

    let summaries: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = ThreadComm::group(2)
            .into_iter()
            .map(|comm| {
                let config = &config;
                let dir = dir.path();
                scope.spawn(move || (comm.rank(), run_from_config(config, &comm, dir).unwrap()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // The reduction makes the global quantities identical on every rank.
    assert_eq!(summaries[0].1, summaries[1].1);
    let files = ["progress", "evolution", "error_0", "error_1", "wavefunction_0", "wavefunction_1"];
    for name in files {
        assert!(dir.path().join(name).exists(), "missing {}", name);
    }
    assert!(!dir.path().join("progress_1").exists());

    let progress = std::fs::read_to_string(dir.path().join("progress")).unwrap();
    assert!(progress.contains("    DMC walkers           : 400 (total) 200 (per process)"));
    assert!(progress.contains("    Processes             : 2"));
    assert!(progress.contains("Done, total time:"));

    let wavefunction = std::fs::read_to_string(dir.path().join("wavefunction_1")).unwrap();
    assert!(wavefunction.starts_with("# iteration 1\n"));
}

#[test]
fn test_failing_rank_stops_the_others() {
    let dir = tempfile::tempdir().unwrap();
    // Rank 1 cannot create its wavefunction file.
    std::fs::create_dir(dir.path().join("wavefunction_1")).unwrap();
    let config = Config::from_yaml_str(
        "
dimensions: 1
walkers: 100
iterations: 50
seed: 19
particles:
  - { name: particle, mass: 1.0, coords: [0.0] }
",
    )
    .unwrap();

    let (tx, rx) = mpsc::channel();
    for comm in ThreadComm::group(2) {
        let (config, dir, tx) = (config.clone(), dir.path().to_path_buf(), tx.clone());
        std::thread::spawn(move || {
            let result = run_from_config(&config, &comm, dir);
            tx.send((comm.rank(), result)).unwrap();
        });
    }

    for _ in 0..2 {
        let (rank, result) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        match rank {
            0 => assert!(matches!(result, Err(DmcError::Comm(_)))),
            _ => assert!(matches!(result, Err(DmcError::Io(_)))),
        }
    }
}

#[test]
fn test_separation_correction_keeps_particles_apart() {
    let mut ctx = context(
        "
dimensions: 2
walkers: 50
correct_separations: true
min_separation: 0.3
exchange_moves: false
particles:
  - { name: a, mass: 1.0, coords: [0.0, 0.0] }
  - { name: b, mass: 2.0, coords: [0.1, 0.0] }
  - { name: c, mass: 1.0, coords: [0.0, 0.1] }
",
    );
    let mut walkers = WalkerCollection::new(&ctx, RandomSource::from_seed(18));
    for iteration in 1..=10 {
        ctx.iteration = iteration;
        walkers.diffuse(&ctx);
        walkers.correct_separations(&ctx);
        for walker in walkers.iter() {
            let d = crate::sampling::min_pair_distance(&walker.configuration).unwrap();
            assert!(d >= 0.3);
        }
    }
    let moved: f64 = walkers
        .iter()
        .map(|w| w.configuration.iter().map(DVector::norm).sum::<f64>())
        .sum();
    assert!(moved > 0.0);
}
