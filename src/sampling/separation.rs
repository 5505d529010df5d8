//! Minimum inter-particle separation within a walker.

use nalgebra::DVector;

use super::rng::RandomSource;
use crate::system::Position;

/// Relative overshoot so rounding never leaves a pair just below the minimum.
const SEPARATION_SLACK: f64 = 1e-9;
const MAX_SEPARATION_SWEEPS: usize = 1000;

/// Result of correcting one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationOutcome {
    /// Every pair was already far enough apart
    Unchanged,
    Corrected,
    /// Sweeps ran out with a pair still too close
    Unresolved,
}

/// Smallest distance between any two particles, `None` for a single particle.
pub fn min_pair_distance(configuration: &[Position]) -> Option<f64> {
    let mut min: Option<f64> = None;
    for i in 0..configuration.len() {
        for j in (i + 1)..configuration.len() {
            let d = (&configuration[j] - &configuration[i]).norm();
            min = Some(min.map_or(d, |m| m.min(d)));
        }
    }
    min
}

fn random_direction(dimensions: usize, rng: &mut RandomSource) -> Position {
    let v = DVector::from_fn(dimensions, |_, _| rng.gaussian());
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        let mut e = DVector::zeros(dimensions);
        e[0] = 1.0;
        e
    }
}

/// Push apart every pair of particles closer than `min_separation`.
///
/// A violating pair is moved along its separation vector until it sits at
/// `min_separation`; the lighter particle moves further so the pair's centre
/// of mass stays put. Sweeps repeat until nothing moves.
pub(crate) fn enforce_min_separation(
    configuration: &mut [Position],
    masses: &[f64],
    min_separation: f64,
    rng: &mut RandomSource,
) -> SeparationOutcome {
    if min_separation <= 0.0 {
        return SeparationOutcome::Unchanged;
    }
    let target = min_separation * (1.0 + SEPARATION_SLACK);
    let mut changed = false;

    for _ in 0..MAX_SEPARATION_SWEEPS {
        let mut moved = false;
        for i in 0..configuration.len() {
            for j in (i + 1)..configuration.len() {
                let delta = &configuration[j] - &configuration[i];
                let distance = delta.norm();
                if distance >= min_separation {
                    continue;
                }
                let direction = if distance > 0.0 {
                    delta / distance
                } else {
                    random_direction(configuration[i].len(), rng)
                };
                let push = target - distance;
                let total_mass = masses[i] + masses[j];
                configuration[i] -= &direction * (push * masses[j] / total_mass);
                configuration[j] += &direction * (push * masses[i] / total_mass);
                moved = true;
            }
        }
        if !moved {
            return if changed {
                SeparationOutcome::Corrected
            } else {
                SeparationOutcome::Unchanged
            };
        }
        changed = true;
    }

    match min_pair_distance(configuration) {
        Some(d) if d < min_separation => SeparationOutcome::Unresolved,
        _ => SeparationOutcome::Corrected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(points: &[&[f64]]) -> Vec<Position> {
        points.iter().map(|p| Position::from_column_slice(p)).collect()
    }

    #[test]
    fn test_close_pair_is_pushed_to_minimum() {
        let mut rng = RandomSource::from_seed(1);
        let mut c = config(&[&[0.0, 0.0], &[0.01, 0.0]]);
        let outcome = enforce_min_separation(&mut c, &[1.0, 1.0], 0.5, &mut rng);
        assert_eq!(outcome, SeparationOutcome::Corrected);
        assert!(min_pair_distance(&c).unwrap() >= 0.5);
        // Equal masses move symmetrically about the midpoint.
        assert!(((c[0][0] + c[1][0]) / 2.0 - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_heavy_particle_barely_moves() {
        let mut rng = RandomSource::from_seed(1);
        let mut c = config(&[&[0.0], &[0.1]]);
        enforce_min_separation(&mut c, &[1000.0, 1.0], 1.0, &mut rng);
        assert!(c[0][0].abs() < 1e-3);
        assert!(min_pair_distance(&c).unwrap() >= 1.0);
    }

    #[test]
    fn test_coincident_particles_are_separated() {
        let mut rng = RandomSource::from_seed(2);
        let mut c = config(&[&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]]);
        assert_eq!(
            enforce_min_separation(&mut c, &[1.0, 1.0, 1.0], 0.2, &mut rng),
            SeparationOutcome::Corrected
        );
        assert!(min_pair_distance(&c).unwrap() >= 0.2);
    }

    #[test]
    fn test_correction_is_idempotent() {
        let mut rng = RandomSource::from_seed(4);
        let mut c: Vec<Position> = (0..6)
            .map(|_| DVector::from_fn(3, |_, _| 0.2 * rng.gaussian()))
            .collect();
        let masses = [1.0, 2.0, 1.0, 4.0, 1.0, 1.0];
        let outcome = enforce_min_separation(&mut c, &masses, 0.3, &mut rng);
        assert_ne!(outcome, SeparationOutcome::Unresolved);
        assert!(min_pair_distance(&c).unwrap() >= 0.3);

        let corrected = c.clone();
        let outcome = enforce_min_separation(&mut c, &masses, 0.3, &mut rng);
        assert_eq!(outcome, SeparationOutcome::Unchanged);
        assert_eq!(c, corrected);
    }

    #[test]
    fn test_disabled_when_minimum_is_zero() {
        let mut rng = RandomSource::from_seed(1);
        let mut c = config(&[&[0.0], &[0.0]]);
        assert_eq!(
            enforce_min_separation(&mut c, &[1.0, 1.0], 0.0, &mut rng),
            SeparationOutcome::Unchanged
        );
    }
}
