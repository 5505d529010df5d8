//! Feedback control of the trial (reference) energy.

/// Where the global population sits relative to its allowed band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationStatus {
    Stable,
    /// Population ratio above `max_pop_ratio`
    AboveMax,
    /// Population ratio below `min_pop_ratio`
    BelowMin,
}

impl PopulationStatus {
    pub fn is_breach(self) -> bool {
        self != PopulationStatus::Stable
    }
}

/// Keeps the walker population near its target by steering the trial energy.
///
/// Each update applies
///
///   E_T ← E_T - (damping · ln(N / N_prev) + gain · ln(N / N_target)) / τ
///
/// The first term opposes the current growth rate, the second pulls the
/// population back to its target. Outside the `[min_ratio, max_ratio]` band
/// the target term is applied in full for that step.
#[derive(Debug, Clone)]
pub struct TrialEnergyController {
    trial_energy: f64,
    tau: f64,
    damping: f64,
    gain: f64,
    min_ratio: f64,
    max_ratio: f64,
    previous_population: Option<f64>,
}

impl TrialEnergyController {
    pub fn new(trial_energy: f64, tau: f64) -> Self {
        Self {
            trial_energy,
            tau,
            damping: 0.3,
            gain: 0.03,
            min_ratio: 0.5,
            max_ratio: 4.0,
            previous_population: None,
        }
    }

    pub fn with_feedback(mut self, damping: f64, gain: f64) -> Self {
        self.damping = damping;
        self.gain = gain;
        self
    }

    pub fn with_bounds(mut self, min_ratio: f64, max_ratio: f64) -> Self {
        self.min_ratio = min_ratio;
        self.max_ratio = max_ratio;
        self
    }

    pub fn trial_energy(&self) -> f64 {
        self.trial_energy
    }

    /// Classify a population ratio `N / N_target` against the allowed band.
    pub fn status(&self, ratio: f64) -> PopulationStatus {
        if ratio > self.max_ratio {
            PopulationStatus::AboveMax
        } else if ratio < self.min_ratio {
            PopulationStatus::BelowMin
        } else {
            PopulationStatus::Stable
        }
    }

    /// Feed back the global population after a branching step.
    ///
    /// `population` must be positive; an empty ensemble is handled by the caller.
    pub fn update(&mut self, population: f64, target: f64) -> PopulationStatus {
        let previous = self.previous_population.unwrap_or(target);
        let ratio = population / target;
        let status = self.status(ratio);

        let gain = if status.is_breach() { 1.0 } else { self.gain };
        let growth = (population / previous).ln();
        self.trial_energy -= (self.damping * growth + gain * ratio.ln()) / self.tau;
        self.previous_population = Some(population);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equilibrium_leaves_trial_energy_alone() {
        let mut controller = TrialEnergyController::new(-0.5, 0.01);
        for _ in 0..10 {
            assert_eq!(controller.update(1000.0, 1000.0), PopulationStatus::Stable);
        }
        assert_relative_eq!(controller.trial_energy(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_large_population_lowers_trial_energy() {
        let mut controller = TrialEnergyController::new(0.0, 0.01);
        controller.update(1200.0, 1000.0);
        assert!(controller.trial_energy() < 0.0);

        let mut controller = TrialEnergyController::new(0.0, 0.01);
        controller.update(800.0, 1000.0);
        assert!(controller.trial_energy() > 0.0);
    }

    #[test]
    fn test_breach_is_reported() {
        let controller = TrialEnergyController::new(0.0, 0.01).with_bounds(0.5, 2.0);
        assert_eq!(controller.status(2.5), PopulationStatus::AboveMax);
        assert_eq!(controller.status(0.25), PopulationStatus::BelowMin);
        assert_eq!(controller.status(1.0), PopulationStatus::Stable);
    }

    #[test]
    fn test_feedback_settles_a_growing_population() {
        // Deterministic population model: ln N grows by τ (E_T - E0) per step.
        let (tau, e0, target) = (0.01, -1.3, 1000.0);
        let mut controller = TrialEnergyController::new(0.0, tau);
        let mut population = target;
        for _ in 0..2000 {
            population *= (tau * (controller.trial_energy() - e0)).exp();
            controller.update(population, target);
        }
        assert_relative_eq!(controller.trial_energy(), e0, epsilon = 1e-6);
        assert_relative_eq!(population, target, epsilon = 1e-3);
    }
}
