//! Cancellation of opposite-sign walkers (sign-problem mitigation).
//!
//! Positive and negative walkers that meet in configuration space describe
//! amplitudes that should annihilate. Left alone, both sheets grow at the
//! bosonic rate and the fermionic signal drowns in noise.

use serde::{Deserialize, Serialize};

use super::rng::RandomSource;
use super::walker::Walker;

/// How opposite-sign walkers are paired for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelScheme {
    /// Mutual nearest neighbours in configuration space
    #[default]
    Voronoi,
    /// Cancellation disabled
    #[serde(alias = "off")]
    None,
}

impl CancelScheme {
    pub fn name(self) -> &'static str {
        match self {
            CancelScheme::Voronoi => "voronoi",
            CancelScheme::None => "none",
        }
    }
}

/// What one cancellation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancellationReport {
    /// Opposite-sign mutual nearest-neighbour pairs found
    pub candidate_pairs: usize,
    /// Pairs that actually cancelled
    pub cancelled_pairs: usize,
    /// Walkers deleted because their weight reached zero
    pub removed: usize,
}

/// Index of each walker's nearest neighbour under the mass-weighted metric.
/// Ties go to the lower index.
pub(crate) fn nearest_neighbours(walkers: &[Walker], masses: &[f64]) -> Vec<Option<usize>> {
    let n = walkers.len();
    let mut nearest: Vec<Option<(usize, f64)>> = vec![None; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d2 = walkers[i].distance_squared(&walkers[j], masses);
            if nearest[i].map_or(true, |(_, best)| d2 < best) {
                nearest[i] = Some((j, d2));
            }
            if nearest[j].map_or(true, |(_, best)| d2 < best) {
                nearest[j] = Some((i, d2));
            }
        }
    }
    nearest.into_iter().map(|nn| nn.map(|(j, _)| j)).collect()
}

/// Probability that two walkers crossed each other's node during the step.
///
/// With y = √m ⊙ (x_a - x_b) before (`y0`) and after (`y1`) diffusion, the
/// relative coordinate is a Brownian bridge of variance `tau_c` per
/// component, which crosses the bisecting plane with probability
/// exp(-2 y0·y1 / tau_c); opposite sides mean it certainly crossed.
pub(crate) fn crossing_probability(
    pre: (&Walker, &Walker),
    post: (&Walker, &Walker),
    masses: &[f64],
    tau_c: f64,
) -> f64 {
    let mut overlap = 0.0;
    for k in 0..masses.len() {
        let before = &pre.0.configuration[k] - &pre.1.configuration[k];
        let after = &post.0.configuration[k] - &post.1.configuration[k];
        overlap += masses[k] * before.dot(&after);
    }
    if overlap <= 0.0 {
        1.0
    } else {
        (-2.0 * overlap / tau_c).exp()
    }
}

/// Snapshot entry of walker `i`, or the walker itself when the snapshot does
/// not line up with the current ensemble.
fn pre_diffusion<'a>(walkers: &'a [Walker], snapshot: &'a [Walker], i: usize) -> &'a Walker {
    let current = &walkers[i];
    match snapshot.get(i) {
        Some(s)
            if s.lineage_id == current.lineage_id
                && s.particle_count() == current.particle_count() =>
        {
            s
        }
        _ => current,
    }
}

/// Cancel opposite-sign mutual nearest neighbours among `walkers`.
///
/// `snapshot` holds the same walkers, index for index, before diffusion.
/// A walker with no matching snapshot entry is treated as if it had not moved.
/// Each cancelled pair loses min(w_a, w_b) from both weights, so the signed
/// weight Σ s·w is conserved; walkers left with zero weight are deleted.
pub(crate) fn voronoi_cancel(
    walkers: &mut Vec<Walker>,
    snapshot: &[Walker],
    masses: &[f64],
    tau_c: f64,
    rng: &mut RandomSource,
) -> CancellationReport {
    let mut report = CancellationReport::default();
    if walkers.len() < 2 {
        return report;
    }

    let nearest = nearest_neighbours(walkers, masses);
    for a in 0..walkers.len() {
        let b = match nearest[a] {
            Some(b) if b > a && nearest[b] == Some(a) => b,
            _ => continue,
        };
        if walkers[a].sign == walkers[b].sign {
            continue;
        }
        report.candidate_pairs += 1;

        let pre = (pre_diffusion(walkers, snapshot, a), pre_diffusion(walkers, snapshot, b));
        let p = crossing_probability(pre, (&walkers[a], &walkers[b]), masses, tau_c);
        if !rng.bernoulli(p) {
            continue;
        }

        let cancelled = walkers[a].weight.min(walkers[b].weight);
        walkers[a].weight -= cancelled;
        walkers[b].weight -= cancelled;
        report.cancelled_pairs += 1;
    }

    let before_len = walkers.len();
    walkers.retain(|w| w.weight > 0.0);
    report.removed = before_len - walkers.len();
    report
}
