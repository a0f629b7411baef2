//! Filter line search.
//!
//! A trial point is judged by two measures: the infeasibility `θ = ‖h‖₁` and
//! the barrier objective `φ = f - μ Σ ln(gaps)`. It is accepted when it
//! reduces either one sufficiently and is not dominated by a filter entry.
//! Close to feasibility, and when the step promises enough objective
//! decrease, an Armijo condition on `φ` is demanded instead.

use nalgebra::DVector;

/// Armijo fraction for `φ`.
const ETA_PHI: f64 = 1e-8;
/// Required reduction of `θ`, relative.
const GAMMA_THETA: f64 = 1e-5;
/// Required reduction of `φ`, relative to `θ`.
const GAMMA_PHI: f64 = 1e-8;
/// Safety factor on the smallest step before restoration.
const GAMMA_ALPHA: f64 = 0.05;
const DELTA: f64 = 1.0;
const S_THETA: f64 = 1.1;
const S_PHI: f64 = 2.3;

/// Distances `z - l` and `u - z`; infinite where the bound is absent.
pub(super) fn gaps(
    z: &DVector<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> (DVector<f64>, DVector<f64>) {
    let below = DVector::from_fn(z.len(), |i, _| {
        if lower[i].is_finite() { z[i] - lower[i] } else { f64::INFINITY }
    });
    let above = DVector::from_fn(z.len(), |i, _| {
        if upper[i].is_finite() { upper[i] - z[i] } else { f64::INFINITY }
    });
    (below, above)
}

/// Largest `α ≤ 1` keeping `gap + α·direction ≥ (1 - τ)·gap` for every entry.
pub(super) fn max_step(gaps: &DVector<f64>, direction: &DVector<f64>, tau: f64) -> f64 {
    gaps.iter()
        .zip(direction.iter())
        .filter(|&(_, &d)| d < 0.0)
        .map(|(&g, &d)| -tau * g / d)
        .fold(1.0, f64::min)
}

/// Largest absolute entry; NaN if any entry is NaN.
pub(super) fn norm_inf(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, &x| {
        if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x.abs()) }
    })
}

fn log_barrier(gaps: &DVector<f64>) -> f64 {
    gaps.iter()
        .filter(|g| g.is_finite())
        .map(|&g| if g > 0.0 { g.ln() } else { f64::NEG_INFINITY })
        .sum()
}

/// `f - μ Σ ln(gaps)`; infinite outside the bounds.
pub(super) fn barrier_objective(objective: f64, below: &DVector<f64>, above: &DVector<f64>, mu: f64) -> f64 {
    objective - mu * (log_barrier(below) + log_barrier(above))
}

/// Gradient of `f - μ Σ ln(gaps)`.
pub(super) fn barrier_gradient(
    gradient: &DVector<f64>,
    below: &DVector<f64>,
    above: &DVector<f64>,
    mu: f64,
) -> DVector<f64> {
    DVector::from_fn(gradient.len(), |i, _| gradient[i] - mu / below[i] + mu / above[i])
}

/// Pairs `(θ, φ)` that later iterates must improve on.
#[derive(Debug, Clone)]
pub(super) struct Filter {
    theta_max: f64,
    entries: Vec<(f64, f64)>,
}

impl Filter {
    /// An empty filter that still rejects `θ > theta_max`.
    pub(super) fn new(theta_max: f64) -> Self {
        Self {
            theta_max,
            entries: Vec::new(),
        }
    }

    pub(super) fn accepts(&self, theta: f64, phi: f64) -> bool {
        theta <= self.theta_max && self.entries.iter().all(|&(t, p)| theta < t || phi < p)
    }

    /// Adds the margin-shifted pair of an iterate and drops entries it dominates.
    pub(super) fn augment(&mut self, theta: f64, phi: f64) {
        let entry = ((1.0 - GAMMA_THETA) * theta, phi - GAMMA_PHI * theta);
        self.entries.retain(|&(t, p)| t < entry.0 || p < entry.1);
        self.entries.push(entry);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// How a trial point fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Verdict {
    Reject,
    /// Accepted by the Armijo condition; the filter is left alone.
    Armijo,
    /// Accepted by reducing `θ` or `φ`; the current iterate joins the filter.
    Reduction,
}

/// The acceptance tests around one iterate and search direction.
#[derive(Debug, Clone, Copy)]
pub(super) struct Criteria {
    pub theta: f64,
    pub phi: f64,
    /// `∇φᵀdz`
    pub slope: f64,
    /// Below this infeasibility the Armijo condition may take over.
    pub theta_min: f64,
}

impl Criteria {
    /// Whether the predicted decrease of `φ` outweighs the infeasibility.
    fn switching(&self, alpha: f64) -> bool {
        self.slope < 0.0 && alpha * (-self.slope).powf(S_PHI) > DELTA * self.theta.powf(S_THETA)
    }

    /// Step length below which no trial can pass.
    pub(super) fn alpha_min(&self) -> f64 {
        let mut alpha = GAMMA_THETA;
        if self.slope < 0.0 {
            alpha = alpha.min(GAMMA_PHI * self.theta / -self.slope);
            if self.theta <= self.theta_min {
                alpha = alpha.min(DELTA * self.theta.powf(S_THETA) / (-self.slope).powf(S_PHI));
            }
        }
        GAMMA_ALPHA * alpha
    }

    pub(super) fn judge(&self, alpha: f64, theta: f64, phi: f64, filter: &Filter) -> Verdict {
        if !theta.is_finite() || !phi.is_finite() || !filter.accepts(theta, phi) {
            return Verdict::Reject;
        }
        if self.switching(alpha) && self.theta <= self.theta_min {
            if phi <= self.phi + ETA_PHI * alpha * self.slope {
                Verdict::Armijo
            } else {
                Verdict::Reject
            }
        } else if theta <= (1.0 - GAMMA_THETA) * self.theta || phi <= self.phi - GAMMA_PHI * self.theta {
            Verdict::Reduction
        } else {
            Verdict::Reject
        }
    }
}
