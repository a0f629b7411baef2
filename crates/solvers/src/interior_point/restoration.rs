//! Feasibility restoration.
//!
//! When no step length passes the filter, the objective is set aside and the
//! iterate minimizes
//!
//! ```text
//! ψ(z) = ½ ‖h(z)‖² - μ Σ ln(gaps) + ½ ζ ‖D(z - z_R)‖²
//! ```
//!
//! by Levenberg–Marquardt steps, where `z_R` is the point restoration started
//! from, `D = diag(1 / max(1, |z_R|))` and `ζ = √μ`. The steps need not
//! satisfy the linearized constraints, so they escape points where the
//! constraint linearization and the bounds cannot both be met. Restoration
//! ends once `θ = ‖h‖₁` has dropped by a tenth and the filter accepts the
//! point.

use nalgebra::{DMatrix, DVector};

use super::{
    Error, NlpProblem,
    barrier::{Barrier, Evaluation},
    line_search::{Filter, barrier_objective, gaps, max_step},
};

const ITERATIONS: usize = 100;
const REDUCTION: f64 = 0.9;
const ARMIJO: f64 = 1e-4;
const BACKTRACKS: usize = 40;

/// A point that is acceptable to the filter again.
pub(super) struct Restored {
    pub z: DVector<f64>,
    pub evaluation: Evaluation,
    pub iterations: usize,
}

/// Moves from `z` toward feasibility.
///
/// Returns `None` if `z` is already feasible or no further reduction of the
/// infeasibility can be found.
pub(super) fn restore<P: NlpProblem>(
    barrier: &Barrier<'_, P>,
    z: &DVector<f64>,
    evaluation: &Evaluation,
    filter: &Filter,
    mu: f64,
    tau: f64,
) -> Result<Option<Restored>, Error> {
    let (lower, upper) = (barrier.lower(), barrier.upper());
    let theta_start = evaluation.residual.lp_norm(1);
    if theta_start <= f64::MIN_POSITIVE {
        return Ok(None);
    }

    let reference = z.clone();
    let zeta = mu.sqrt();
    let proximity = reference.map(|r| zeta / r.abs().max(1.0).powi(2));
    let psi = |z: &DVector<f64>, evaluation: &Evaluation| {
        let (below, above) = gaps(z, lower, upper);
        let pull = (z - &reference).component_mul(&(z - &reference)).dot(&proximity);
        barrier_objective(0.5 * evaluation.residual.norm_squared() + 0.5 * pull, &below, &above, mu)
    };

    let mut z = z.clone();
    let mut evaluation = evaluation.clone();
    for iteration in 1..=ITERATIONS {
        let jacobian = barrier.linearize(&z)?.jacobian;
        let (below, above) = gaps(&z, lower, upper);
        let gradient = DVector::from_fn(z.len(), |i, _| {
            proximity[i] * (z[i] - reference[i]) - mu / below[i] + mu / above[i]
        }) + jacobian.tr_mul(&evaluation.residual);
        let mut normal = jacobian.tr_mul(&jacobian);
        for i in 0..z.len() {
            normal[(i, i)] += proximity[i] + mu / (below[i] * below[i]) + mu / (above[i] * above[i]);
        }
        let Some(dz) = normal.cholesky().map(|c| -c.solve(&gradient)) else {
            return Ok(None);
        };

        let current = psi(&z, &evaluation);
        let slope = gradient.dot(&dz);
        let mut alpha = max_step(&below, &dz, tau).min(max_step(&above, &(-&dz), tau));
        let mut next = None;
        for _ in 0..BACKTRACKS {
            let trial = &z + &dz * alpha;
            let trial_evaluation = barrier.evaluate(&trial)?;
            let value = psi(&trial, &trial_evaluation);
            if value.is_finite() && value <= current + ARMIJO * alpha * slope {
                next = Some((trial, trial_evaluation));
                break;
            }
            alpha *= 0.5;
        }
        let Some((trial, trial_evaluation)) = next else {
            return Ok(None);
        };
        z = trial;
        evaluation = trial_evaluation;

        let theta = evaluation.residual.lp_norm(1);
        let (below, above) = gaps(&z, lower, upper);
        let phi = barrier_objective(evaluation.values.objective, &below, &above, mu);
        if theta <= REDUCTION * theta_start && filter.accepts(theta, phi) {
            return Ok(Some(Restored {
                z,
                evaluation,
                iterations: iteration,
            }));
        }
    }
    Ok(None)
}
