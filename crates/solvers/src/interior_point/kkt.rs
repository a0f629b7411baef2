//! The primal-dual Newton system
//!
//! ```text
//! [ W + Σ + δI    Jᵀ  ] [ dz ]     [ ∇φ + Jᵀλ ]
//! [ J           -δc I ] [ dλ ] = - [ h        ]
//! ```
//!
//! solved by dense LU with iterative refinement. A step is accepted once
//! `dzᵀ(W + Σ + δI)dz` is positive relative to `‖dz‖²`; otherwise `δ` grows
//! until it is.

use nalgebra::{DMatrix, DVector, Dyn, LU};

const CURVATURE: f64 = 1e-8;
const DELTA_FIRST: f64 = 1e-4;
const DELTA_MIN: f64 = 1e-20;
const DELTA_MAX: f64 = 1e40;
const DELTA_GROWTH_FIRST: f64 = 100.0;
const DELTA_GROWTH: f64 = 8.0;
const DELTA_C: f64 = 1e-8;
const REFINEMENTS: usize = 3;

/// Hessian regularization carried between iterations.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Regularization {
    last: f64,
}

/// A factored Newton matrix, reusable for further right-hand sides.
pub(super) struct KktSystem {
    matrix: DMatrix<f64>,
    lu: LU<f64, Dyn, Dyn>,
    n: usize,
}

/// The Newton direction for primal variables and constraint multipliers.
pub(super) struct Step {
    pub dz: DVector<f64>,
    pub dlambda: DVector<f64>,
    /// `δ` used for this step.
    pub regularization: f64,
    /// `dzᵀ(W + Σ + δI)dz`
    pub curvature: f64,
}

impl KktSystem {
    /// Solves for `-(dual, primal)` as right-hand side.
    pub(super) fn solve(
        &self,
        dual: &DVector<f64>,
        primal: &DVector<f64>,
    ) -> Option<(DVector<f64>, DVector<f64>)> {
        let m = primal.len();
        let mut rhs = DVector::zeros(self.n + m);
        rhs.rows_mut(0, self.n).copy_from(&(-dual));
        rhs.rows_mut(self.n, m).copy_from(&(-primal));

        let mut solution = self.lu.solve(&rhs)?;
        if solution.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mut residual = &rhs - &self.matrix * &solution;
        for _ in 0..REFINEMENTS {
            let Some(correction) = self.lu.solve(&residual) else {
                break;
            };
            let refined = &solution + correction;
            let next = &rhs - &self.matrix * &refined;
            if next.iter().any(|v| !v.is_finite()) || next.amax() >= residual.amax() {
                break;
            }
            solution = refined;
            residual = next;
        }
        Some((
            solution.rows(0, self.n).into_owned(),
            solution.rows(self.n, m).into_owned(),
        ))
    }
}

fn assemble(
    hessian: &DMatrix<f64>,
    sigma: &DVector<f64>,
    jacobian: &DMatrix<f64>,
    delta: f64,
    delta_c: f64,
) -> DMatrix<f64> {
    let (m, n) = jacobian.shape();
    let mut matrix = DMatrix::zeros(n + m, n + m);
    matrix.view_mut((0, 0), (n, n)).copy_from(hessian);
    for i in 0..n {
        matrix[(i, i)] += sigma[i] + delta;
    }
    matrix.view_mut((n, 0), (m, n)).copy_from(jacobian);
    matrix.view_mut((0, n), (n, m)).copy_from(&jacobian.transpose());
    for i in 0..m {
        matrix[(n + i, n + i)] = -delta_c;
    }
    matrix
}

/// Factors the Newton matrix, regularizing until the step has positive curvature.
///
/// Returns `None` when no regularization up to the limit yields a usable step.
pub(super) fn factor(
    hessian: &DMatrix<f64>,
    sigma: &DVector<f64>,
    jacobian: &DMatrix<f64>,
    dual: &DVector<f64>,
    primal: &DVector<f64>,
    mu: f64,
    regularization: &mut Regularization,
) -> Option<(KktSystem, Step)> {
    let n = hessian.nrows();
    let mut delta = 0.0;
    let mut delta_c = 0.0;

    loop {
        let matrix = assemble(hessian, sigma, jacobian, delta, delta_c);
        let system = KktSystem {
            lu: matrix.clone().lu(),
            matrix,
            n,
        };
        match system.solve(dual, primal) {
            Some((dz, dlambda)) => {
                let curvature = dz.dot(&(hessian * &dz))
                    + dz.iter().zip(sigma.iter()).map(|(d, s)| s * d * d).sum::<f64>()
                    + delta * dz.norm_squared();
                if curvature >= CURVATURE * dz.norm_squared() {
                    if delta > 0.0 {
                        regularization.last = delta;
                    }
                    let step = Step {
                        dz,
                        dlambda,
                        regularization: delta,
                        curvature,
                    };
                    return Some((system, step));
                }
            }
            None if delta_c == 0.0 && jacobian.nrows() > 0 => {
                // Singular: likely dependent constraint rows.
                delta_c = DELTA_C * mu.powf(0.25);
                continue;
            }
            None => {}
        }

        delta = if delta == 0.0 {
            if regularization.last == 0.0 {
                DELTA_FIRST
            } else {
                (regularization.last / 3.0).max(DELTA_MIN)
            }
        } else if regularization.last == 0.0 {
            delta * DELTA_GROWTH_FIRST
        } else {
            delta * DELTA_GROWTH
        };
        if delta > DELTA_MAX {
            return None;
        }
    }
}
