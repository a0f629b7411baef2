use bolza_core::Observer;
use nalgebra::{DMatrix, DVector};

use super::{
    Action, Config, Error, Event, Hessian, NlpProblem, Progress, Solution, Status,
    barrier::{Barrier, Evaluation, Linearization},
    hessian::{Bfgs, finite_difference},
    kkt::{self, KktSystem, Regularization, Step},
    line_search::{
        Criteria, Filter, Verdict, barrier_gradient, barrier_objective, gaps, max_step, norm_inf,
    },
    restoration::{self, Restored},
};

const MU_INIT: f64 = 0.1;
const KAPPA_EPSILON: f64 = 10.0;
const KAPPA_MU: f64 = 0.2;
const THETA_MU: f64 = 1.5;
const TAU_MIN: f64 = 0.99;
const S_MAX: f64 = 100.0;
const KAPPA_SIGMA: f64 = 1e10;
const LEAST_SQUARES_MAX: f64 = 1e3;
const TINY_STEP: f64 = 10.0 * f64::EPSILON;
/// Filter bounds on `θ`, relative to the starting infeasibility.
const THETA_MAX_FACTOR: f64 = 1e4;
const THETA_MIN_FACTOR: f64 = 1e-4;
const SOC_MAX: usize = 4;
const KAPPA_SOC: f64 = 0.99;
/// Bound multipliers above this are reset to one after restoration.
const NU_RESET: f64 = 1e3;
const ACCEPTABLE_FACTOR: f64 = 100.0;
const ACCEPTABLE_ITERS: usize = 15;

/// Primal-dual iterate.
struct Iterate {
    z: DVector<f64>,
    lambda: DVector<f64>,
    nu_lower: DVector<f64>,
    nu_upper: DVector<f64>,
    evaluation: Evaluation,
    linearization: Linearization,
}

impl Iterate {
    /// `∇f + Jᵀλ - ν_L + ν_U`
    fn dual_residual(&self) -> DVector<f64> {
        self.linearization.lagrangian_gradient(&self.lambda) - &self.nu_lower + &self.nu_upper
    }

    fn infeasibility(&self) -> f64 {
        norm_inf(&self.evaluation.residual)
    }

    /// Scaled optimality error of the barrier problem for `mu`.
    fn optimality_error(&self, lower: &DVector<f64>, upper: &DVector<f64>, mu: f64) -> f64 {
        let (below, above) = gaps(&self.z, lower, upper);
        let mut complementarity: f64 = 0.0;
        let mut bounded = 0_usize;
        for i in 0..self.z.len() {
            if below[i].is_finite() {
                complementarity = complementarity.max((below[i] * self.nu_lower[i] - mu).abs());
                bounded += 1;
            }
            if above[i].is_finite() {
                complementarity = complementarity.max((above[i] * self.nu_upper[i] - mu).abs());
                bounded += 1;
            }
        }

        let nu_sum = self.nu_lower.lp_norm(1) + self.nu_upper.lp_norm(1);
        #[allow(clippy::cast_precision_loss)]
        let (scale_dual, scale_complementarity) = {
            let count = self.lambda.len() + bounded;
            let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };
            (
                S_MAX.max(mean(self.lambda.lp_norm(1) + nu_sum, count)) / S_MAX,
                S_MAX.max(mean(nu_sum, bounded)) / S_MAX,
            )
        };

        let dual = norm_inf(&self.dual_residual()) / scale_dual;
        let errors = [dual, self.infeasibility(), complementarity / scale_complementarity];
        errors.into_iter().fold(0.0, |acc: f64, e| {
            if acc.is_nan() || e.is_nan() { f64::NAN } else { acc.max(e) }
        })
    }
}

/// Least-squares estimate of `λ` from `∇f - ν_L + ν_U + Jᵀλ ≈ 0`, or zero if
/// the estimate is unreasonably large.
fn initial_multipliers(
    linearization: &Linearization,
    nu_lower: &DVector<f64>,
    nu_upper: &DVector<f64>,
) -> DVector<f64> {
    let jacobian = &linearization.jacobian;
    let m = jacobian.nrows();
    if m == 0 {
        return DVector::zeros(0);
    }
    let normal = jacobian * jacobian.transpose() + DMatrix::identity(m, m) * 1e-8;
    let rhs = -(jacobian * (&linearization.gradient - nu_lower + nu_upper));
    match normal.cholesky().map(|c| c.solve(&rhs)) {
        Some(lambda) if norm_inf(&lambda) <= LEAST_SQUARES_MAX => lambda,
        _ => DVector::zeros(m),
    }
}

/// Bound multipliers start at one on every finite bound.
fn unit_multipliers(bounds: &DVector<f64>) -> DVector<f64> {
    bounds.map(|b| if b.is_finite() { 1.0 } else { 0.0 })
}

/// Keeps each multiplier within a factor of its barrier estimate `μ / gap`.
fn safeguard(nu: &mut DVector<f64>, gaps: &DVector<f64>, mu: f64) {
    for (n, &g) in nu.iter_mut().zip(gaps.iter()) {
        if g.is_finite() {
            *n = n.clamp(mu / (KAPPA_SIGMA * g), KAPPA_SIGMA * mu / g);
        }
    }
}

/// An accepted trial point.
struct Accepted {
    z: DVector<f64>,
    evaluation: Evaluation,
    dz: DVector<f64>,
    dlambda: DVector<f64>,
    alpha: f64,
    verdict: Verdict,
    tiny: bool,
}

/// Infeasibility `θ` and barrier objective `φ` at a point.
fn measure(
    z: &DVector<f64>,
    evaluation: &Evaluation,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
    mu: f64,
) -> (f64, f64) {
    let (below, above) = gaps(z, lower, upper);
    (
        evaluation.residual.lp_norm(1),
        barrier_objective(evaluation.values.objective, &below, &above, mu),
    )
}

/// Backtracks from the largest fraction-to-boundary step until the filter
/// accepts a trial point.
///
/// If the first trial raises the infeasibility, up to [`SOC_MAX`]
/// second-order corrections are tried before backtracking further. Returns
/// `None` once the step length drops below the smallest one that could pass.
#[allow(clippy::too_many_arguments)]
fn line_search<P: NlpProblem>(
    barrier: &Barrier<'_, P>,
    iterate: &Iterate,
    system: &KktSystem,
    step: &Step,
    barrier_residual: &DVector<f64>,
    criteria: &Criteria,
    filter: &Filter,
    mu: f64,
    tau: f64,
) -> Result<Option<Accepted>, Error> {
    let (lower, upper) = (barrier.lower(), barrier.upper());
    let (below, above) = gaps(&iterate.z, lower, upper);
    let fraction = |dz: &DVector<f64>| max_step(&below, dz, tau).min(max_step(&above, &(-dz), tau));
    let alpha_max = fraction(&step.dz);

    let tiny = step
        .dz
        .iter()
        .zip(iterate.z.iter())
        .all(|(d, z)| d.abs() <= TINY_STEP * (1.0 + z.abs()));
    if tiny {
        let z = &iterate.z + &step.dz * alpha_max;
        let evaluation = barrier.evaluate(&z)?;
        return Ok(Some(Accepted {
            z,
            evaluation,
            dz: step.dz.clone(),
            dlambda: step.dlambda.clone(),
            alpha: alpha_max,
            verdict: Verdict::Armijo,
            tiny: true,
        }));
    }

    let alpha_min = criteria.alpha_min();
    let mut alpha = alpha_max;
    let mut first = true;
    while alpha >= alpha_min {
        let z = &iterate.z + &step.dz * alpha;
        let evaluation = barrier.evaluate(&z)?;
        let (theta, phi) = measure(&z, &evaluation, lower, upper, mu);
        let verdict = criteria.judge(alpha, theta, phi, filter);
        if verdict != Verdict::Reject {
            return Ok(Some(Accepted {
                z,
                evaluation,
                dz: step.dz.clone(),
                dlambda: step.dlambda.clone(),
                alpha,
                verdict,
                tiny: false,
            }));
        }

        if first && theta >= criteria.theta {
            let mut corrected = &iterate.evaluation.residual * alpha + &evaluation.residual;
            let mut theta_previous = theta;
            for _ in 0..SOC_MAX {
                let Some((dz, dlambda)) = system.solve(barrier_residual, &corrected) else {
                    break;
                };
                let alpha_soc = fraction(&dz);
                let z = &iterate.z + &dz * alpha_soc;
                let evaluation = barrier.evaluate(&z)?;
                let (theta, phi) = measure(&z, &evaluation, lower, upper, mu);
                let verdict = criteria.judge(alpha, theta, phi, filter);
                if verdict != Verdict::Reject {
                    return Ok(Some(Accepted {
                        z,
                        evaluation,
                        dz,
                        dlambda,
                        alpha: alpha_soc,
                        verdict,
                        tiny: false,
                    }));
                }
                if theta.is_nan() || theta > KAPPA_SOC * theta_previous {
                    break;
                }
                theta_previous = theta;
                corrected = corrected * alpha_soc + &evaluation.residual;
            }
        }
        first = false;
        alpha *= 0.5;
    }
    Ok(None)
}

/// Continues from a restored point with fresh constraint multipliers.
///
/// Bound multipliers are kept unless any grew large, in which case all
/// restart at one.
fn resume<P: NlpProblem>(
    barrier: &Barrier<'_, P>,
    iterate: &Iterate,
    restored: Restored,
    mu: f64,
) -> Result<Iterate, Error> {
    let linearization = barrier.linearize(&restored.z)?;
    let (lower, upper) = (barrier.lower(), barrier.upper());
    let (below, above) = gaps(&restored.z, lower, upper);
    let (mut nu_lower, mut nu_upper) =
        if norm_inf(&iterate.nu_lower).max(norm_inf(&iterate.nu_upper)) > NU_RESET {
            (unit_multipliers(lower), unit_multipliers(upper))
        } else {
            (iterate.nu_lower.clone(), iterate.nu_upper.clone())
        };
    safeguard(&mut nu_lower, &below, mu);
    safeguard(&mut nu_upper, &above, mu);
    let lambda = initial_multipliers(&linearization, &nu_lower, &nu_upper);
    Ok(Iterate {
        z: restored.z,
        lambda,
        nu_lower,
        nu_upper,
        evaluation: restored.evaluation,
        linearization,
    })
}

/// Core interior-point loop.
#[allow(clippy::too_many_lines)]
pub(super) fn search<P, Obs>(problem: &P, config: &Config, mut observer: Obs) -> Result<Solution, Error>
where
    P: NlpProblem,
    Obs: Observer<Event, Action>,
{
    let barrier = Barrier::new(problem)?;
    let (lower, upper) = (barrier.lower().clone(), barrier.upper().clone());
    let dimension = barrier.dimension();
    let tolerance = config.tolerance();

    let (z, evaluation) = barrier.start()?;
    let linearization = barrier.linearize(&z)?;
    let nu_lower = unit_multipliers(&lower);
    let nu_upper = unit_multipliers(&upper);
    let lambda = initial_multipliers(&linearization, &nu_lower, &nu_upper);
    let mut iterate = Iterate {
        z,
        lambda,
        nu_lower,
        nu_upper,
        evaluation,
        linearization,
    };

    let finish = |iterate: &Iterate, status: Status, iters: usize| {
        let multipliers = barrier.multipliers(&iterate.lambda);
        let nu = &iterate.nu_upper - &iterate.nu_lower;
        Solution {
            status,
            x: barrier.full(&iterate.z),
            objective: iterate.evaluation.values.objective,
            constraints: iterate.evaluation.values.constraints.clone(),
            bound_multipliers: barrier.bound_multipliers(&nu, &iterate.linearization, &multipliers),
            multipliers,
            iters,
        }
    };
    let failed = |iterate: &Iterate| {
        if iterate.optimality_error(&lower, &upper, 0.0) <= 10.0 * tolerance {
            // Close enough that no further progress is representable.
            Status::Converged
        } else if iterate.infeasibility() > tolerance {
            Status::Infeasible
        } else {
            Status::NumericalFailure
        }
    };

    if dimension == 0 {
        let status = if iterate.infeasibility() <= tolerance {
            Status::Converged
        } else {
            Status::Infeasible
        };
        return Ok(finish(&iterate, status, 0));
    }

    let theta_start = iterate.evaluation.residual.lp_norm(1).max(1.0);
    let (theta_min, theta_max) = (THETA_MIN_FACTOR * theta_start, THETA_MAX_FACTOR * theta_start);
    let mut filter = Filter::new(theta_max);

    let mu_floor = tolerance / 10.0;
    let mut mu = MU_INIT;
    let mut tau = (1.0 - mu).max(TAU_MIN);
    let mut regularization = Regularization::default();
    let mut bfgs = matches!(config.hessian(), Hessian::Bfgs).then(|| Bfgs::new(barrier.nfree()));
    let mut reset_allowed = true;
    let mut acceptable = 0_usize;
    let mut stalled = false;

    for iter in 0..config.max_iters() {
        let error = iterate.optimality_error(&lower, &upper, 0.0);
        if error <= tolerance {
            return Ok(finish(&iterate, Status::Converged, iter));
        }
        acceptable = if error <= ACCEPTABLE_FACTOR * tolerance {
            acceptable + 1
        } else {
            0
        };
        if acceptable >= ACCEPTABLE_ITERS {
            return Ok(finish(&iterate, Status::Converged, iter));
        }

        // A negligible step means this barrier problem is solved as far as it can be.
        let mut decrease = stalled;
        while mu > mu_floor && (decrease || iterate.optimality_error(&lower, &upper, mu) <= KAPPA_EPSILON * mu) {
            mu = mu_floor.max((KAPPA_MU * mu).min(mu.powf(THETA_MU)));
            tau = (1.0 - mu).max(TAU_MIN);
            filter = Filter::new(theta_max);
            decrease = false;
        }

        let hessian = match &bfgs {
            Some(bfgs) => bfgs.matrix(dimension),
            None => finite_difference(&barrier, &iterate.z, &iterate.lambda)?,
        };
        let (below, above) = gaps(&iterate.z, &lower, &upper);
        let sigma = DVector::from_fn(dimension, |i, _| {
            iterate.nu_lower[i] / below[i] + iterate.nu_upper[i] / above[i]
        });
        let barrier_residual = barrier_gradient(
            &iterate.linearization.lagrangian_gradient(&iterate.lambda),
            &below,
            &above,
            mu,
        );

        let Some((system, step)) = kkt::factor(
            &hessian,
            &sigma,
            &iterate.linearization.jacobian,
            &barrier_residual,
            &iterate.evaluation.residual,
            mu,
            &mut regularization,
        ) else {
            return Ok(finish(&iterate, failed(&iterate), iter));
        };

        let (theta, phi) = measure(&iterate.z, &iterate.evaluation, &lower, &upper, mu);
        let criteria = Criteria {
            theta,
            phi,
            slope: barrier_gradient(&iterate.linearization.gradient, &below, &above, mu).dot(&step.dz),
            theta_min,
        };
        let Some(accepted) = line_search(
            &barrier,
            &iterate,
            &system,
            &step,
            &barrier_residual,
            &criteria,
            &filter,
            mu,
            tau,
        )?
        else {
            if let Some(bfgs) = bfgs.as_mut().filter(|b| reset_allowed && b.updates() > 0) {
                bfgs.reset();
                reset_allowed = false;
                if let Some(Action::StopEarly) = observer.observe(&Event::HessianReset { iteration: iter + 1 }) {
                    return Ok(finish(&iterate, Status::StoppedByObserver, iter + 1));
                }
                continue;
            }

            filter.augment(theta, phi);
            let Some(restored) = restoration::restore(
                &barrier,
                &iterate.z,
                &iterate.evaluation,
                &filter,
                mu,
                tau,
            )?
            else {
                return Ok(finish(&iterate, failed(&iterate), iter));
            };
            let steps = restored.iterations;
            iterate = resume(&barrier, &iterate, restored, mu)?;
            stalled = false;

            let event = Event::Restored {
                iteration: iter + 1,
                steps,
                infeasibility: iterate.infeasibility(),
            };
            if let Some(Action::StopEarly) = observer.observe(&event) {
                return Ok(finish(&iterate, Status::StoppedByObserver, iter + 1));
            }
            continue;
        };

        if accepted.verdict == Verdict::Reduction {
            filter.augment(theta, phi);
        }
        if accepted.tiny && mu <= mu_floor {
            return Ok(finish(&iterate, failed(&iterate), iter));
        }
        stalled = accepted.tiny;

        // Bound multipliers follow the accepted primal direction.
        let alpha = accepted.alpha;
        let dnu_lower = DVector::from_fn(dimension, |i, _| {
            mu / below[i] - iterate.nu_lower[i] - iterate.nu_lower[i] / below[i] * accepted.dz[i]
        });
        let dnu_upper = DVector::from_fn(dimension, |i, _| {
            mu / above[i] - iterate.nu_upper[i] + iterate.nu_upper[i] / above[i] * accepted.dz[i]
        });
        let alpha_nu = max_step(&iterate.nu_lower, &dnu_lower, tau)
            .min(max_step(&iterate.nu_upper, &dnu_upper, tau));

        let lambda = &iterate.lambda + &accepted.dlambda * alpha;
        let mut nu_lower = &iterate.nu_lower + dnu_lower * alpha_nu;
        let mut nu_upper = &iterate.nu_upper + dnu_upper * alpha_nu;
        let (below, above) = gaps(&accepted.z, &lower, &upper);
        safeguard(&mut nu_lower, &below, mu);
        safeguard(&mut nu_upper, &above, mu);

        let linearization = barrier.linearize(&accepted.z)?;
        if let Some(bfgs) = bfgs.as_mut() {
            let n = barrier.nfree();
            let s = (&accepted.z - &iterate.z).rows(0, n).into_owned();
            let y = (linearization.lagrangian_gradient(&lambda)
                - iterate.linearization.lagrangian_gradient(&lambda))
            .rows(0, n)
            .into_owned();
            bfgs.update(&s, &y);
        }

        iterate = Iterate {
            z: accepted.z,
            lambda,
            nu_lower,
            nu_upper,
            evaluation: accepted.evaluation,
            linearization,
        };
        reset_allowed = true;

        let progress = Progress {
            iteration: iter + 1,
            objective: iterate.evaluation.values.objective,
            infeasibility: iterate.infeasibility(),
            dual_infeasibility: norm_inf(&iterate.dual_residual()),
            barrier: mu,
            step: alpha,
            regularization: step.regularization,
        };
        if let Some(Action::StopEarly) = observer.observe(&Event::Iterated(progress)) {
            return Ok(finish(&iterate, Status::StoppedByObserver, iter + 1));
        }
    }

    let status = if iterate.optimality_error(&lower, &upper, 0.0) <= tolerance {
        Status::Converged
    } else {
        Status::MaxIters
    };
    Ok(finish(&iterate, status, config.max_iters()))
}
