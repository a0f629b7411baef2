use bolza_core::{
    Algorithm, HessianMode, Mesh, Nlp, NlpStatus, OptimalControl, RawSolution, Transcription,
};
use thiserror::Error;
use tracing::debug;

use crate::collocation::{self, Scheme};
use crate::interior_point::{self, Action, ConfigError, Event, Hessian, NlpProblem, Status};
use crate::nlp::CollocationNlp;

/// Errors that can occur in the direct-collocation service.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Collocation(#[from] collocation::Error),

    #[error("interior-point configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solver(#[from] interior_point::Error),
}

/// Direct collocation over the dense interior-point solver.
///
/// Each phase is discretized by the scheme named in
/// [`Algorithm::collocation`], and the whole problem is solved as one dense
/// nonlinear program. Solver progress is logged at `debug` level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectCollocation;

impl Transcription for DirectCollocation {
    type Error = Error;

    fn mesh(&self, algorithm: &Algorithm, nodes: usize) -> Result<Mesh, Error> {
        Ok(Scheme::new(algorithm.collocation, nodes)?.mesh())
    }

    fn solve<M: OptimalControl>(&self, nlp: &Nlp<'_, M>, algorithm: &Algorithm) -> Result<RawSolution, Error> {
        let problem = CollocationNlp::new(nlp, algorithm)?;
        let hessian = match algorithm.hessian {
            HessianMode::QuasiNewton => Hessian::Bfgs,
            HessianMode::Exact => Hessian::FiniteDifference,
        };
        let config = interior_point::Config::new(algorithm.nlp_iter_max, algorithm.nlp_tolerance, hessian)?;

        debug!(
            variables = problem.nvariables(),
            constraints = problem.nconstraints(),
            ?hessian,
            "interior-point solve"
        );
        let solution = interior_point::minimize(&problem, &config, log_progress)?;

        Ok(RawSolution {
            primal: problem.physical(&solution.x),
            multipliers: problem.multipliers(&solution.multipliers),
            status: match solution.status {
                Status::Converged => NlpStatus::Converged,
                Status::MaxIters | Status::StoppedByObserver => NlpStatus::MaxIterations,
                Status::Infeasible => NlpStatus::Infeasible,
                Status::NumericalFailure => NlpStatus::NumericalFailure,
            },
            iterations: solution.iters,
            objective: problem.objective(solution.objective),
        })
    }
}

/// Forwards solver events to `tracing` without steering the solve.
#[allow(clippy::unnecessary_wraps)]
fn log_progress(event: &Event) -> Option<Action> {
    match event {
        Event::Iterated(progress) => debug!(
            iteration = progress.iteration,
            objective = progress.objective,
            infeasibility = progress.infeasibility,
            dual = progress.dual_infeasibility,
            mu = progress.barrier,
            step = progress.step,
            regularization = progress.regularization,
            "interior-point iteration"
        ),
        Event::HessianReset { iteration } => debug!(iteration, "quasi-Newton Hessian reset"),
        Event::Restored {
            iteration,
            steps,
            infeasibility,
        } => debug!(iteration, steps, infeasibility, "feasibility restored"),
    }
    None
}
