//! Primal-dual interior-point method for dense nonlinear programs.
//!
//! # Algorithm
//!
//! Inequality rows get slack variables and fixed variables are removed, so
//! the solver works on `minimize f(z) s.t. h(z) = 0, l ≤ z ≤ u`. The bounds
//! are handled by a logarithmic barrier whose weight `μ` decreases
//! superlinearly as each barrier problem is solved to within `10μ`.
//!
//! Each iteration solves the regularized primal-dual Newton system, takes
//! the largest fraction-to-boundary step, and backtracks until a filter of
//! past (infeasibility, barrier objective) pairs accepts the trial point,
//! trying second-order corrections against the Maratos effect. When no step
//! length passes, a feasibility restoration phase moves the iterate toward
//! `h(z) = 0` and the multipliers are re-estimated. The Lagrangian Hessian
//! comes from damped BFGS updates or central differences of the gradient,
//! per [`Hessian`].
//!
//! The solve converges when the scaled optimality error falls below the
//! tolerance, or when it stays below a hundred times the tolerance for
//! fifteen consecutive iterations.
//!
//! # When to Use
//!
//! The method suits transcribed optimal control problems of moderate size:
//! - Smooth objective and constraints with exact or accurate first derivatives
//! - A few hundred to a few thousand variables (all matrices are dense)
//! - Many equality constraints together with simple bounds
//!
//! # Observer Events
//!
//! - [`Event::Iterated`] after every accepted step, with a [`Progress`] summary
//! - [`Event::HessianReset`] when a failed line search discards the BFGS matrix
//! - [`Event::Restored`] after a feasibility restoration phase
//!
//! Observers can return [`Action::StopEarly`] to halt with the current iterate.

mod action;
mod barrier;
mod config;
mod error;
mod event;
mod hessian;
mod kkt;
mod line_search;
mod problem;
mod restoration;
mod search;
mod solution;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use config::{Config, ConfigError, Hessian};
pub use error::Error;
pub use event::{Event, Progress};
pub use problem::{Derivatives, NlpProblem, Values};
pub use solution::{Solution, Status};

use bolza_core::Observer;

use search::search;

/// Minimizes the problem's objective subject to its bounds and constraints.
///
/// The observer receives an [`Event`] after each accepted step.
///
/// # Errors
///
/// Returns an error if the bounds are inconsistent, the problem reports
/// arrays of the wrong size, the start point is not finite, or the problem
/// fails during evaluation.
pub fn minimize<P, Obs>(problem: &P, config: &Config, observer: Obs) -> Result<Solution, Error>
where
    P: NlpProblem,
    Obs: Observer<Event, Action>,
{
    search(problem, config, observer)
}

/// Minimizes the problem's objective without observer support.
///
/// This is a convenience wrapper around [`minimize`] that uses a no-op observer.
///
/// # Errors
///
/// See [`minimize`].
pub fn minimize_unobserved<P: NlpProblem>(problem: &P, config: &Config) -> Result<Solution, Error> {
    minimize(problem, config, ())
}
