//! Reference transcription service for `bolza` problems.
//!
//! [`DirectCollocation`] implements [`bolza_core::Transcription`]: every phase
//! is discretized by one of the [`collocation`] schemes, the callbacks are
//! differentiated node by node with [`Dual`] numbers (or central
//! differences), and the resulting dense nonlinear program is solved by the
//! [`interior_point`] method.
//!
//! [`solve`] runs the whole pipeline with this service.
//!
//! ```no_run
//! # use bolza_core::{Algorithm, OptimalControl, Problem};
//! # fn run<M: OptimalControl>(problem: &Problem<M>) -> Result<(), bolza_core::SolveError> {
//! let solution = bolza_solvers::solve(problem, &Algorithm::default())?;
//! if !solution.error_flag() {
//!     println!("objective: {}", solution.objective());
//! }
//! # Ok(())
//! # }
//! ```

pub mod collocation;
pub mod interior_point;

mod derivative;
mod dual;
mod nlp;
mod transcription;

pub use dual::Dual;
pub use transcription::{DirectCollocation, Error};

use bolza_core::{Algorithm, OptimalControl, Problem, Solution, SolveError};

/// Solves `problem` by direct collocation.
///
/// Shorthand for [`bolza_core::solve`] with [`DirectCollocation`].
///
/// # Errors
///
/// See [`bolza_core::solve`].
pub fn solve<M: OptimalControl>(problem: &Problem<M>, algorithm: &Algorithm) -> Result<Solution, SolveError> {
    bolza_core::solve(problem, algorithm, &DirectCollocation)
}
