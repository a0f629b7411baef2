//! Problem model and solve orchestration for multiphase optimal control.
//!
//! A problem is described in two levels:
//!
//! 1. [`Setup::new`] fixes the number of phases and linkages; each phase gets
//!    its [`Dimensions`] and node list through [`Setup::phase_mut`].
//! 2. [`Setup::build`] sizes every bound, scale and guess array and attaches
//!    the [`OptimalControl`] callbacks, returning a [`Problem`] whose phases
//!    accept bounds and guesses.
//!
//! [`solve`] validates the problem, flattens it through a [`Layout`], hands it
//! to a [`Transcription`] service and maps the answer back into a
//! [`Solution`]. Phase indices are 1-based everywhere in the public API except
//! [`Layout`], which works with flat 0-based indices.

mod algorithm;
mod bounds;
mod callbacks;
mod error;
mod guess;
mod layout;
mod observer;
mod phase;
mod problem;
mod scalar;
mod scaling;
mod solution;
mod solve;
mod transcription;
mod validate;

pub use algorithm::{
    Algorithm, Collocation, ConfigError, DerivativeMode, HessianMode, MeshRefinement, NlpMethod,
    ScalingMode,
};
pub use bounds::{Bounds, Limits};
pub use callbacks::{Boundary, Endpoints, Node, OptimalControl, Workspace};
pub use error::{ContractError, Field, SetupError, SolveError, ValidationError};
pub use guess::{Guess, linspace};
pub use layout::{Layout, PhaseLayout, PhaseShape, PhaseTrajectory};
pub use observer::Observer;
pub use phase::{Dimensions, Phase, PhaseSetup};
pub use problem::{Problem, Setup};
pub use scalar::Scalar;
pub use scaling::PhaseScaling;
pub use solution::{MeshIteration, PhaseSolution, Solution, SolutionError};
pub use solve::solve;
pub use transcription::{Mesh, Nlp, NlpStatus, RawSolution, Transcription};
