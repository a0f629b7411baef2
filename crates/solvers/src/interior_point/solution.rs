use nalgebra::DVector;

/// Indicates how the interior-point solver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The optimality error fell below the tolerance.
    Converged,

    /// Reached the iteration limit without converging.
    MaxIters,

    /// No acceptable step could be found while the constraints are violated.
    Infeasible,

    /// No acceptable step could be found for a feasible iterate, or the
    /// Newton system could not be regularized.
    NumericalFailure,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of an interior-point solve.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final solver status.
    pub status: Status,

    /// Final iterate.
    pub x: DVector<f64>,

    /// Objective value at `x`.
    pub objective: f64,

    /// Constraint values at `x`.
    pub constraints: DVector<f64>,

    /// Constraint multipliers, `∇f + Jᵀλ + ν = 0` at a stationary point.
    pub multipliers: DVector<f64>,

    /// Bound multipliers `ν`: positive at an active upper bound, negative at
    /// an active lower bound.
    pub bound_multipliers: DVector<f64>,

    /// Iteration count when the solver finished.
    pub iters: usize,
}
