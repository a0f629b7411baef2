/// Summary of one accepted barrier iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: usize,
    pub objective: f64,
    /// Largest constraint violation.
    pub infeasibility: f64,
    /// Largest scaled stationarity residual.
    pub dual_infeasibility: f64,
    /// Barrier parameter used for the step.
    pub barrier: f64,
    /// Accepted primal step length.
    pub step: f64,
    /// Hessian regularization added to obtain the step.
    pub regularization: f64,
}

/// Events emitted by the interior-point solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A step was accepted.
    Iterated(Progress),

    /// The quasi-Newton Hessian was discarded after a failed line search.
    HessianReset { iteration: usize },

    /// Feasibility restoration replaced a failed line search.
    Restored {
        iteration: usize,
        /// Restoration steps taken.
        steps: usize,
        /// Largest constraint violation afterwards.
        infeasibility: f64,
    },
}
