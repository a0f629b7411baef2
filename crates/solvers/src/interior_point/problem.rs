use std::error::Error as StdError;

use nalgebra::{DMatrix, DVector};

/// Objective and constraint values at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Values {
    pub objective: f64,
    pub constraints: DVector<f64>,
}

/// First derivatives at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    pub gradient: DVector<f64>,
    /// `nconstraints × nvariables`
    pub jacobian: DMatrix<f64>,
}

/// A smooth nonlinear program
///
/// ```text
/// minimize f(x)  subject to  c_L ≤ c(x) ≤ c_U,  x_L ≤ x ≤ x_U
/// ```
///
/// Infinite bounds mark free sides; equal bounds mark equalities and fixed
/// variables.
pub trait NlpProblem {
    type Error: StdError + Send + Sync + 'static;

    fn nvariables(&self) -> usize;

    fn nconstraints(&self) -> usize;

    /// Returns `(x_L, x_U)`.
    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>);

    /// Returns `(c_L, c_U)`.
    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>);

    fn initial_point(&self) -> DVector<f64>;

    /// Evaluates the objective and constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the problem cannot be evaluated at `x`.
    fn evaluate(&self, x: &DVector<f64>) -> Result<Values, Self::Error>;

    /// Evaluates the objective gradient and constraint Jacobian.
    ///
    /// # Errors
    ///
    /// Returns an error if the problem cannot be differentiated at `x`.
    fn differentiate(&self, x: &DVector<f64>) -> Result<Derivatives, Self::Error>;
}
