/// Errors that can occur during an interior-point solve.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("variable {index}: lower bound {lower} exceeds upper bound {upper}")]
    VariableBounds { index: usize, lower: f64, upper: f64 },

    #[error("constraint {index}: lower bound {lower} exceeds upper bound {upper}")]
    ConstraintBounds { index: usize, lower: f64, upper: f64 },

    #[error("problem reported {actual} {what}, expected {expected}")]
    Dimension {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("the initial point gives a non-finite {what}")]
    NonFiniteStart { what: &'static str },

    #[error("problem error: {0}")]
    Problem(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(super) fn problem(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Problem(Box::new(err))
    }
}
