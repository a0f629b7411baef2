use thiserror::Error;

/// Source of the Lagrangian Hessian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hessian {
    /// Damped BFGS updates from gradient differences.
    #[default]
    Bfgs,
    /// Central differences of the Lagrangian gradient.
    FiniteDifference,
}

/// Configuration for the interior-point solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    tolerance: f64,
    hessian: Hessian,
}

/// Errors that can occur when validating an interior-point solver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_iters must be positive")]
    MaxIters,

    #[error("tolerance must be finite and positive")]
    Tolerance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 3000,
            tolerance: 1e-8,
            hessian: Hessian::Bfgs,
        }
    }
}

impl Config {
    /// Creates a new config with a validated iteration limit and tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero or `tolerance` is not a
    /// positive finite number.
    pub fn new(max_iters: usize, tolerance: f64, hessian: Hessian) -> Result<Self, ConfigError> {
        if max_iters == 0 {
            return Err(ConfigError::MaxIters);
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ConfigError::Tolerance);
        }
        Ok(Self {
            max_iters,
            tolerance,
            hessian,
        })
    }

    /// Returns the maximum number of barrier iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the tolerance on the scaled optimality error.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn hessian(&self) -> Hessian {
        self.hessian
    }
}
