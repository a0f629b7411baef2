use thiserror::Error;

/// NLP method used by the transcription service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[non_exhaustive]
pub enum NlpMethod {
    #[default]
    InteriorPoint,
}

/// How variables and constraints are scaled before the NLP sees them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ScalingMode {
    /// Factors derived from bound magnitudes.
    #[default]
    Automatic,
    /// Factors taken from each phase's [`PhaseScaling`](crate::PhaseScaling).
    Manual,
}

/// How derivatives of the callbacks are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum DerivativeMode {
    /// Forward-mode derivative propagation through [`Scalar`](crate::Scalar).
    #[default]
    Automatic,
    /// Central finite differences.
    Numerical,
}

/// Collocation scheme used to discretize the dynamics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Collocation {
    /// Legendre–Gauss–Lobatto pseudospectral.
    #[default]
    Legendre,
    /// Chebyshev–Gauss–Lobatto pseudospectral.
    Chebyshev,
    Trapezoidal,
    HermiteSimpson,
}

/// Hessian of the Lagrangian used by the NLP solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum HessianMode {
    /// Damped BFGS approximation.
    #[default]
    QuasiNewton,
    /// Differences of the Lagrangian gradient.
    Exact,
}

/// Mesh refinement strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MeshRefinement {
    /// Walk each phase's node list, one entry per mesh iteration.
    #[default]
    Manual,
    /// Double the node count while the estimated ODE error exceeds
    /// [`Algorithm::ode_tolerance`].
    Automatic,
}

/// Solver configuration for one solve.
///
/// Fields are public; [`Algorithm::validate`] checks them before a solve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Algorithm {
    pub nlp_method: NlpMethod,
    pub scaling: ScalingMode,
    pub derivatives: DerivativeMode,
    pub nlp_iter_max: usize,
    pub nlp_tolerance: f64,
    pub collocation: Collocation,
    pub hessian: HessianMode,
    pub mesh_refinement: MeshRefinement,
    pub ode_tolerance: f64,
    pub mesh_refinement_max_iterations: usize,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self {
            nlp_method: NlpMethod::InteriorPoint,
            scaling: ScalingMode::Automatic,
            derivatives: DerivativeMode::Automatic,
            nlp_iter_max: 1000,
            nlp_tolerance: 1e-6,
            collocation: Collocation::Legendre,
            hessian: HessianMode::QuasiNewton,
            mesh_refinement: MeshRefinement::Manual,
            ode_tolerance: 1e-3,
            mesh_refinement_max_iterations: 5,
        }
    }
}

/// Errors that can occur when validating an [`Algorithm`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("nlp_iter_max must be positive")]
    NlpIterMax,

    #[error("nlp_tolerance must be finite and positive")]
    NlpTolerance,

    #[error("ode_tolerance must be finite and positive")]
    OdeTolerance,

    #[error("mesh_refinement_max_iterations must be positive")]
    MeshIterations,
}

impl Algorithm {
    /// Validates iteration limits and tolerances.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nlp_iter_max == 0 {
            return Err(ConfigError::NlpIterMax);
        }
        if !self.nlp_tolerance.is_finite() || self.nlp_tolerance <= 0.0 {
            return Err(ConfigError::NlpTolerance);
        }
        if !self.ode_tolerance.is_finite() || self.ode_tolerance <= 0.0 {
            return Err(ConfigError::OdeTolerance);
        }
        if self.mesh_refinement_max_iterations == 0 {
            return Err(ConfigError::MeshIterations);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(Algorithm::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let bad = Algorithm {
            nlp_iter_max: 0,
            ..Algorithm::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::NlpIterMax));

        let bad = Algorithm {
            nlp_tolerance: f64::NAN,
            ..Algorithm::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::NlpTolerance));

        let bad = Algorithm {
            ode_tolerance: -1.0,
            ..Algorithm::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::OdeTolerance));

        let bad = Algorithm {
            mesh_refinement_max_iterations: 0,
            ..Algorithm::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::MeshIterations));
    }
}
