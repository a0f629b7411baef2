use nalgebra::DVector;

use crate::Dimensions;

/// Manual scale factors for one phase.
///
/// The solver works with `scaled = factor * physical` for variables and scales
/// constraint rows by their factor. Factors are only read when
/// [`ScalingMode::Manual`](crate::ScalingMode::Manual) is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseScaling {
    pub states: DVector<f64>,
    pub controls: DVector<f64>,
    pub parameters: DVector<f64>,
    pub events: DVector<f64>,
    pub path: DVector<f64>,
    /// One factor per state: defect rows of state `i` use `defects[i]`.
    pub defects: DVector<f64>,
    pub time: f64,
}

impl PhaseScaling {
    /// Creates unit scale factors sized to `dims`.
    #[must_use]
    pub fn ones(dims: &Dimensions) -> Self {
        Self {
            states: DVector::from_element(dims.states, 1.0),
            controls: DVector::from_element(dims.controls, 1.0),
            parameters: DVector::from_element(dims.parameters, 1.0),
            events: DVector::from_element(dims.events, 1.0),
            path: DVector::from_element(dims.path, 1.0),
            defects: DVector::from_element(dims.states, 1.0),
            time: 1.0,
        }
    }
}

/// Scale factor derived from bound magnitudes.
///
/// Maps the larger finite bound magnitude to one; components without a finite,
/// nonzero bound keep a unit factor.
pub(crate) fn from_bounds(lower: f64, upper: f64) -> f64 {
    let magnitude = [lower, upper]
        .into_iter()
        .filter(|v| v.is_finite())
        .map(f64::abs)
        .fold(0.0, f64::max);
    if magnitude > 0.0 { 1.0 / magnitude } else { 1.0 }
}
