use nalgebra::DVector;

use crate::{Dimensions, Field, SetupError};

/// One side (lower or upper) of a phase's bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub states: DVector<f64>,
    pub controls: DVector<f64>,
    pub parameters: DVector<f64>,
    pub events: DVector<f64>,
    pub path: DVector<f64>,
    pub start_time: f64,
    pub end_time: f64,
}

impl Limits {
    /// Creates zero-filled limits sized to `dims`.
    #[must_use]
    pub fn zeros(dims: &Dimensions) -> Self {
        Self {
            states: DVector::zeros(dims.states),
            controls: DVector::zeros(dims.controls),
            parameters: DVector::zeros(dims.parameters),
            events: DVector::zeros(dims.events),
            path: DVector::zeros(dims.path),
            start_time: 0.0,
            end_time: 0.0,
        }
    }

    /// Returns the vector for a per-component field, or `None` for the times.
    #[must_use]
    pub fn vector(&self, field: Field) -> Option<&DVector<f64>> {
        match field {
            Field::States => Some(&self.states),
            Field::Controls => Some(&self.controls),
            Field::Parameters => Some(&self.parameters),
            Field::Events => Some(&self.events),
            Field::Path => Some(&self.path),
            _ => None,
        }
    }
}

/// Lower and upper bounds for every quantity of a phase.
///
/// Equal lower and upper values encode an equality: an event component with
/// `lower == upper == c` is imposed as `e(…) = c`, and equal start time bounds
/// fix the phase start time.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    phase: usize,
    dims: Dimensions,
    lower: Limits,
    upper: Limits,
}

impl Bounds {
    pub(crate) fn new(phase: usize, dims: Dimensions) -> Self {
        Self {
            phase,
            dims,
            lower: Limits::zeros(&dims),
            upper: Limits::zeros(&dims),
        }
    }

    #[must_use]
    pub fn lower(&self) -> &Limits {
        &self.lower
    }

    #[must_use]
    pub fn upper(&self) -> &Limits {
        &self.upper
    }

    /// Sets the state bounds, applied at every node.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] if either slice does not hold one value
    /// per state.
    pub fn set_states(&mut self, lower: &[f64], upper: &[f64]) -> Result<&mut Self, SetupError> {
        let (l, u) = self.checked(Field::States, self.dims.states, lower, upper)?;
        self.lower.states = l;
        self.upper.states = u;
        Ok(self)
    }

    /// Sets the control bounds, applied at every node.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] on a length mismatch.
    pub fn set_controls(
        &mut self,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<&mut Self, SetupError> {
        let (l, u) = self.checked(Field::Controls, self.dims.controls, lower, upper)?;
        self.lower.controls = l;
        self.upper.controls = u;
        Ok(self)
    }

    /// Sets the static parameter bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] on a length mismatch.
    pub fn set_parameters(
        &mut self,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<&mut Self, SetupError> {
        let (l, u) = self.checked(Field::Parameters, self.dims.parameters, lower, upper)?;
        self.lower.parameters = l;
        self.upper.parameters = u;
        Ok(self)
    }

    /// Sets the event bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] on a length mismatch.
    pub fn set_events(&mut self, lower: &[f64], upper: &[f64]) -> Result<&mut Self, SetupError> {
        let (l, u) = self.checked(Field::Events, self.dims.events, lower, upper)?;
        self.lower.events = l;
        self.upper.events = u;
        Ok(self)
    }

    /// Sets the path constraint bounds, applied at every node.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] on a length mismatch.
    pub fn set_path(&mut self, lower: &[f64], upper: &[f64]) -> Result<&mut Self, SetupError> {
        let (l, u) = self.checked(Field::Path, self.dims.path, lower, upper)?;
        self.lower.path = l;
        self.upper.path = u;
        Ok(self)
    }

    pub fn set_start_time(&mut self, lower: f64, upper: f64) -> &mut Self {
        self.lower.start_time = lower;
        self.upper.start_time = upper;
        self
    }

    pub fn set_end_time(&mut self, lower: f64, upper: f64) -> &mut Self {
        self.lower.end_time = lower;
        self.upper.end_time = upper;
        self
    }

    fn checked(
        &self,
        field: Field,
        expected: usize,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<(DVector<f64>, DVector<f64>), SetupError> {
        for actual in [lower.len(), upper.len()] {
            if actual != expected {
                return Err(SetupError::Length {
                    phase: self.phase,
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok((
            DVector::from_column_slice(lower),
            DVector::from_column_slice(upper),
        ))
    }
}
