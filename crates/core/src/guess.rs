use nalgebra::{DMatrix, DVector};

use crate::{Dimensions, Field, SetupError};

/// Returns `n` evenly spaced values from `start` to `end`, inclusive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, n: usize) -> DVector<f64> {
    match n {
        0 => DVector::zeros(0),
        1 => DVector::from_element(1, start),
        _ => {
            let step = (end - start) / (n - 1) as f64;
            DVector::from_fn(n, |i, _| if i == n - 1 { end } else { start + step * i as f64 })
        }
    }
}

/// An initial guess for one phase.
///
/// Columns of `states` and `controls` correspond to entries of `time`. The
/// number of guess points is independent of the mesh the solver uses; the guess
/// is interpolated onto the solver mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    phase: usize,
    dims: Dimensions,
    states: DMatrix<f64>,
    controls: DMatrix<f64>,
    time: DVector<f64>,
    parameters: DVector<f64>,
}

impl Guess {
    pub(crate) fn new(phase: usize, dims: Dimensions) -> Self {
        Self {
            phase,
            dims,
            states: DMatrix::zeros(dims.states, 0),
            controls: DMatrix::zeros(dims.controls, 0),
            time: DVector::zeros(0),
            parameters: DVector::zeros(dims.parameters),
        }
    }

    /// Sets the guess trajectory.
    ///
    /// # Errors
    ///
    /// Returns an error if the row counts do not match the phase dimensions or
    /// the column counts do not match the number of time points.
    pub fn set_trajectory(
        &mut self,
        states: DMatrix<f64>,
        controls: DMatrix<f64>,
        time: DVector<f64>,
    ) -> Result<&mut Self, SetupError> {
        let points = time.len();
        for (field, matrix, rows) in [
            (Field::States, &states, self.dims.states),
            (Field::Controls, &controls, self.dims.controls),
        ] {
            if matrix.nrows() != rows {
                return Err(SetupError::Length {
                    phase: self.phase,
                    field,
                    expected: rows,
                    actual: matrix.nrows(),
                });
            }
            if matrix.ncols() != points {
                return Err(SetupError::GuessColumns {
                    phase: self.phase,
                    field,
                    expected: points,
                    actual: matrix.ncols(),
                });
            }
        }
        self.states = states;
        self.controls = controls;
        self.time = time;
        Ok(self)
    }

    /// Sets the static parameter guess.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Length`] if the slice does not hold one value per
    /// parameter.
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<&mut Self, SetupError> {
        if parameters.len() != self.dims.parameters {
            return Err(SetupError::Length {
                phase: self.phase,
                field: Field::Parameters,
                expected: self.dims.parameters,
                actual: parameters.len(),
            });
        }
        self.parameters = DVector::from_column_slice(parameters);
        Ok(self)
    }

    #[must_use]
    pub fn states(&self) -> &DMatrix<f64> {
        &self.states
    }

    #[must_use]
    pub fn controls(&self) -> &DMatrix<f64> {
        &self.controls
    }

    #[must_use]
    pub fn time(&self) -> &DVector<f64> {
        &self.time
    }

    #[must_use]
    pub fn parameters(&self) -> &DVector<f64> {
        &self.parameters
    }

    /// Returns true if no trajectory guess was provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Linearly interpolates the columns of `values` (sampled at `at`) onto `to`.
///
/// `at` must be non-decreasing. Points outside the sampled range take the
/// nearest end value; repeated sample times resolve to the later column.
pub(crate) fn interpolate_columns(values: &DMatrix<f64>, at: &[f64], to: &[f64]) -> DMatrix<f64> {
    let rows = values.nrows();
    let mut out = DMatrix::zeros(rows, to.len());
    if at.is_empty() {
        return out;
    }
    let last = at.len() - 1;

    for (col, &t) in to.iter().enumerate() {
        let (left, weight) = if t <= at[0] {
            (0, 0.0)
        } else if t >= at[last] {
            (last, 0.0)
        } else {
            // First index whose time exceeds t; at least 1 since t > at[0].
            let right = at.partition_point(|&s| s <= t);
            let left = right - 1;
            let span = at[right] - at[left];
            let w = if span > 0.0 { (t - at[left]) / span } else { 0.0 };
            (left, w)
        };

        for row in 0..rows {
            let a = values[(row, left)];
            let value = if weight > 0.0 {
                a + weight * (values[(row, left + 1)] - a)
            } else {
                a
            };
            out[(row, col)] = value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn dims() -> Dimensions {
        Dimensions {
            states: 2,
            controls: 1,
            parameters: 1,
            events: 0,
            path: 0,
        }
    }

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(0.0, 2.0, 5);
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[0], 0.0);
        assert_relative_eq!(v[1], 0.5);
        assert_relative_eq!(v[4], 2.0);
        assert_eq!(linspace(1.0, 3.0, 1).len(), 1);
        assert!(linspace(1.0, 3.0, 0).is_empty());
    }

    #[test]
    fn rejects_mismatched_columns() {
        let mut guess = Guess::new(1, dims());
        let err = guess
            .set_trajectory(
                DMatrix::zeros(2, 4),
                DMatrix::zeros(1, 3),
                linspace(0.0, 1.0, 4),
            )
            .expect_err("controls have 3 columns");
        assert!(matches!(
            err,
            SetupError::GuessColumns {
                field: Field::Controls,
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_mismatched_rows() {
        let mut guess = Guess::new(1, dims());
        let err = guess
            .set_trajectory(
                DMatrix::zeros(3, 4),
                DMatrix::zeros(1, 4),
                linspace(0.0, 1.0, 4),
            )
            .expect_err("three state rows");
        assert!(matches!(
            err,
            SetupError::Length {
                field: Field::States,
                ..
            }
        ));
    }

    #[test]
    fn interpolates_and_clamps() {
        let values = DMatrix::from_row_slice(1, 3, &[0.0, 10.0, 30.0]);
        let at = [0.0, 1.0, 2.0];
        let out = interpolate_columns(&values, &at, &[-1.0, 0.5, 1.0, 1.5, 3.0]);
        assert_relative_eq!(out[(0, 0)], 0.0);
        assert_relative_eq!(out[(0, 1)], 5.0);
        assert_relative_eq!(out[(0, 2)], 10.0);
        assert_relative_eq!(out[(0, 3)], 20.0);
        assert_relative_eq!(out[(0, 4)], 30.0);
    }
}
