//! Values and Jacobians of small dense functions written against [`Scalar`].

use bolza_core::{DerivativeMode, Scalar};
use nalgebra::DMatrix;

use crate::Dual;

/// A function from a short input vector to a short output vector.
///
/// Implemented by the per-node, per-boundary and linkage pieces of a
/// transcribed problem, so one generic evaluation serves values and
/// derivatives alike.
pub(crate) trait LocalFunction {
    fn inputs(&self) -> usize;
    fn outputs(&self) -> usize;
    fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]);
}

/// Output values plus, when requested, the `outputs × inputs` Jacobian.
pub(crate) struct Local {
    pub values: Vec<f64>,
    pub jacobian: Option<DMatrix<f64>>,
}

pub(crate) fn values<F: LocalFunction>(f: &F, at: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; f.outputs()];
    f.eval(at, &mut out);
    out
}

/// Evaluates `f` at `at`, differentiating it when `mode` is given.
pub(crate) fn evaluate<F: LocalFunction>(f: &F, at: &[f64], mode: Option<DerivativeMode>) -> Local {
    let values = values(f, at);
    let jacobian = mode.map(|mode| match mode {
        DerivativeMode::Automatic => forward(f, at),
        DerivativeMode::Numerical => central(f, at),
    });
    Local { values, jacobian }
}

/// Jacobian by seeding one input direction per pass.
fn forward<F: LocalFunction>(f: &F, at: &[f64]) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(f.outputs(), f.inputs());
    let mut input: Vec<Dual> = at.iter().map(|&v| Dual::new(v, 0.0)).collect();
    let mut output = vec![Dual::default(); f.outputs()];

    for j in 0..at.len() {
        input[j].eps = 1.0;
        f.eval(&input, &mut output);
        input[j].eps = 0.0;
        for (i, out) in output.iter().enumerate() {
            jacobian[(i, j)] = out.eps;
        }
    }
    jacobian
}

/// Jacobian by central differences with a step scaled to each input.
fn central<F: LocalFunction>(f: &F, at: &[f64]) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(f.outputs(), f.inputs());
    let mut shifted = at.to_vec();
    let mut plus = vec![0.0; f.outputs()];
    let mut minus = vec![0.0; f.outputs()];

    for j in 0..at.len() {
        let h = 6e-6 * at[j].abs().max(1.0);
        shifted[j] = at[j] + h;
        f.eval(&shifted, &mut plus);
        let upper = shifted[j];
        shifted[j] = at[j] - h;
        f.eval(&shifted, &mut minus);
        let step = upper - shifted[j];
        shifted[j] = at[j];
        for i in 0..plus.len() {
            jacobian[(i, j)] = (plus[i] - minus[i]) / step;
        }
    }
    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use approx::assert_relative_eq;

    /// `(x·y, sin(x) + y²)`
    struct Pair;

    impl LocalFunction for Pair {
        fn inputs(&self) -> usize {
            2
        }

        fn outputs(&self) -> usize {
            2
        }

        fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]) {
            output[0] = input[0] * input[1];
            output[1] = input[0].sin() + input[1] * input[1];
        }
    }

    fn analytic(x: f64, y: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[y, x, x.cos(), 2.0 * y])
    }

    #[test]
    fn values_only_when_no_mode() {
        let local = evaluate(&Pair, &[2.0, 3.0], None);
        assert_eq!(local.values, vec![6.0, 2.0_f64.sin() + 9.0]);
        assert!(local.jacobian.is_none());
    }

    #[test]
    fn forward_mode_is_exact() {
        let local = evaluate(&Pair, &[0.4, -1.5], Some(DerivativeMode::Automatic));
        let jacobian = local.jacobian.expect("requested");
        assert_relative_eq!(jacobian, analytic(0.4, -1.5), epsilon = 1e-15);
    }

    #[test]
    fn central_differences_are_close() {
        let local = evaluate(&Pair, &[0.4, -1.5], Some(DerivativeMode::Numerical));
        let jacobian = local.jacobian.expect("requested");
        assert_relative_eq!(jacobian, analytic(0.4, -1.5), epsilon = 1e-9);
    }

    /// `Pair` that remembers every `y` it was evaluated at.
    #[derive(Default)]
    struct Recording(RefCell<Vec<f64>>);

    impl LocalFunction for Recording {
        fn inputs(&self) -> usize {
            2
        }

        fn outputs(&self) -> usize {
            2
        }

        fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]) {
            self.0.borrow_mut().push(input[1].value());
            Pair.eval(input, output);
        }
    }

    #[test]
    fn central_step_grows_with_the_input() {
        let recording = Recording::default();
        let local = evaluate(&recording, &[0.4, -150.0], Some(DerivativeMode::Numerical));
        let jacobian = local.jacobian.expect("requested");

        let widest = recording
            .0
            .borrow()
            .iter()
            .fold(0.0_f64, |acc, y| acc.max((y + 150.0).abs()));
        assert_relative_eq!(widest, 6e-6 * 150.0, max_relative = 1e-6);

        // Rounding in the large second output limits the attainable accuracy.
        let expected = analytic(0.4, -150.0);
        for i in 0..2 {
            let scale = local.values[i].abs().max(1.0);
            for j in 0..2 {
                assert!(
                    (jacobian[(i, j)] - expected[(i, j)]).abs() <= 1e-9 * scale,
                    "entry ({i}, {j})"
                );
            }
        }
    }
}
