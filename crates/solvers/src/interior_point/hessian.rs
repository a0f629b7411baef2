use nalgebra::{DMatrix, DVector};

use super::{Error, NlpProblem, barrier::Barrier};

/// Bounds on the initial BFGS scaling `yᵀy / sᵀy`.
const SCALE_MIN: f64 = 1e-8;
const SCALE_MAX: f64 = 1e8;

/// Powell-damped BFGS approximation of the Lagrangian Hessian over the free
/// variables.
#[derive(Debug, Clone)]
pub(super) struct Bfgs {
    matrix: DMatrix<f64>,
    updates: usize,
}

impl Bfgs {
    pub(super) fn new(n: usize) -> Self {
        Self {
            matrix: DMatrix::identity(n, n),
            updates: 0,
        }
    }

    pub(super) fn reset(&mut self) {
        let n = self.matrix.nrows();
        self.matrix = DMatrix::identity(n, n);
        self.updates = 0;
    }

    pub(super) fn updates(&self) -> usize {
        self.updates
    }

    /// Embeds the approximation in a `dimension × dimension` matrix whose
    /// slack block is zero.
    pub(super) fn matrix(&self, dimension: usize) -> DMatrix<f64> {
        let n = self.matrix.nrows();
        let mut out = DMatrix::zeros(dimension, dimension);
        out.view_mut((0, 0), (n, n)).copy_from(&self.matrix);
        out
    }

    /// Updates with step `s` and Lagrangian gradient change `y`.
    ///
    /// Skips the update when it would lose positive definiteness.
    pub(super) fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        let sy = s.dot(y);
        if self.updates == 0 && sy > 0.0 {
            let n = self.matrix.nrows();
            let scale = (y.dot(y) / sy).clamp(SCALE_MIN, SCALE_MAX);
            self.matrix = DMatrix::identity(n, n) * scale;
        }

        let bs = &self.matrix * s;
        let sbs = s.dot(&bs);
        if sbs.is_nan() || sbs <= 0.0 {
            return;
        }
        let theta = if sy >= 0.2 * sbs {
            1.0
        } else {
            0.8 * sbs / (sbs - sy)
        };
        let r = y * theta + &bs * (1.0 - theta);
        let sr = s.dot(&r);
        if sr.is_nan() || sr <= 0.0 || r.iter().any(|v| !v.is_finite()) {
            return;
        }

        self.matrix -= &bs * bs.transpose() / sbs;
        self.matrix += &r * r.transpose() / sr;
        self.updates += 1;
    }
}

/// Lagrangian Hessian by central differences of `∇f + Jᵀλ` in the free
/// variables, symmetrized.
pub(super) fn finite_difference<P: NlpProblem>(
    barrier: &Barrier<'_, P>,
    z: &DVector<f64>,
    lambda: &DVector<f64>,
) -> Result<DMatrix<f64>, Error> {
    let dimension = z.len();
    let mut hessian = DMatrix::zeros(dimension, dimension);
    let mut shifted = z.clone();

    for j in 0..barrier.nfree() {
        let h = 6e-6 * z[j].abs().max(1.0);
        shifted[j] = z[j] + h;
        let up = barrier.linearize(&shifted)?.lagrangian_gradient(lambda);
        let upper = shifted[j];
        shifted[j] = z[j] - h;
        let down = barrier.linearize(&shifted)?.lagrangian_gradient(lambda);
        let step = upper - shifted[j];
        shifted[j] = z[j];
        hessian.set_column(j, &((up - down) / step));
    }

    Ok((&hessian + hessian.transpose()) * 0.5)
}
