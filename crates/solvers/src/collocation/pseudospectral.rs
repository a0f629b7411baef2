use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use super::Scheme;

const NEWTON_ITERS: usize = 100;

/// Legendre–Gauss–Lobatto pseudospectral scheme.
pub(super) fn legendre(nodes: usize) -> Scheme {
    let (tau, weights) = lgl(nodes);
    global(&tau, &weights)
}

/// Chebyshev–Gauss–Lobatto pseudospectral scheme with Clenshaw–Curtis weights.
pub(super) fn chebyshev(nodes: usize) -> Scheme {
    let (tau, weights) = cgl(nodes);
    global(&tau, &weights)
}

/// Builds a global scheme from nodes and weights on `[-1, 1]`.
///
/// Every node carries one defect row `D·x - T·f`, so `B` is the identity and
/// the costates are the defect multipliers divided by the weights.
fn global(tau: &DVector<f64>, weights: &DVector<f64>) -> Scheme {
    let n = tau.len();
    let weights = weights / 2.0;
    Scheme {
        points: tau.map(|t| 0.5 * (t + 1.0)),
        // d/dσ = 2 d/dτ
        a: differentiation(tau) * 2.0,
        b: DMatrix::identity(n, n),
        costate_map: DMatrix::from_diagonal(&weights.map(|w| 1.0 / w)),
        weights,
    }
}

/// Lobatto nodes (ascending) and weights on `[-1, 1]`.
///
/// Newton iteration on `(1 - x²) P'_n(x)` started from the Chebyshev nodes,
/// with the Legendre polynomials evaluated by their three-term recurrence.
#[allow(clippy::cast_precision_loss)]
fn lgl(nodes: usize) -> (DVector<f64>, DVector<f64>) {
    let degree = nodes - 1;
    let (n, count) = (degree as f64, nodes as f64);

    let mut x: Vec<f64> = (0..nodes).map(|k| (PI * k as f64 / n).cos()).collect();
    let mut p = DMatrix::zeros(nodes, nodes);

    for _ in 0..NEWTON_ITERS {
        for (i, &xi) in x.iter().enumerate() {
            p[(i, 0)] = 1.0;
            p[(i, 1)] = xi;
            for k in 2..=degree {
                let kf = k as f64;
                p[(i, k)] = ((2.0 * kf - 1.0) * xi * p[(i, k - 1)] - (kf - 1.0) * p[(i, k - 2)]) / kf;
            }
        }
        let mut change: f64 = 0.0;
        for (i, xi) in x.iter_mut().enumerate() {
            let step = (*xi * p[(i, degree)] - p[(i, degree - 1)]) / (count * p[(i, degree)]);
            *xi -= step;
            change = change.max(step.abs());
        }
        if change <= f64::EPSILON {
            break;
        }
    }

    let weights: Vec<f64> = (0..nodes)
        .map(|i| 2.0 / (n * count * p[(i, degree)] * p[(i, degree)]))
        .collect();

    // The Chebyshev start runs from +1 down to -1.
    (
        DVector::from_iterator(nodes, x.into_iter().rev()),
        DVector::from_iterator(nodes, weights.into_iter().rev()),
    )
}

/// Chebyshev–Lobatto nodes (ascending) and Clenshaw–Curtis weights on `[-1, 1]`.
#[allow(clippy::cast_precision_loss)]
fn cgl(nodes: usize) -> (DVector<f64>, DVector<f64>) {
    let degree = nodes - 1;
    let n = degree as f64;
    let theta: Vec<f64> = (0..nodes).map(|k| PI * k as f64 / n).collect();

    let mut weights = DVector::zeros(nodes);
    let end = if degree % 2 == 0 { 1.0 / (n * n - 1.0) } else { 1.0 / (n * n) };
    weights[0] = end;
    weights[degree] = end;
    for i in 1..degree {
        let mut v = 1.0;
        for k in 1..=(degree - 1) / 2 {
            let kf = k as f64;
            v -= 2.0 * (2.0 * kf * theta[i]).cos() / (4.0 * kf * kf - 1.0);
        }
        if degree % 2 == 0 {
            v -= (n * theta[i]).cos() / (n * n - 1.0);
        }
        weights[i] = 2.0 * v / n;
    }

    // Weights are symmetric, so only the nodes need reordering.
    let tau = DVector::from_fn(nodes, |k, _| -theta[k].cos());
    (tau, weights)
}

/// Differentiation matrix of the Lagrange basis on `tau`, via barycentric weights.
fn differentiation(tau: &DVector<f64>) -> DMatrix<f64> {
    let n = tau.len();
    let bary: Vec<f64> = (0..n)
        .map(|j| {
            let product: f64 = (0..n).filter(|&k| k != j).map(|k| tau[j] - tau[k]).product();
            1.0 / product
        })
        .collect();

    let mut d = DMatrix::zeros(n, n);
    for i in 0..n {
        let mut diagonal = 0.0;
        for j in (0..n).filter(|&j| j != i) {
            d[(i, j)] = bary[j] / bary[i] / (tau[i] - tau[j]);
            diagonal -= d[(i, j)];
        }
        d[(i, i)] = diagonal;
    }
    d
}
