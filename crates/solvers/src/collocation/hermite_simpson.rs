use nalgebra::{DMatrix, DVector};

use super::{Scheme, uniform};

/// Separated Hermite–Simpson on an odd number of uniform nodes.
///
/// Nodes alternate interval ends and midpoints. Interval `m` spans nodes
/// `2m ..= 2m + 2` and contributes a Simpson row (`2m`) and a Hermite
/// interpolation row (`2m + 1`).
#[allow(clippy::cast_precision_loss)]
pub(super) fn scheme(requested: usize) -> Scheme {
    let nodes = if requested % 2 == 0 { requested + 1 } else { requested };
    let intervals = (nodes - 1) / 2;
    let h = 1.0 / intervals as f64;
    let defects = 2 * intervals;

    let mut a = DMatrix::zeros(defects, nodes);
    let mut b = DMatrix::zeros(defects, nodes);
    let mut weights = DVector::zeros(nodes);
    let mut costate_map = DMatrix::zeros(nodes, defects);

    for m in 0..intervals {
        let (left, mid, right) = (2 * m, 2 * m + 1, 2 * m + 2);
        let (simpson, hermite) = (2 * m, 2 * m + 1);

        a[(simpson, left)] = -1.0;
        a[(simpson, right)] = 1.0;
        b[(simpson, left)] = h / 6.0;
        b[(simpson, mid)] = 4.0 * h / 6.0;
        b[(simpson, right)] = h / 6.0;

        a[(hermite, left)] = -0.5;
        a[(hermite, mid)] = 1.0;
        a[(hermite, right)] = -0.5;
        b[(hermite, left)] = h / 8.0;
        b[(hermite, right)] = -h / 8.0;

        weights[left] += h / 6.0;
        weights[mid] += 4.0 * h / 6.0;
        weights[right] += h / 6.0;

        costate_map[(left, simpson)] += 0.5;
        costate_map[(mid, simpson)] = 1.0;
        costate_map[(right, simpson)] += 0.5;
    }
    costate_map[(0, 0)] = 1.0;
    costate_map[(nodes - 1, defects - 2)] = 1.0;

    Scheme {
        points: uniform(nodes),
        a,
        b,
        weights,
        costate_map,
    }
}
