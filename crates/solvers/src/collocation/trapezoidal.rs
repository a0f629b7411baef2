use nalgebra::{DMatrix, DVector};

use super::{Scheme, uniform};

/// Trapezoidal rule on `nodes` uniform nodes, one defect per interval.
#[allow(clippy::cast_precision_loss)]
pub(super) fn scheme(nodes: usize) -> Scheme {
    let intervals = nodes - 1;
    let h = 1.0 / intervals as f64;

    let mut a = DMatrix::zeros(intervals, nodes);
    let mut b = DMatrix::zeros(intervals, nodes);
    let mut costate_map = DMatrix::zeros(nodes, intervals);
    for d in 0..intervals {
        a[(d, d)] = -1.0;
        a[(d, d + 1)] = 1.0;
        b[(d, d)] = 0.5 * h;
        b[(d, d + 1)] = 0.5 * h;
        costate_map[(d, d)] += 0.5;
        costate_map[(d + 1, d)] += 0.5;
    }
    // End nodes touch one interval only.
    costate_map[(0, 0)] = 1.0;
    costate_map[(nodes - 1, intervals - 1)] = 1.0;

    let weights = DVector::from_fn(nodes, |k, _| {
        if k == 0 || k == nodes - 1 { 0.5 * h } else { h }
    });

    Scheme {
        points: uniform(nodes),
        a,
        b,
        weights,
        costate_map,
    }
}
