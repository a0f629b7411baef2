//! Collocation schemes on the normalized phase interval `σ ∈ [0, 1]`.
//!
//! Every scheme places `N` nodes and writes the dynamics `dx/dσ = T·f` (with
//! `T = tf - t0`) as `D` defect rows per state:
//!
//! ```text
//! A · X - T · B · F = 0
//! ```
//!
//! where `X` and `F` hold one state component's values and derivatives at the
//! nodes. A scheme also carries quadrature weights for the running cost, which
//! sum to one, and the map from defect multipliers to node costates.

mod hermite_simpson;
mod pseudospectral;
mod trapezoidal;

use bolza_core::{Collocation, Mesh};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Errors that can occur when building a collocation scheme.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("{scheme:?} collocation needs at least 2 nodes, got {nodes}")]
    TooFewNodes { scheme: Collocation, nodes: usize },
}

/// A collocation scheme instantiated for one node count.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    points: DVector<f64>,
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    weights: DVector<f64>,
    costate_map: DMatrix<f64>,
}

impl Scheme {
    /// Builds `scheme` with (at least) `nodes` nodes.
    ///
    /// Hermite–Simpson needs an odd node count and rounds an even request up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooFewNodes`] if `nodes < 2`.
    pub fn new(scheme: Collocation, nodes: usize) -> Result<Self, Error> {
        if nodes < 2 {
            return Err(Error::TooFewNodes { scheme, nodes });
        }
        Ok(match scheme {
            Collocation::Trapezoidal => trapezoidal::scheme(nodes),
            Collocation::HermiteSimpson => hermite_simpson::scheme(nodes),
            Collocation::Legendre => pseudospectral::legendre(nodes),
            Collocation::Chebyshev => pseudospectral::chebyshev(nodes),
        })
    }

    /// Node positions in `[0, 1]`, ascending.
    #[must_use]
    pub fn points(&self) -> &DVector<f64> {
        &self.points
    }

    #[must_use]
    pub fn nodes(&self) -> usize {
        self.points.len()
    }

    /// Number of defect rows per state.
    #[must_use]
    pub fn defects(&self) -> usize {
        self.a.nrows()
    }

    /// State coefficients of the defect rows, `D × N`.
    #[must_use]
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Derivative coefficients of the defect rows, `D × N`.
    #[must_use]
    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    /// Quadrature weights on `[0, 1]`.
    #[must_use]
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Maps defect multipliers to costates, `N × D`.
    #[must_use]
    pub fn costate_map(&self) -> &DMatrix<f64> {
        &self.costate_map
    }

    /// The node placement handed to the orchestrator.
    #[must_use]
    pub fn mesh(&self) -> Mesh {
        Mesh {
            points: self.points.clone(),
            defects: self.defects(),
            costate_map: self.costate_map.clone(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn uniform(nodes: usize) -> DVector<f64> {
    let last = (nodes - 1) as f64;
    DVector::from_fn(nodes, |k, _| k as f64 / last)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const ALL: [Collocation; 4] = [
        Collocation::Trapezoidal,
        Collocation::HermiteSimpson,
        Collocation::Legendre,
        Collocation::Chebyshev,
    ];

    /// Largest defect when the scheme is fed `x(σ)` and `f(σ) = x'(σ)` with `T = 1`.
    fn worst_defect(scheme: &Scheme, x: impl Fn(f64) -> f64, dx: impl Fn(f64) -> f64) -> f64 {
        let xs = scheme.points().map(&x);
        let fs = scheme.points().map(&dx);
        (scheme.a() * xs - scheme.b() * fs).amax()
    }

    #[test]
    fn weights_sum_to_one_and_points_span_the_interval() {
        for collocation in ALL {
            for nodes in [2, 3, 8, 21] {
                let scheme = Scheme::new(collocation, nodes).expect("enough nodes");
                assert_relative_eq!(scheme.weights().sum(), 1.0, epsilon = 1e-12);
                assert_relative_eq!(scheme.points()[0], 0.0, epsilon = 1e-14);
                assert_relative_eq!(scheme.points()[scheme.nodes() - 1], 1.0, epsilon = 1e-14);
                assert!(scheme.points().as_slice().windows(2).all(|w| w[0] < w[1]));
                assert_eq!(scheme.costate_map().shape(), (scheme.nodes(), scheme.defects()));
            }
        }
    }

    #[test]
    fn too_few_nodes_is_rejected() {
        assert_eq!(
            Scheme::new(Collocation::Legendre, 1),
            Err(Error::TooFewNodes {
                scheme: Collocation::Legendre,
                nodes: 1
            })
        );
    }

    #[test]
    fn trapezoidal_is_exact_for_lines() {
        let scheme = Scheme::new(Collocation::Trapezoidal, 6).expect("enough nodes");
        assert_eq!(scheme.defects(), 5);
        assert!(worst_defect(&scheme, |s| 3.0 * s - 1.0, |_| 3.0) < 1e-13);
        assert!(worst_defect(&scheme, |s| s.powi(3), |s| 3.0 * s * s) > 1e-3);
    }

    #[test]
    fn hermite_simpson_rounds_up_and_is_exact_for_cubics() {
        let scheme = Scheme::new(Collocation::HermiteSimpson, 10).expect("enough nodes");
        assert_eq!(scheme.nodes(), 11);
        assert_eq!(scheme.defects(), 10);
        assert!(worst_defect(&scheme, |s| s.powi(3) - s, |s| 3.0 * s * s - 1.0) < 1e-13);
    }

    #[test]
    fn pseudospectral_differentiation_is_exact_for_polynomials() {
        for collocation in [Collocation::Legendre, Collocation::Chebyshev] {
            let scheme = Scheme::new(collocation, 7).expect("enough nodes");
            assert_eq!(scheme.defects(), 7);
            let err = worst_defect(&scheme, |s| s.powi(6) - 2.0 * s.powi(3), |s| {
                6.0 * s.powi(5) - 6.0 * s * s
            });
            assert!(err < 1e-10, "{collocation:?}: {err}");
        }
    }

    #[test]
    fn legendre_quadrature_is_gaussian() {
        // Five Lobatto nodes integrate degree 7 exactly.
        let scheme = Scheme::new(Collocation::Legendre, 5).expect("enough nodes");
        let integral = scheme.weights().dot(&scheme.points().map(|s| s.powi(7)));
        assert_relative_eq!(integral, 1.0 / 8.0, epsilon = 1e-14);

        // Known weights on [-1, 1] are 1/10, 49/90, 32/45, 49/90, 1/10.
        assert_relative_eq!(scheme.weights()[0], 0.05, epsilon = 1e-14);
        assert_relative_eq!(scheme.weights()[2], 16.0 / 45.0, epsilon = 1e-14);
    }

    #[test]
    fn chebyshev_weights_match_clenshaw_curtis() {
        // Three nodes: Simpson's rule.
        let scheme = Scheme::new(Collocation::Chebyshev, 3).expect("enough nodes");
        assert_relative_eq!(scheme.weights()[0], 1.0 / 6.0, epsilon = 1e-14);
        assert_relative_eq!(scheme.weights()[1], 4.0 / 6.0, epsilon = 1e-14);
        assert_relative_eq!(scheme.points()[1], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn mesh_carries_scheme_shape() {
        let scheme = Scheme::new(Collocation::Trapezoidal, 4).expect("enough nodes");
        let mesh = scheme.mesh();
        assert_eq!(mesh.nodes(), 4);
        assert_eq!(mesh.defects, 3);
        assert_eq!(mesh.costate_map, *scheme.costate_map());
    }
}
