//! The problem as the barrier method sees it.
//!
//! Fixed variables are removed, every two-sided or one-sided constraint row
//! gets a slack `s` with `c(x) - s = 0`, and rows free on both sides are
//! dropped. What remains is
//!
//! ```text
//! minimize f(z)  subject to  h(z) = 0,  l ≤ z ≤ u
//! ```
//!
//! with `z = (free x, s)` and finite bounds relaxed slightly outward.

use nalgebra::{DMatrix, DVector};

use super::{Derivatives, Error, NlpProblem, Values};

/// Relative outward relaxation of finite bounds.
const RELAX: f64 = 1e-8;

/// Relative distance the start point keeps from its bounds.
const PUSH: f64 = 1e-2;

#[derive(Debug, Clone, Copy)]
enum Row {
    Equality { index: usize, target: f64 },
    Inequality { index: usize, slack: usize },
}

impl Row {
    fn index(self) -> usize {
        match self {
            Row::Equality { index, .. } | Row::Inequality { index, .. } => index,
        }
    }
}

/// Problem values at a point of the reformulated problem.
#[derive(Debug, Clone)]
pub(super) struct Evaluation {
    pub values: Values,
    /// `h(z)`
    pub residual: DVector<f64>,
}

/// First derivatives at a point of the reformulated problem.
#[derive(Debug, Clone)]
pub(super) struct Linearization {
    pub gradient: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    /// Derivatives of the original problem at the same point.
    pub original: Derivatives,
}

impl Linearization {
    /// `∇f + Jᵀλ`
    pub(super) fn lagrangian_gradient(&self, lambda: &DVector<f64>) -> DVector<f64> {
        &self.gradient + self.jacobian.tr_mul(lambda)
    }
}

pub(super) struct Barrier<'p, P> {
    problem: &'p P,
    nvariables: usize,
    nconstraints: usize,
    free: Vec<usize>,
    template: DVector<f64>,
    rows: Vec<Row>,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

fn check(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::Dimension {
            what,
            expected,
            actual,
        })
    }
}

fn relax_down(bound: f64) -> f64 {
    bound - RELAX * bound.abs().max(1.0)
}

fn relax_up(bound: f64) -> f64 {
    bound + RELAX * bound.abs().max(1.0)
}

/// Moves `value` strictly inside `[lower, upper]`.
fn push_inside(value: f64, lower: f64, upper: f64) -> f64 {
    let width = upper - lower;
    let mut value = value;
    if lower.is_finite() {
        let gap = (PUSH * lower.abs().max(1.0)).min(PUSH * width);
        value = value.max(lower + gap);
    }
    if upper.is_finite() {
        let gap = (PUSH * upper.abs().max(1.0)).min(PUSH * width);
        value = value.min(upper - gap);
    }
    value
}

impl<'p, P: NlpProblem> Barrier<'p, P> {
    pub(super) fn new(problem: &'p P) -> Result<Self, Error> {
        let n = problem.nvariables();
        let m = problem.nconstraints();
        let (x_lower, x_upper) = problem.variable_bounds();
        let (c_lower, c_upper) = problem.constraint_bounds();
        check("variable lower bounds", n, x_lower.len())?;
        check("variable upper bounds", n, x_upper.len())?;
        check("constraint lower bounds", m, c_lower.len())?;
        check("constraint upper bounds", m, c_upper.len())?;

        let mut template = problem.initial_point();
        check("initial values", n, template.len())?;

        let mut free = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n + m);
        let mut upper = Vec::with_capacity(n + m);
        for index in 0..n {
            let (l, u) = (x_lower[index], x_upper[index]);
            if l.is_nan() || u.is_nan() || l > u || (l == u && !l.is_finite()) {
                return Err(Error::VariableBounds {
                    index,
                    lower: l,
                    upper: u,
                });
            }
            if l == u {
                template[index] = l;
            } else {
                free.push(index);
                lower.push(relax_down(l));
                upper.push(relax_up(u));
            }
        }

        let mut rows = Vec::with_capacity(m);
        for index in 0..m {
            let (l, u) = (c_lower[index], c_upper[index]);
            if l.is_nan() || u.is_nan() || l > u || (l == u && !l.is_finite()) {
                return Err(Error::ConstraintBounds {
                    index,
                    lower: l,
                    upper: u,
                });
            }
            if l == u {
                rows.push(Row::Equality { index, target: l });
            } else if l.is_finite() || u.is_finite() {
                rows.push(Row::Inequality {
                    index,
                    slack: lower.len(),
                });
                lower.push(relax_down(l));
                upper.push(relax_up(u));
            }
        }

        Ok(Self {
            problem,
            nvariables: n,
            nconstraints: m,
            free,
            template,
            rows,
            lower: DVector::from_vec(lower),
            upper: DVector::from_vec(upper),
        })
    }

    /// Number of entries of `z`.
    pub(super) fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Number of free original variables, which lead `z`.
    pub(super) fn nfree(&self) -> usize {
        self.free.len()
    }

    pub(super) fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub(super) fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// The original variables for a point `z`.
    pub(super) fn full(&self, z: &DVector<f64>) -> DVector<f64> {
        let mut x = self.template.clone();
        for (k, &i) in self.free.iter().enumerate() {
            x[i] = z[k];
        }
        x
    }

    /// Builds the start point from the problem's initial values.
    pub(super) fn start(&self) -> Result<(DVector<f64>, Evaluation), Error> {
        let mut z = DVector::zeros(self.dimension());
        for (k, &i) in self.free.iter().enumerate() {
            z[k] = self.template[i];
        }
        let values = self.values(&z)?;
        for row in &self.rows {
            if let Row::Inequality { index, slack } = *row {
                z[slack] = values.constraints[index];
            }
        }
        for k in 0..z.len() {
            z[k] = push_inside(z[k], self.lower[k], self.upper[k]);
        }
        if z.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteStart {
                what: "initial point",
            });
        }

        let evaluation = self.evaluate(&z)?;
        if !evaluation.values.objective.is_finite() {
            return Err(Error::NonFiniteStart { what: "objective" });
        }
        if evaluation.values.constraints.iter().any(|c| !c.is_finite()) {
            return Err(Error::NonFiniteStart { what: "constraint" });
        }
        Ok((z, evaluation))
    }

    fn values(&self, z: &DVector<f64>) -> Result<Values, Error> {
        let values = self.problem.evaluate(&self.full(z)).map_err(Error::problem)?;
        check("constraint values", self.nconstraints, values.constraints.len())?;
        Ok(values)
    }

    pub(super) fn evaluate(&self, z: &DVector<f64>) -> Result<Evaluation, Error> {
        let values = self.values(z)?;
        let residual = DVector::from_fn(self.rows.len(), |r, _| match self.rows[r] {
            Row::Equality { index, target } => values.constraints[index] - target,
            Row::Inequality { index, slack } => values.constraints[index] - z[slack],
        });
        Ok(Evaluation { values, residual })
    }

    pub(super) fn linearize(&self, z: &DVector<f64>) -> Result<Linearization, Error> {
        let original = self
            .problem
            .differentiate(&self.full(z))
            .map_err(Error::problem)?;
        check("gradient entries", self.nvariables, original.gradient.len())?;
        check("jacobian rows", self.nconstraints, original.jacobian.nrows())?;
        check("jacobian columns", self.nvariables, original.jacobian.ncols())?;

        let mut gradient = DVector::zeros(self.dimension());
        for (k, &i) in self.free.iter().enumerate() {
            gradient[k] = original.gradient[i];
        }
        let mut jacobian = DMatrix::zeros(self.rows.len(), self.dimension());
        for (r, row) in self.rows.iter().enumerate() {
            let index = row.index();
            for (k, &i) in self.free.iter().enumerate() {
                jacobian[(r, k)] = original.jacobian[(index, i)];
            }
            if let Row::Inequality { slack, .. } = *row {
                jacobian[(r, slack)] = -1.0;
            }
        }
        Ok(Linearization {
            gradient,
            jacobian,
            original,
        })
    }

    /// Constraint multipliers of the original rows; dropped rows get zero.
    pub(super) fn multipliers(&self, lambda: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(self.nconstraints);
        for (row, &value) in self.rows.iter().zip(lambda.iter()) {
            out[row.index()] = value;
        }
        out
    }

    /// Bound multipliers of the original variables.
    ///
    /// Fixed variables take whatever balances the stationarity condition.
    pub(super) fn bound_multipliers(
        &self,
        nu: &DVector<f64>,
        linearization: &Linearization,
        multipliers: &DVector<f64>,
    ) -> DVector<f64> {
        let original = &linearization.original;
        let mut out = -(&original.gradient + original.jacobian.tr_mul(multipliers));
        for (k, &i) in self.free.iter().enumerate() {
            out[i] = nu[k];
        }
        out
    }
}
