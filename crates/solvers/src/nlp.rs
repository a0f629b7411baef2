//! A flattened optimal-control problem presented as a dense [`NlpProblem`].
//!
//! Values and first derivatives are assembled in physical units from small
//! local functions, one per node, one per phase boundary and one for the
//! linkages, then scaled for the solver as `x̃ = s_x ⊙ x`, `c̃ = s_c ⊙ c` and
//! `f̃ = s_f f`.

use std::convert::Infallible;

use bolza_core::{
    Algorithm, Boundary, DerivativeMode, Dimensions, Endpoints, Nlp, Node, OptimalControl,
    PhaseLayout, Scalar, Workspace,
};
use nalgebra::{DMatrix, DVector};

use crate::collocation::{self, Scheme};
use crate::derivative::{self, LocalFunction};
use crate::interior_point::{Derivatives, NlpProblem, Values};

/// Dynamics, path constraints and running cost at one node.
///
/// Inputs are `[x, u, p, t]`, outputs `[f, g, L]`.
struct NodeFn<'m, M> {
    model: &'m M,
    workspace: &'m Workspace,
    dims: Dimensions,
    phase: usize,
}

impl<M: OptimalControl> LocalFunction for NodeFn<'_, M> {
    fn inputs(&self) -> usize {
        self.dims.states + self.dims.controls + self.dims.parameters + 1
    }

    fn outputs(&self) -> usize {
        self.dims.states + self.dims.path + 1
    }

    fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]) {
        let d = &self.dims;
        let (states, rest) = input.split_at(d.states);
        let (controls, rest) = rest.split_at(d.controls);
        let (parameters, time) = rest.split_at(d.parameters);
        let node = Node {
            states,
            controls,
            parameters,
            time: time[0],
            phase: self.phase,
        };

        let (derivatives, rest) = output.split_at_mut(d.states);
        let (path, cost) = rest.split_at_mut(d.path);
        self.model.dae(derivatives, path, &node, self.workspace);
        cost[0] = self.model.integrand_cost(&node, self.workspace);
    }
}

fn boundary_width(dims: &Dimensions) -> usize {
    2 * dims.states + dims.parameters + 2
}

/// Reads a boundary block laid out as `[x(t0), x(tf), p, t0, tf]`.
fn split_boundary<'a, S: Copy>(block: &'a [S], dims: &Dimensions, phase: usize) -> Boundary<'a, S> {
    let (initial_states, rest) = block.split_at(dims.states);
    let (final_states, rest) = rest.split_at(dims.states);
    let (parameters, times) = rest.split_at(dims.parameters);
    Boundary {
        initial_states,
        final_states,
        parameters,
        start_time: times[0],
        end_time: times[1],
        phase,
    }
}

/// Flat variable indices of a phase's boundary block.
fn boundary_columns(pl: &PhaseLayout) -> Vec<usize> {
    let d = pl.dimensions();
    let last = pl.nodes() - 1;
    (0..d.states)
        .map(|i| pl.state(0, i))
        .chain((0..d.states).map(|i| pl.state(last, i)))
        .chain((0..d.parameters).map(|i| pl.parameter(i)))
        .chain([pl.start_time(), pl.end_time()])
        .collect()
}

/// Flat variable index of local node column `c`, excluding time.
fn node_column(pl: &PhaseLayout, k: usize, c: usize) -> usize {
    let d = pl.dimensions();
    if c < d.states {
        pl.state(k, c)
    } else if c < d.states + d.controls {
        pl.control(k, c - d.states)
    } else {
        pl.parameter(c - d.states - d.controls)
    }
}

/// Event constraints and endpoint cost of one phase.
///
/// Outputs are `[events, φ]`.
struct BoundaryFn<'m, M> {
    model: &'m M,
    workspace: &'m Workspace,
    dims: Dimensions,
    phase: usize,
}

impl<M: OptimalControl> LocalFunction for BoundaryFn<'_, M> {
    fn inputs(&self) -> usize {
        boundary_width(&self.dims)
    }

    fn outputs(&self) -> usize {
        self.dims.events + 1
    }

    fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]) {
        let boundary = split_boundary(input, &self.dims, self.phase);
        let (events, cost) = output.split_at_mut(self.dims.events);
        self.model.events(events, &boundary, self.workspace);
        cost[0] = self.model.endpoint_cost(&boundary, self.workspace);
    }
}

/// Linkage constraints over the concatenated boundary blocks of every phase.
struct LinkageFn<'m, M> {
    model: &'m M,
    workspace: &'m Workspace,
    dims: Vec<Dimensions>,
    nlinkages: usize,
}

impl<M: OptimalControl> LocalFunction for LinkageFn<'_, M> {
    fn inputs(&self) -> usize {
        self.dims.iter().map(boundary_width).sum()
    }

    fn outputs(&self) -> usize {
        self.nlinkages
    }

    fn eval<S: Scalar>(&self, input: &[S], output: &mut [S]) {
        let mut boundaries = Vec::with_capacity(self.dims.len());
        let mut offset = 0;
        for (p, dims) in self.dims.iter().enumerate() {
            let width = boundary_width(dims);
            boundaries.push(split_boundary(&input[offset..offset + width], dims, p + 1));
            offset += width;
        }
        self.model
            .linkages(output, &Endpoints::new(&boundaries), self.workspace);
    }
}

/// The problem on one mesh, discretized by one collocation scheme per phase.
pub(crate) struct CollocationNlp<'n, 'a, M> {
    nlp: &'n Nlp<'a, M>,
    schemes: Vec<Scheme>,
    mode: DerivativeMode,
}

impl<'n, 'a, M: OptimalControl> CollocationNlp<'n, 'a, M> {
    pub(crate) fn new(nlp: &'n Nlp<'a, M>, algorithm: &Algorithm) -> Result<Self, collocation::Error> {
        let schemes = nlp
            .meshes()
            .iter()
            .map(|mesh| Scheme::new(algorithm.collocation, mesh.nodes()))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            nlp,
            schemes,
            mode: algorithm.derivatives,
        })
    }

    /// Physical variables for a scaled point.
    pub(crate) fn physical(&self, scaled: &DVector<f64>) -> DVector<f64> {
        scaled.component_div(self.nlp.variable_scale())
    }

    /// Physical objective for a scaled one.
    pub(crate) fn objective(&self, scaled: f64) -> f64 {
        scaled / self.nlp.objective_scale()
    }

    /// Multipliers of the physical problem, `λ = s_c ⊙ λ̃ / s_f`.
    pub(crate) fn multipliers(&self, scaled: &DVector<f64>) -> DVector<f64> {
        scaled.component_mul(self.nlp.constraint_scale()) / self.nlp.objective_scale()
    }

    /// Values, and derivatives when asked, in physical units.
    fn assemble(&self, x: &DVector<f64>, differentiate: bool) -> (Values, Option<Derivatives>) {
        let layout = self.nlp.layout();
        let (n, m) = (layout.nvariables(), layout.nconstraints());
        let mut values = Values {
            objective: 0.0,
            constraints: DVector::zeros(m),
        };
        let mut derivatives = differentiate.then(|| Derivatives {
            gradient: DVector::zeros(n),
            jacobian: DMatrix::zeros(m, n),
        });

        for (index, (pl, scheme)) in layout.phases().iter().zip(&self.schemes).enumerate() {
            self.dynamics(index + 1, pl, scheme, x, &mut values, derivatives.as_mut());
            self.boundary(index + 1, pl, x, &mut values, derivatives.as_mut());
        }
        if layout.nlinkages() > 0 {
            self.linkages(x, &mut values, derivatives.as_mut());
        }
        (values, derivatives)
    }

    fn mode(&self, derivatives: Option<&Derivatives>) -> Option<DerivativeMode> {
        derivatives.map(|_| self.mode)
    }

    /// Defects, path constraints and running cost of one phase.
    fn dynamics(
        &self,
        phase: usize,
        pl: &PhaseLayout,
        scheme: &Scheme,
        x: &DVector<f64>,
        values: &mut Values,
        mut derivatives: Option<&mut Derivatives>,
    ) {
        let d = *pl.dimensions();
        let nodes = pl.nodes();
        let f = NodeFn {
            model: self.nlp.model(),
            workspace: self.nlp.workspace(),
            dims: d,
            phase,
        };
        let mode = self.mode(derivatives.as_deref());
        let t = d.states + d.controls + d.parameters;
        let (t0_col, tf_col) = (pl.start_time(), pl.end_time());
        let (t0, span) = (x[t0_col], x[tf_col] - x[t0_col]);
        let (sigma, weights) = (scheme.points(), scheme.weights());

        let mut rates = DMatrix::zeros(d.states, nodes);
        let mut jacobians = Vec::new();
        let mut input = vec![0.0; f.inputs()];
        for k in 0..nodes {
            for (c, value) in input.iter_mut().take(t).enumerate() {
                *value = x[node_column(pl, k, c)];
            }
            input[t] = t0 + span * sigma[k];
            let local = derivative::evaluate(&f, &input, mode);

            for i in 0..d.states {
                rates[(i, k)] = local.values[i];
            }
            for g in 0..d.path {
                values.constraints[pl.path(k, g)] = local.values[d.states + g];
            }
            let cost = local.values[d.states + d.path];
            values.objective += span * weights[k] * cost;

            let (Some(der), Some(jn)) = (derivatives.as_deref_mut(), local.jacobian) else {
                continue;
            };
            let (before, after) = (1.0 - sigma[k], sigma[k]);
            for g in 0..d.path {
                let (row, r) = (pl.path(k, g), d.states + g);
                for c in 0..t {
                    der.jacobian[(row, node_column(pl, k, c))] += jn[(r, c)];
                }
                der.jacobian[(row, t0_col)] += jn[(r, t)] * before;
                der.jacobian[(row, tf_col)] += jn[(r, t)] * after;
            }

            let (r, w) = (d.states + d.path, weights[k]);
            for c in 0..t {
                der.gradient[node_column(pl, k, c)] += span * w * jn[(r, c)];
            }
            der.gradient[t0_col] += -w * cost + span * w * jn[(r, t)] * before;
            der.gradient[tf_col] += w * cost + span * w * jn[(r, t)] * after;
            jacobians.push(jn);
        }

        let (a, b) = (scheme.a(), scheme.b());
        for row in 0..scheme.defects() {
            for i in 0..d.states {
                values.constraints[pl.defect(row, i)] = (0..nodes)
                    .map(|k| a[(row, k)] * x[pl.state(k, i)] - span * b[(row, k)] * rates[(i, k)])
                    .sum();
            }
        }

        let Some(der) = derivatives else {
            return;
        };
        for row in 0..scheme.defects() {
            for (k, jn) in jacobians.iter().enumerate() {
                let (ak, bk) = (a[(row, k)], b[(row, k)]);
                for i in 0..d.states {
                    let defect = pl.defect(row, i);
                    der.jacobian[(defect, pl.state(k, i))] += ak;
                    if bk == 0.0 {
                        continue;
                    }
                    let beta = span * bk;
                    for c in 0..t {
                        der.jacobian[(defect, node_column(pl, k, c))] -= beta * jn[(i, c)];
                    }
                    der.jacobian[(defect, t0_col)] += bk * rates[(i, k)] - beta * jn[(i, t)] * (1.0 - sigma[k]);
                    der.jacobian[(defect, tf_col)] += -bk * rates[(i, k)] - beta * jn[(i, t)] * sigma[k];
                }
            }
        }
    }

    /// Events, endpoint cost and the duration row of one phase.
    fn boundary(
        &self,
        phase: usize,
        pl: &PhaseLayout,
        x: &DVector<f64>,
        values: &mut Values,
        derivatives: Option<&mut Derivatives>,
    ) {
        let d = *pl.dimensions();
        let f = BoundaryFn {
            model: self.nlp.model(),
            workspace: self.nlp.workspace(),
            dims: d,
            phase,
        };
        let columns = boundary_columns(pl);
        let input: Vec<f64> = columns.iter().map(|&c| x[c]).collect();
        let local = derivative::evaluate(&f, &input, self.mode(derivatives.as_deref()));

        for e in 0..d.events {
            values.constraints[pl.event(e)] = local.values[e];
        }
        values.objective += local.values[d.events];
        let duration = pl.duration();
        if let Some(row) = duration {
            values.constraints[row] = x[pl.end_time()] - x[pl.start_time()];
        }

        let (Some(der), Some(jb)) = (derivatives, local.jacobian) else {
            return;
        };
        for (c, &col) in columns.iter().enumerate() {
            for e in 0..d.events {
                der.jacobian[(pl.event(e), col)] += jb[(e, c)];
            }
            der.gradient[col] += jb[(d.events, c)];
        }
        if let Some(row) = duration {
            der.jacobian[(row, pl.start_time())] = -1.0;
            der.jacobian[(row, pl.end_time())] = 1.0;
        }
    }

    fn linkages(&self, x: &DVector<f64>, values: &mut Values, derivatives: Option<&mut Derivatives>) {
        let layout = self.nlp.layout();
        let f = LinkageFn {
            model: self.nlp.model(),
            workspace: self.nlp.workspace(),
            dims: layout.phases().iter().map(|pl| *pl.dimensions()).collect(),
            nlinkages: layout.nlinkages(),
        };
        let columns: Vec<usize> = layout.phases().iter().flat_map(boundary_columns).collect();
        let input: Vec<f64> = columns.iter().map(|&c| x[c]).collect();
        let local = derivative::evaluate(&f, &input, self.mode(derivatives.as_deref()));

        for l in 0..layout.nlinkages() {
            values.constraints[layout.linkage(l)] = local.values[l];
        }
        let (Some(der), Some(jl)) = (derivatives, local.jacobian) else {
            return;
        };
        for (c, &col) in columns.iter().enumerate() {
            for l in 0..layout.nlinkages() {
                der.jacobian[(layout.linkage(l), col)] += jl[(l, c)];
            }
        }
    }
}

impl<M: OptimalControl> NlpProblem for CollocationNlp<'_, '_, M> {
    type Error = Infallible;

    fn nvariables(&self) -> usize {
        self.nlp.layout().nvariables()
    }

    fn nconstraints(&self) -> usize {
        self.nlp.layout().nconstraints()
    }

    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let (lower, upper) = self.nlp.variable_bounds();
        let scale = self.nlp.variable_scale();
        (lower.component_mul(scale), upper.component_mul(scale))
    }

    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let (lower, upper) = self.nlp.constraint_bounds();
        let scale = self.nlp.constraint_scale();
        (lower.component_mul(scale), upper.component_mul(scale))
    }

    fn initial_point(&self) -> DVector<f64> {
        self.nlp.initial().component_mul(self.nlp.variable_scale())
    }

    fn evaluate(&self, x: &DVector<f64>) -> Result<Values, Infallible> {
        let (values, _) = self.assemble(&self.physical(x), false);
        Ok(Values {
            objective: values.objective * self.nlp.objective_scale(),
            constraints: values.constraints.component_mul(self.nlp.constraint_scale()),
        })
    }

    fn differentiate(&self, x: &DVector<f64>) -> Result<Derivatives, Infallible> {
        let (_, derivatives) = self.assemble(&self.physical(x), true);
        let Derivatives {
            gradient,
            mut jacobian,
        } = derivatives.unwrap_or_else(|| Derivatives {
            gradient: DVector::zeros(x.len()),
            jacobian: DMatrix::zeros(self.nconstraints(), x.len()),
        });

        let (variable, constraint) = (self.nlp.variable_scale(), self.nlp.constraint_scale());
        let gradient = gradient.component_div(variable) * self.nlp.objective_scale();
        for (j, mut column) in jacobian.column_iter_mut().enumerate() {
            column.component_mul_assign(constraint);
            column /= variable[j];
        }
        Ok(Derivatives { gradient, jacobian })
    }
}

#[cfg(test)]
mod tests;
