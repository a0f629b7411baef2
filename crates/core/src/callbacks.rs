use crate::{Dimensions, Scalar};

/// Values at one collocation node, handed to [`OptimalControl::dae`] and
/// [`OptimalControl::integrand_cost`].
#[derive(Debug, Clone, Copy)]
pub struct Node<'a, S> {
    pub states: &'a [S],
    pub controls: &'a [S],
    pub parameters: &'a [S],
    pub time: S,
    /// 1-based phase index.
    pub phase: usize,
}

/// Boundary values of one phase.
#[derive(Debug, Clone, Copy)]
pub struct Boundary<'a, S> {
    pub initial_states: &'a [S],
    pub final_states: &'a [S],
    pub parameters: &'a [S],
    pub start_time: S,
    pub end_time: S,
    /// 1-based phase index.
    pub phase: usize,
}

/// The boundaries of every phase, for [`OptimalControl::linkages`].
#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a, S> {
    phases: &'a [Boundary<'a, S>],
}

impl<'a, S> Endpoints<'a, S> {
    #[must_use]
    pub fn new(phases: &'a [Boundary<'a, S>]) -> Self {
        Self { phases }
    }

    /// Returns the boundary of a 1-based phase.
    ///
    /// # Panics
    ///
    /// Panics if `phase` is zero or exceeds the number of phases.
    #[must_use]
    pub fn phase(&self, phase: usize) -> &Boundary<'a, S> {
        &self.phases[phase - 1]
    }

    /// Returns the boundary of a 1-based phase, or `None` if out of range.
    #[must_use]
    pub fn get(&self, phase: usize) -> Option<&Boundary<'a, S>> {
        phase.checked_sub(1).and_then(|i| self.phases.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// Per-solve context passed by reference into every callback.
///
/// The orchestrator owns one `Workspace` for the duration of a solve and
/// updates the mesh fields between mesh iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    name: String,
    dimensions: Vec<Dimensions>,
    nodes: Vec<usize>,
    mesh_iteration: usize,
}

impl Workspace {
    pub(crate) fn new(name: &str, dimensions: Vec<Dimensions>) -> Self {
        let nodes = vec![0; dimensions.len()];
        Self {
            name: name.to_owned(),
            dimensions,
            nodes,
            mesh_iteration: 0,
        }
    }

    pub(crate) fn enter_mesh(&mut self, iteration: usize, nodes: Vec<usize>) {
        self.mesh_iteration = iteration;
        self.nodes = nodes;
    }

    #[must_use]
    pub fn problem_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn nphases(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns the dimensions of a 1-based phase.
    #[must_use]
    pub fn dimensions(&self, phase: usize) -> Option<&Dimensions> {
        phase.checked_sub(1).and_then(|i| self.dimensions.get(i))
    }

    /// Returns the node count of a 1-based phase on the current mesh.
    #[must_use]
    pub fn nodes(&self, phase: usize) -> Option<usize> {
        phase.checked_sub(1).and_then(|i| self.nodes.get(i)).copied()
    }

    /// Returns the 1-based mesh iteration, or zero before the first mesh.
    #[must_use]
    pub fn mesh_iteration(&self) -> usize {
        self.mesh_iteration
    }
}

/// The user-supplied functions that define an optimal-control problem.
///
/// Every method is generic over [`Scalar`] so one implementation serves both
/// plain evaluation and derivative propagation. Output slices arrive sized to
/// the phase dimensions and every entry must be written; an entry left alone
/// or set to a non-finite value is rejected before the solve starts.
///
/// Only [`dae`](Self::dae) is required. The cost terms default to zero, and
/// events and linkages default to writing nothing, which is correct for
/// phases without events and for single-phase problems.
pub trait OptimalControl {
    /// Writes the state derivatives and path constraint values at a node.
    fn dae<S: Scalar>(
        &self,
        derivatives: &mut [S],
        path: &mut [S],
        node: &Node<'_, S>,
        workspace: &Workspace,
    );

    /// Returns the running (Lagrange) cost at a node.
    fn integrand_cost<S: Scalar>(&self, _node: &Node<'_, S>, _workspace: &Workspace) -> S {
        S::zero()
    }

    /// Returns the terminal (Mayer) cost of a phase.
    fn endpoint_cost<S: Scalar>(&self, _boundary: &Boundary<'_, S>, _workspace: &Workspace) -> S {
        S::zero()
    }

    /// Writes the event constraint values of a phase.
    fn events<S: Scalar>(
        &self,
        _events: &mut [S],
        _boundary: &Boundary<'_, S>,
        _workspace: &Workspace,
    ) {
    }

    /// Writes the linkage constraint values between phases.
    fn linkages<S: Scalar>(
        &self,
        _linkages: &mut [S],
        _endpoints: &Endpoints<'_, S>,
        _workspace: &Workspace,
    ) {
    }
}
