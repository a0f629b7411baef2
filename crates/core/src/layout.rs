//! Deterministic ordering of decision variables and constraints.
//!
//! For a phase with `N` nodes the variable block is laid out as
//!
//! ```text
//! [ x(0) .. x(N-1) | u(0) .. u(N-1) | p | t0 | tf ]
//! ```
//!
//! with states and controls node-major, and the constraint block as
//!
//! ```text
//! [ defects | path(0) .. path(N-1) | events | duration? ]
//! ```
//!
//! Phases follow one another in order and linkage rows come last. All indices
//! here are 0-based.

use nalgebra::{DMatrix, DVector};

use crate::Dimensions;

/// Sizing information for one phase on one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseShape {
    pub dimensions: Dimensions,
    pub nodes: usize,
    /// Number of defect rows per state.
    pub defects: usize,
    /// Whether a `tf - t0 >= 0` row is added.
    pub duration_row: bool,
}

/// Index map of one phase inside the flat vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseLayout {
    shape: PhaseShape,
    variables: usize,
    constraints: usize,
}

impl PhaseLayout {
    #[must_use]
    pub fn dimensions(&self) -> &Dimensions {
        &self.shape.dimensions
    }

    #[must_use]
    pub fn nodes(&self) -> usize {
        self.shape.nodes
    }

    /// Number of defect rows per state.
    #[must_use]
    pub fn defect_count(&self) -> usize {
        self.shape.defects
    }

    #[must_use]
    pub fn has_duration_row(&self) -> bool {
        self.shape.duration_row
    }

    /// First variable index of this phase.
    #[must_use]
    pub fn variable_offset(&self) -> usize {
        self.variables
    }

    /// First constraint index of this phase.
    #[must_use]
    pub fn constraint_offset(&self) -> usize {
        self.constraints
    }

    #[must_use]
    pub fn nvariables(&self) -> usize {
        let d = &self.shape.dimensions;
        self.shape.nodes * (d.states + d.controls) + d.parameters + 2
    }

    #[must_use]
    pub fn nconstraints(&self) -> usize {
        let d = &self.shape.dimensions;
        self.shape.defects * d.states
            + self.shape.nodes * d.path
            + d.events
            + usize::from(self.shape.duration_row)
    }

    #[must_use]
    pub fn state(&self, node: usize, i: usize) -> usize {
        self.variables + node * self.shape.dimensions.states + i
    }

    #[must_use]
    pub fn control(&self, node: usize, j: usize) -> usize {
        let d = &self.shape.dimensions;
        self.variables + self.shape.nodes * d.states + node * d.controls + j
    }

    #[must_use]
    pub fn parameter(&self, i: usize) -> usize {
        let d = &self.shape.dimensions;
        self.variables + self.shape.nodes * (d.states + d.controls) + i
    }

    #[must_use]
    pub fn start_time(&self) -> usize {
        self.parameter(self.shape.dimensions.parameters)
    }

    #[must_use]
    pub fn end_time(&self) -> usize {
        self.start_time() + 1
    }

    /// Row of defect `d` for state `i`.
    #[must_use]
    pub fn defect(&self, d: usize, i: usize) -> usize {
        self.constraints + d * self.shape.dimensions.states + i
    }

    #[must_use]
    pub fn path(&self, node: usize, m: usize) -> usize {
        let d = &self.shape.dimensions;
        self.constraints + self.shape.defects * d.states + node * d.path + m
    }

    #[must_use]
    pub fn event(&self, e: usize) -> usize {
        let d = &self.shape.dimensions;
        self.constraints + self.shape.defects * d.states + self.shape.nodes * d.path + e
    }

    #[must_use]
    pub fn duration(&self) -> Option<usize> {
        self.shape
            .duration_row
            .then(|| self.event(self.shape.dimensions.events))
    }
}

/// Per-phase arrays that the variable block of a phase maps onto.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTrajectory {
    /// `nstates × N`
    pub states: DMatrix<f64>,
    /// `ncontrols × N`
    pub controls: DMatrix<f64>,
    pub parameters: DVector<f64>,
    pub start_time: f64,
    pub end_time: f64,
}

/// Index map of the whole problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    phases: Vec<PhaseLayout>,
    nlinkages: usize,
    nvariables: usize,
    nconstraints: usize,
}

impl Layout {
    #[must_use]
    pub fn new(shapes: &[PhaseShape], nlinkages: usize) -> Self {
        let mut variables = 0;
        let mut constraints = 0;
        let phases = shapes
            .iter()
            .map(|&shape| {
                let phase = PhaseLayout {
                    shape,
                    variables,
                    constraints,
                };
                variables += phase.nvariables();
                constraints += phase.nconstraints();
                phase
            })
            .collect();

        Self {
            phases,
            nlinkages,
            nvariables: variables,
            nconstraints: constraints + nlinkages,
        }
    }

    #[must_use]
    pub fn phases(&self) -> &[PhaseLayout] {
        &self.phases
    }

    #[must_use]
    pub fn nvariables(&self) -> usize {
        self.nvariables
    }

    #[must_use]
    pub fn nconstraints(&self) -> usize {
        self.nconstraints
    }

    #[must_use]
    pub fn nlinkages(&self) -> usize {
        self.nlinkages
    }

    /// Row of linkage constraint `l`.
    #[must_use]
    pub fn linkage(&self, l: usize) -> usize {
        self.nconstraints - self.nlinkages + l
    }

    /// Packs per-phase arrays into one decision vector.
    ///
    /// # Panics
    ///
    /// Panics if `trajectories` does not match the layout's phases in count
    /// and shape.
    #[must_use]
    pub fn flatten(&self, trajectories: &[PhaseTrajectory]) -> DVector<f64> {
        assert_eq!(trajectories.len(), self.phases.len(), "one trajectory per phase");
        let mut x = DVector::zeros(self.nvariables);
        for (phase, traj) in self.phases.iter().zip(trajectories) {
            let d = phase.dimensions();
            for k in 0..phase.nodes() {
                for i in 0..d.states {
                    x[phase.state(k, i)] = traj.states[(i, k)];
                }
                for j in 0..d.controls {
                    x[phase.control(k, j)] = traj.controls[(j, k)];
                }
            }
            for i in 0..d.parameters {
                x[phase.parameter(i)] = traj.parameters[i];
            }
            x[phase.start_time()] = traj.start_time;
            x[phase.end_time()] = traj.end_time;
        }
        x
    }

    /// Splits a decision vector into per-phase arrays.
    #[must_use]
    pub fn unflatten(&self, x: &DVector<f64>) -> Vec<PhaseTrajectory> {
        self.phases
            .iter()
            .map(|phase| {
                let d = phase.dimensions();
                let n = phase.nodes();
                PhaseTrajectory {
                    states: DMatrix::from_fn(d.states, n, |i, k| x[phase.state(k, i)]),
                    controls: DMatrix::from_fn(d.controls, n, |j, k| x[phase.control(k, j)]),
                    parameters: DVector::from_fn(d.parameters, |i, _| x[phase.parameter(i)]),
                    start_time: x[phase.start_time()],
                    end_time: x[phase.end_time()],
                }
            })
            .collect()
    }
}
