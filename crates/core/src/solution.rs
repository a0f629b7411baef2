use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView};
use thiserror::Error;

use crate::NlpStatus;

/// Errors raised by [`Solution`] accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolutionError {
    #[error("phase {phase} is out of range (solution has {nphases} phases)")]
    PhaseOutOfRange { phase: usize, nphases: usize },
}

/// Reconstructed trajectories of one phase on the final mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSolution {
    /// `nstates × N`
    pub states: DMatrix<f64>,
    /// `ncontrols × N`
    pub controls: DMatrix<f64>,
    pub time: DVector<f64>,
    /// `nstates × N`
    pub costates: DMatrix<f64>,
    pub hamiltonian: DVector<f64>,
    pub parameters: DVector<f64>,
    /// Path constraint values, `npath × N`.
    pub path: DMatrix<f64>,
    pub event_multipliers: DVector<f64>,
    /// `npath × N`
    pub path_multipliers: DMatrix<f64>,
}

/// Summary of one mesh iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshIteration {
    /// 1-based mesh iteration.
    pub iteration: usize,
    /// Node count per phase.
    pub nodes: Vec<usize>,
    pub status: NlpStatus,
    pub objective: f64,
    pub nlp_iterations: usize,
    /// Largest relative defect of a Hermite–Simpson check between nodes.
    pub ode_error: f64,
}

/// The result of a solve.
///
/// Trajectory accessors take 1-based phase indices. When the final mesh did
/// not converge ([`Solution::error_flag`] is true) they return empty views;
/// [`Solution::last_iterate`] still exposes what the solver ended on.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    status: NlpStatus,
    objective: f64,
    iterations: usize,
    phases: Vec<PhaseSolution>,
    linkage_multipliers: DVector<f64>,
    mesh_history: Vec<MeshIteration>,
}

impl Solution {
    pub(crate) fn new(
        status: NlpStatus,
        objective: f64,
        iterations: usize,
        phases: Vec<PhaseSolution>,
        linkage_multipliers: DVector<f64>,
        mesh_history: Vec<MeshIteration>,
    ) -> Self {
        Self {
            status,
            objective,
            iterations,
            phases,
            linkage_multipliers,
            mesh_history,
        }
    }

    /// Status of the final mesh iteration.
    #[must_use]
    pub fn status(&self) -> NlpStatus {
        self.status
    }

    /// Returns true unless the final NLP solve converged.
    #[must_use]
    pub fn error_flag(&self) -> bool {
        !self.status.is_converged()
    }

    #[must_use]
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// NLP iterations summed over all mesh iterations.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn nphases(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn mesh_history(&self) -> &[MeshIteration] {
        &self.mesh_history
    }

    /// Returns the final iterate of a phase regardless of [`Self::error_flag`].
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an index outside
    /// `1..=nphases`.
    pub fn last_iterate(&self, phase: usize) -> Result<&PhaseSolution, SolutionError> {
        let nphases = self.phases.len();
        phase
            .checked_sub(1)
            .and_then(|i| self.phases.get(i))
            .ok_or(SolutionError::PhaseOutOfRange { phase, nphases })
    }

    fn matrix<'a>(
        &'a self,
        phase: usize,
        pick: impl FnOnce(&'a PhaseSolution) -> &'a DMatrix<f64>,
    ) -> Result<DMatrixView<'a, f64>, SolutionError> {
        let m = pick(self.last_iterate(phase)?);
        let cols = if self.error_flag() { 0 } else { m.ncols() };
        Ok(m.columns(0, cols))
    }

    fn vector<'a>(
        &'a self,
        phase: usize,
        pick: impl FnOnce(&'a PhaseSolution) -> &'a DVector<f64>,
    ) -> Result<DVectorView<'a, f64>, SolutionError> {
        let v = pick(self.last_iterate(phase)?);
        let rows = if self.error_flag() { 0 } else { v.len() };
        Ok(v.rows(0, rows))
    }

    /// State trajectories, `nstates × N`.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn states(&self, phase: usize) -> Result<DMatrixView<'_, f64>, SolutionError> {
        self.matrix(phase, |p| &p.states)
    }

    /// Control trajectories, `ncontrols × N`.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn controls(&self, phase: usize) -> Result<DMatrixView<'_, f64>, SolutionError> {
        self.matrix(phase, |p| &p.controls)
    }

    /// Node times.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn time(&self, phase: usize) -> Result<DVectorView<'_, f64>, SolutionError> {
        self.vector(phase, |p| &p.time)
    }

    /// Costate estimates, `nstates × N`.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn costates(&self, phase: usize) -> Result<DMatrixView<'_, f64>, SolutionError> {
        self.matrix(phase, |p| &p.costates)
    }

    /// Hamiltonian at every node.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn hamiltonian(&self, phase: usize) -> Result<DVectorView<'_, f64>, SolutionError> {
        self.vector(phase, |p| &p.hamiltonian)
    }

    /// Static parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn parameters(&self, phase: usize) -> Result<DVectorView<'_, f64>, SolutionError> {
        self.vector(phase, |p| &p.parameters)
    }

    /// Path constraint values, `npath × N`.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn path(&self, phase: usize) -> Result<DMatrixView<'_, f64>, SolutionError> {
        self.matrix(phase, |p| &p.path)
    }

    /// Event constraint multipliers.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn event_multipliers(&self, phase: usize) -> Result<DVectorView<'_, f64>, SolutionError> {
        self.vector(phase, |p| &p.event_multipliers)
    }

    /// Path constraint multipliers, `npath × N`.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::PhaseOutOfRange`] for an invalid phase.
    pub fn path_multipliers(&self, phase: usize) -> Result<DMatrixView<'_, f64>, SolutionError> {
        self.matrix(phase, |p| &p.path_multipliers)
    }

    #[must_use]
    pub fn linkage_multipliers(&self) -> DVectorView<'_, f64> {
        let rows = if self.error_flag() {
            0
        } else {
            self.linkage_multipliers.len()
        };
        self.linkage_multipliers.rows(0, rows)
    }
}
