use std::error::Error as StdError;

use nalgebra::{DMatrix, DVector};

use crate::{Algorithm, Layout, OptimalControl, Problem, Workspace};

/// Node placement of one phase on one mesh, supplied by a [`Transcription`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Normalized node positions in `[0, 1]`, non-decreasing, first 0 and last 1.
    pub points: DVector<f64>,

    /// Number of defect rows per state.
    pub defects: usize,

    /// Maps defect multipliers to node costates: `λ = -C ν` with `C` of shape
    /// `nodes × defects`, applied state by state.
    pub costate_map: DMatrix<f64>,
}

impl Mesh {
    #[must_use]
    pub fn nodes(&self) -> usize {
        self.points.len()
    }
}

/// Outcome reported by the NLP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NlpStatus {
    Converged,
    MaxIterations,
    Infeasible,
    NumericalFailure,
}

impl NlpStatus {
    #[must_use]
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// The service's answer for one mesh.
///
/// Every quantity is unscaled. Multipliers follow the convention
/// `∇f + Jᵀλ = 0` at a stationary point of `f(x)` subject to the constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    pub primal: DVector<f64>,
    pub multipliers: DVector<f64>,
    pub status: NlpStatus,
    pub iterations: usize,
    pub objective: f64,
}

/// A flattened problem on one mesh, ready for an NLP service.
///
/// Bounds and the initial point are physical. Scaling is applied by the
/// service as `x̃ = s_x ⊙ x`, `c̃ = s_c ⊙ c` and `f̃ = s_f f`.
#[derive(Debug)]
pub struct Nlp<'a, M> {
    pub(crate) problem: &'a Problem<M>,
    pub(crate) workspace: &'a Workspace,
    pub(crate) layout: Layout,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) variable_lower: DVector<f64>,
    pub(crate) variable_upper: DVector<f64>,
    pub(crate) constraint_lower: DVector<f64>,
    pub(crate) constraint_upper: DVector<f64>,
    pub(crate) variable_scale: DVector<f64>,
    pub(crate) constraint_scale: DVector<f64>,
    pub(crate) objective_scale: f64,
    pub(crate) initial: DVector<f64>,
}

impl<'a, M> Nlp<'a, M> {
    #[must_use]
    pub fn problem(&self) -> &'a Problem<M> {
        self.problem
    }

    #[must_use]
    pub fn model(&self) -> &'a M {
        self.problem.model()
    }

    #[must_use]
    pub fn workspace(&self) -> &'a Workspace {
        self.workspace
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Meshes in phase order (0-based).
    #[must_use]
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    #[must_use]
    pub fn variable_bounds(&self) -> (&DVector<f64>, &DVector<f64>) {
        (&self.variable_lower, &self.variable_upper)
    }

    #[must_use]
    pub fn constraint_bounds(&self) -> (&DVector<f64>, &DVector<f64>) {
        (&self.constraint_lower, &self.constraint_upper)
    }

    #[must_use]
    pub fn variable_scale(&self) -> &DVector<f64> {
        &self.variable_scale
    }

    #[must_use]
    pub fn constraint_scale(&self) -> &DVector<f64> {
        &self.constraint_scale
    }

    #[must_use]
    pub fn objective_scale(&self) -> f64 {
        self.objective_scale
    }

    #[must_use]
    pub fn initial(&self) -> &DVector<f64> {
        &self.initial
    }
}

/// A transcription and NLP service.
///
/// The orchestrator asks for a mesh per phase, lays the problem out on those
/// meshes, and hands the flat problem to [`Transcription::solve`].
pub trait Transcription {
    type Error: StdError + Send + Sync + 'static;

    /// Places a mesh for a requested node count.
    ///
    /// The returned mesh may hold a different number of nodes than requested
    /// when the scheme imposes its own constraints (e.g. an odd count).
    ///
    /// # Errors
    ///
    /// Returns an error if no mesh can be built for the request.
    fn mesh(&self, algorithm: &Algorithm, nodes: usize) -> Result<Mesh, Self::Error>;

    /// Solves the flattened problem.
    ///
    /// Convergence failures are reported through [`RawSolution::status`].
    ///
    /// # Errors
    ///
    /// Returns an error only when the service cannot run at all.
    fn solve<M: OptimalControl>(
        &self,
        nlp: &Nlp<'_, M>,
        algorithm: &Algorithm,
    ) -> Result<RawSolution, Self::Error>;
}
