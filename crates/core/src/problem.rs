use nalgebra::DVector;

use crate::{Phase, PhaseSetup, SetupError};

/// Level-1 problem setup: phase count, linkage count and per-phase sizing.
///
/// Call [`Setup::build`] once every phase has its dimensions and node list to
/// obtain a [`Problem`] whose bounds, scaling and guess arrays are sized and
/// ready to be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    name: String,
    phases: Vec<PhaseSetup>,
    nlinkages: usize,
}

impl Setup {
    /// Starts a problem with `nphases` phases and `nlinkages` linkage constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NoPhases`] if `nphases` is zero.
    pub fn new(name: impl Into<String>, nphases: usize, nlinkages: usize) -> Result<Self, SetupError> {
        if nphases == 0 {
            return Err(SetupError::NoPhases);
        }
        Ok(Self {
            name: name.into(),
            phases: vec![PhaseSetup::default(); nphases],
            nlinkages,
        })
    }

    #[must_use]
    pub fn nphases(&self) -> usize {
        self.phases.len()
    }

    /// Returns the declaration of a 1-based phase.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::PhaseOutOfRange`] if `phase` is not in `1..=nphases`.
    pub fn phase_mut(&mut self, phase: usize) -> Result<&mut PhaseSetup, SetupError> {
        let nphases = self.phases.len();
        phase
            .checked_sub(1)
            .and_then(|i| self.phases.get_mut(i))
            .ok_or(SetupError::PhaseOutOfRange { phase, nphases })
    }

    /// Performs level-2 setup and attaches the problem callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NoNodes`] if a phase has an empty node list.
    pub fn build<M>(self, model: M) -> Result<Problem<M>, SetupError> {
        if let Some(i) = self.phases.iter().position(|p| p.nodes.is_empty()) {
            return Err(SetupError::NoNodes { phase: i + 1 });
        }
        let phases = self
            .phases
            .into_iter()
            .enumerate()
            .map(|(i, setup)| Phase::new(i + 1, setup))
            .collect();

        Ok(Problem {
            name: self.name,
            outfilename: None,
            phases,
            linkage_lower: DVector::zeros(self.nlinkages),
            linkage_upper: DVector::zeros(self.nlinkages),
            objective_scale: 1.0,
            model,
        })
    }
}

/// A fully sized multiphase optimal-control problem.
///
/// `M` supplies the callbacks, normally through
/// [`OptimalControl`](crate::OptimalControl).
#[derive(Debug, Clone)]
pub struct Problem<M> {
    name: String,
    outfilename: Option<String>,
    phases: Vec<Phase>,
    linkage_lower: DVector<f64>,
    linkage_upper: DVector<f64>,
    objective_scale: f64,
    model: M,
}

impl Problem<()> {
    /// Level-1 setup, equivalent to [`Setup::new`].
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NoPhases`] if `nphases` is zero.
    pub fn setup(name: impl Into<String>, nphases: usize, nlinkages: usize) -> Result<Setup, SetupError> {
        Setup::new(name, nphases, nlinkages)
    }
}

impl<M> Problem<M> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output label kept for downstream sinks; the solver never writes files.
    #[must_use]
    pub fn outfilename(&self) -> Option<&str> {
        self.outfilename.as_deref()
    }

    pub fn set_outfilename(&mut self, outfilename: impl Into<String>) -> &mut Self {
        self.outfilename = Some(outfilename.into());
        self
    }

    #[must_use]
    pub fn nphases(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn nlinkages(&self) -> usize {
        self.linkage_lower.len()
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Returns a 1-based phase.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::PhaseOutOfRange`] if `phase` is not in `1..=nphases`.
    pub fn phase(&self, phase: usize) -> Result<&Phase, SetupError> {
        let nphases = self.phases.len();
        phase
            .checked_sub(1)
            .and_then(|i| self.phases.get(i))
            .ok_or(SetupError::PhaseOutOfRange { phase, nphases })
    }

    /// Returns a 1-based phase for bound, scale and guess assignment.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::PhaseOutOfRange`] if `phase` is not in `1..=nphases`.
    pub fn phase_mut(&mut self, phase: usize) -> Result<&mut Phase, SetupError> {
        let nphases = self.phases.len();
        phase
            .checked_sub(1)
            .and_then(|i| self.phases.get_mut(i))
            .ok_or(SetupError::PhaseOutOfRange { phase, nphases })
    }

    /// Sets the linkage bounds. Both default to zero, which makes every
    /// linkage an equality.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::LinkageLength`] if either slice does not hold one
    /// value per linkage.
    pub fn set_linkage_bounds(&mut self, lower: &[f64], upper: &[f64]) -> Result<&mut Self, SetupError> {
        let expected = self.nlinkages();
        for actual in [lower.len(), upper.len()] {
            if actual != expected {
                return Err(SetupError::LinkageLength { expected, actual });
            }
        }
        self.linkage_lower = DVector::from_column_slice(lower);
        self.linkage_upper = DVector::from_column_slice(upper);
        Ok(self)
    }

    #[must_use]
    pub fn linkage_lower(&self) -> &DVector<f64> {
        &self.linkage_lower
    }

    #[must_use]
    pub fn linkage_upper(&self) -> &DVector<f64> {
        &self.linkage_upper
    }

    #[must_use]
    pub fn objective_scale(&self) -> f64 {
        self.objective_scale
    }

    /// Sets the objective scale factor used when scaling is manual.
    pub fn set_objective_scale(&mut self, scale: f64) -> &mut Self {
        self.objective_scale = scale;
        self
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }
}
