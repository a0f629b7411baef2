use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::algorithm::ConfigError;

/// Names a group of per-phase quantities in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    States,
    Controls,
    Parameters,
    Events,
    Path,
    Defects,
    StartTime,
    EndTime,
    Time,
    Nodes,
    Linkages,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::States => "states",
            Self::Controls => "controls",
            Self::Parameters => "parameters",
            Self::Events => "events",
            Self::Path => "path",
            Self::Defects => "defects",
            Self::StartTime => "start time",
            Self::EndTime => "end time",
            Self::Time => "time",
            Self::Nodes => "nodes",
            Self::Linkages => "linkages",
        };
        f.write_str(name)
    }
}

/// Errors raised while building a problem.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("a problem needs at least one phase")]
    NoPhases,

    #[error("phase {phase} is out of range (problem has {nphases} phases)")]
    PhaseOutOfRange { phase: usize, nphases: usize },

    #[error("phase {phase}: node list is empty")]
    NoNodes { phase: usize },

    #[error("phase {phase}: {field} expects {expected} values, got {actual}")]
    Length {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("phase {phase}: guess {field} has {actual} columns but {expected} time points")]
    GuessColumns {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("linkages expect {expected} values, got {actual}")]
    LinkageLength { expected: usize, actual: usize },
}

/// Structural errors detected before any numerical work begins.
///
/// Phase indices are 1-based, matching the problem setup API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("phase {phase}: mesh with {nodes} nodes is too coarse (at least 2 required)")]
    TooFewNodes { phase: usize, nodes: usize },

    #[error("phase {phase}: {field} bounds hold {actual} values, expected {expected}")]
    BoundLength {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("phase {phase}: {field}[{index}] has lower bound {lower} above upper bound {upper}")]
    BoundOrder {
        phase: usize,
        field: Field,
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error("phase {phase}: {field}[{index}] bound is NaN")]
    BoundNan {
        phase: usize,
        field: Field,
        index: usize,
    },

    #[error("phase {phase}: {field} scale factors hold {actual} values, expected {expected}")]
    ScaleLength {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("phase {phase}: {field}[{index}] scale factor {value} must be finite and positive")]
    ScaleValue {
        phase: usize,
        field: Field,
        index: usize,
        value: f64,
    },

    #[error("phase {phase}: guess {field} has {actual} rows, expected {expected}")]
    GuessRows {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("phase {phase}: guess {field} has {actual} columns, expected {expected}")]
    GuessColumns {
        phase: usize,
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("phase {phase}: guess time decreases at index {index}")]
    GuessTimeOrder { phase: usize, index: usize },

    #[error("phase {phase}: guess holds a non-finite {field} value")]
    GuessNonFinite { phase: usize, field: Field },

    #[error("linkage[{index}] has lower bound {lower} above upper bound {upper}")]
    LinkageOrder { index: usize, lower: f64, upper: f64 },

    #[error("objective scale {value} must be finite and positive")]
    ObjectiveScale { value: f64 },
}

/// Violations of the callback contract found by probing the callbacks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContractError {
    #[error("phase {phase}: {callback} left output {index} unwritten")]
    Unwritten {
        phase: usize,
        callback: &'static str,
        index: usize,
    },

    #[error("phase {phase}: {callback} produced non-finite output {index}")]
    NonFinite {
        phase: usize,
        callback: &'static str,
        index: usize,
    },

    #[error("linkages left output {index} unwritten")]
    LinkageUnwritten { index: usize },

    #[error("linkages produced non-finite output {index}")]
    LinkageNonFinite { index: usize },
}

/// Errors that abort a solve attempt.
///
/// Convergence problems are not errors; they are reported through
/// [`Solution::error_flag`](crate::Solution::error_flag).
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("invalid algorithm configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid problem: {0}")]
    Validation(#[from] ValidationError),

    #[error("callback contract violated: {0}")]
    Contract(#[from] ContractError),

    #[error("transcription failed: {0}")]
    Transcription(#[source] Box<dyn StdError + Send + Sync>),

    #[error("transcription returned {actual} {what}, expected {expected}")]
    MalformedResult {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl SolveError {
    pub(crate) fn transcription<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Transcription(Box::new(err))
    }
}
