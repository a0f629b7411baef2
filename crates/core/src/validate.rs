use nalgebra::{DMatrix, DVector};

use crate::{
    Boundary, ContractError, Endpoints, Field, Node, OptimalControl, Phase, PhaseTrajectory,
    Problem, ValidationError, Workspace,
};

/// Checks the structure of a problem before any numerical work.
pub(crate) fn problem<M>(problem: &Problem<M>) -> Result<(), ValidationError> {
    for phase in problem.phases() {
        nodes(phase)?;
        bounds(phase)?;
        scale(phase)?;
        guess(phase)?;
    }

    for (index, (&lower, &upper)) in problem
        .linkage_lower()
        .iter()
        .zip(problem.linkage_upper())
        .enumerate()
    {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(ValidationError::LinkageOrder { index, lower, upper });
        }
    }

    let objective = problem.objective_scale();
    if !objective.is_finite() || objective <= 0.0 {
        return Err(ValidationError::ObjectiveScale { value: objective });
    }
    Ok(())
}

fn nodes(phase: &Phase) -> Result<(), ValidationError> {
    match phase.nodes().iter().find(|&&n| n < 2) {
        Some(&nodes) => Err(ValidationError::TooFewNodes {
            phase: phase.index(),
            nodes,
        }),
        None => Ok(()),
    }
}

const VECTOR_FIELDS: [Field; 5] = [
    Field::States,
    Field::Controls,
    Field::Parameters,
    Field::Events,
    Field::Path,
];

fn expected_len(phase: &Phase, field: Field) -> usize {
    let dims = phase.dimensions();
    match field {
        Field::States | Field::Defects => dims.states,
        Field::Controls => dims.controls,
        Field::Parameters => dims.parameters,
        Field::Events => dims.events,
        Field::Path => dims.path,
        _ => 1,
    }
}

fn bounds(phase: &Phase) -> Result<(), ValidationError> {
    let p = phase.index();
    let (lower, upper) = (phase.bounds().lower(), phase.bounds().upper());

    let start = [lower.start_time, upper.start_time];
    let end = [lower.end_time, upper.end_time];
    let mut pairs: Vec<(Field, &[f64], &[f64])> = Vec::with_capacity(VECTOR_FIELDS.len() + 2);
    for field in VECTOR_FIELDS {
        let expected = expected_len(phase, field);
        let (Some(l), Some(u)) = (lower.vector(field), upper.vector(field)) else {
            continue;
        };
        for actual in [l.len(), u.len()] {
            if actual != expected {
                return Err(ValidationError::BoundLength {
                    phase: p,
                    field,
                    expected,
                    actual,
                });
            }
        }
        pairs.push((field, l.as_slice(), u.as_slice()));
    }
    pairs.push((Field::StartTime, &start[..1], &start[1..]));
    pairs.push((Field::EndTime, &end[..1], &end[1..]));

    for (field, l, u) in pairs {
        for (index, (&lower, &upper)) in l.iter().zip(u).enumerate() {
            if lower.is_nan() || upper.is_nan() {
                return Err(ValidationError::BoundNan {
                    phase: p,
                    field,
                    index,
                });
            }
            if lower > upper {
                return Err(ValidationError::BoundOrder {
                    phase: p,
                    field,
                    index,
                    lower,
                    upper,
                });
            }
        }
    }
    Ok(())
}

fn scale(phase: &Phase) -> Result<(), ValidationError> {
    let p = phase.index();
    let scale = phase.scale();
    let time = DVector::from_element(1, scale.time);
    let vectors = [
        (Field::States, &scale.states),
        (Field::Controls, &scale.controls),
        (Field::Parameters, &scale.parameters),
        (Field::Events, &scale.events),
        (Field::Path, &scale.path),
        (Field::Defects, &scale.defects),
        (Field::Time, &time),
    ];

    for (field, factors) in vectors {
        let expected = expected_len(phase, field);
        if factors.len() != expected {
            return Err(ValidationError::ScaleLength {
                phase: p,
                field,
                expected,
                actual: factors.len(),
            });
        }
        if let Some((index, &value)) = factors
            .iter()
            .enumerate()
            .find(|&(_, v)| !v.is_finite() || *v <= 0.0)
        {
            return Err(ValidationError::ScaleValue {
                phase: p,
                field,
                index,
                value,
            });
        }
    }
    Ok(())
}

fn guess(phase: &Phase) -> Result<(), ValidationError> {
    let p = phase.index();
    let guess = phase.guess();
    let dims = phase.dimensions();

    if guess.parameters().len() != dims.parameters {
        return Err(ValidationError::GuessRows {
            phase: p,
            field: Field::Parameters,
            expected: dims.parameters,
            actual: guess.parameters().len(),
        });
    }
    if guess.parameters().iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::GuessNonFinite {
            phase: p,
            field: Field::Parameters,
        });
    }
    if guess.is_empty() {
        return Ok(());
    }

    let points = guess.time().len();
    for (field, matrix, rows) in [
        (Field::States, guess.states(), dims.states),
        (Field::Controls, guess.controls(), dims.controls),
    ] {
        if matrix.nrows() != rows {
            return Err(ValidationError::GuessRows {
                phase: p,
                field,
                expected: rows,
                actual: matrix.nrows(),
            });
        }
        if matrix.ncols() != points {
            return Err(ValidationError::GuessColumns {
                phase: p,
                field,
                expected: points,
                actual: matrix.ncols(),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::GuessNonFinite { phase: p, field });
        }
    }

    if guess.time().iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::GuessNonFinite {
            phase: p,
            field: Field::Time,
        });
    }
    if let Some(index) = guess
        .time()
        .as_slice()
        .windows(2)
        .position(|w| w[1] < w[0])
    {
        return Err(ValidationError::GuessTimeOrder {
            phase: p,
            index: index + 1,
        });
    }
    Ok(())
}

/// A fault found in one checked output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Unwritten(usize),
    NonFinite(usize),
}

/// Runs `fill` twice over buffers prefilled with different sentinels.
///
/// An entry that still holds each sentinel was never written; any other
/// non-finite entry was written with a non-finite value.
fn check_outputs(len: usize, mut fill: impl FnMut(&mut [f64])) -> Option<Fault> {
    let mut first = vec![f64::NAN; len];
    fill(&mut first);
    let mut second = vec![f64::INFINITY; len];
    fill(&mut second);

    first
        .iter()
        .zip(&second)
        .enumerate()
        .find_map(|(index, (&a, &b))| {
            if a.is_nan() && b == f64::INFINITY {
                Some(Fault::Unwritten(index))
            } else if !a.is_finite() || !b.is_finite() {
                Some(Fault::NonFinite(index))
            } else {
                None
            }
        })
}

fn phase_fault(phase: usize, callback: &'static str, fault: Fault) -> ContractError {
    match fault {
        Fault::Unwritten(index) => ContractError::Unwritten {
            phase,
            callback,
            index,
        },
        Fault::NonFinite(index) => ContractError::NonFinite {
            phase,
            callback,
            index,
        },
    }
}

fn scalar_fault(phase: usize, callback: &'static str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ContractError::NonFinite {
            phase,
            callback,
            index: 0,
        })
    }
}

/// Evaluates every callback once at the start point and checks its outputs.
pub(crate) fn contract<M: OptimalControl>(
    problem: &Problem<M>,
    starts: &[PhaseTrajectory],
    workspace: &Workspace,
) -> Result<(), ContractError> {
    let model = problem.model();
    let mut initial = Vec::with_capacity(starts.len());
    let mut last = Vec::with_capacity(starts.len());
    for traj in starts {
        let n = traj.states.ncols();
        initial.push(column(&traj.states, 0));
        last.push(column(&traj.states, n.saturating_sub(1)));
    }

    for ((phase, traj), (x0, xf)) in problem
        .phases()
        .iter()
        .zip(starts)
        .zip(initial.iter().zip(&last))
    {
        let p = phase.index();
        let dims = phase.dimensions();
        let controls = column(&traj.controls, 0);
        let node = Node {
            states: x0,
            controls: &controls,
            parameters: traj.parameters.as_slice(),
            time: traj.start_time,
            phase: p,
        };

        let fault = check_outputs(dims.states + dims.path, |out| {
            let (derivatives, path) = out.split_at_mut(dims.states);
            model.dae(derivatives, path, &node, workspace);
        });
        match fault {
            Some(Fault::Unwritten(i)) if i >= dims.states => {
                return Err(phase_fault(p, "dae path", Fault::Unwritten(i - dims.states)));
            }
            Some(Fault::NonFinite(i)) if i >= dims.states => {
                return Err(phase_fault(p, "dae path", Fault::NonFinite(i - dims.states)));
            }
            Some(fault) => return Err(phase_fault(p, "dae derivatives", fault)),
            None => {}
        }
        scalar_fault(p, "integrand_cost", model.integrand_cost(&node, workspace))?;

        let boundary = Boundary {
            initial_states: x0,
            final_states: xf,
            parameters: traj.parameters.as_slice(),
            start_time: traj.start_time,
            end_time: traj.end_time,
            phase: p,
        };
        scalar_fault(p, "endpoint_cost", model.endpoint_cost(&boundary, workspace))?;
        if let Some(fault) = check_outputs(dims.events, |out| model.events(out, &boundary, workspace)) {
            return Err(phase_fault(p, "events", fault));
        }
    }

    let boundaries: Vec<Boundary<'_, f64>> = problem
        .phases()
        .iter()
        .zip(starts)
        .zip(initial.iter().zip(&last))
        .map(|((phase, traj), (x0, xf))| Boundary {
            initial_states: x0,
            final_states: xf,
            parameters: traj.parameters.as_slice(),
            start_time: traj.start_time,
            end_time: traj.end_time,
            phase: phase.index(),
        })
        .collect();
    let endpoints = Endpoints::new(&boundaries);
    match check_outputs(problem.nlinkages(), |out| model.linkages(out, &endpoints, workspace)) {
        Some(Fault::Unwritten(index)) => Err(ContractError::LinkageUnwritten { index }),
        Some(Fault::NonFinite(index)) => Err(ContractError::LinkageNonFinite { index }),
        None => Ok(()),
    }
}

fn column(matrix: &DMatrix<f64>, k: usize) -> Vec<f64> {
    if k < matrix.ncols() {
        matrix.column(k).iter().copied().collect()
    } else {
        vec![0.0; matrix.nrows()]
    }
}
