use std::cell::{Cell, RefCell};
use std::convert::Infallible;

use approx::assert_relative_eq;

use super::*;

use crate::{
    Boundary, ContractError, Endpoints, Field, Scalar, Setup, ValidationError, linspace,
};

/// `x' = u` with events on both ends of the single state.
#[derive(Default)]
struct Integrator {
    poison: bool,
    linkage_calls: Cell<Option<usize>>,
}

impl OptimalControl for Integrator {
    fn dae<S: Scalar>(&self, derivatives: &mut [S], _path: &mut [S], node: &Node<'_, S>, _: &Workspace) {
        derivatives[0] = if self.poison {
            S::constant(f64::NAN)
        } else {
            node.controls[0]
        };
    }

    fn endpoint_cost<S: Scalar>(&self, boundary: &Boundary<'_, S>, _: &Workspace) -> S {
        boundary.end_time
    }

    fn events<S: Scalar>(&self, events: &mut [S], boundary: &Boundary<'_, S>, _: &Workspace) {
        events[0] = boundary.initial_states[0];
        events[1] = boundary.final_states[0];
    }

    fn linkages<S: Scalar>(&self, linkages: &mut [S], _: &Endpoints<'_, S>, _: &Workspace) {
        self.linkage_calls.set(Some(linkages.len()));
    }
}

fn problem(model: Integrator, nodes: Vec<usize>) -> Problem<Integrator> {
    let mut setup = Setup::new("integrator", 1, 0).expect("one phase");
    let phase = setup.phase_mut(1).expect("phase 1");
    phase.dimensions = Dimensions {
        states: 1,
        controls: 1,
        parameters: 0,
        events: 2,
        path: 0,
    };
    phase.nodes = nodes;

    let mut problem = setup.build(model).expect("nodes set");
    let phase = problem.phase_mut(1).expect("phase 1");
    phase
        .bounds_mut()
        .set_states(&[-10.0], &[10.0])
        .and_then(|b| b.set_controls(&[-1.0], &[1.0]))
        .and_then(|b| b.set_events(&[0.0, 1.0], &[0.0, 1.0]))
        .expect("lengths match");
    phase.bounds_mut().set_start_time(0.0, 0.0).set_end_time(1.0, 1.0);
    phase
        .guess_mut()
        .set_trajectory(
            DMatrix::from_row_slice(1, 3, &[0.0, 0.5, 1.0]),
            DMatrix::from_element(1, 3, 1.0),
            linspace(0.0, 1.0, 3),
        )
        .expect("shapes match");
    problem
}

/// What the recorder saw of one flattened problem.
struct Seen {
    nodes: usize,
    constraint_lower: DVector<f64>,
    constraint_upper: DVector<f64>,
    initial: DVector<f64>,
}

/// A service that returns its initial point and records every call.
struct Recorder {
    status: NlpStatus,
    multiplier: f64,
    meshes: Cell<usize>,
    seen: RefCell<Vec<Seen>>,
}

impl Recorder {
    fn new(status: NlpStatus) -> Self {
        Self {
            status,
            multiplier: 0.0,
            meshes: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn solves(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl Transcription for Recorder {
    type Error = Infallible;

    fn mesh(&self, _: &Algorithm, nodes: usize) -> Result<Mesh, Infallible> {
        self.meshes.set(self.meshes.get() + 1);
        let last = nodes - 1;
        let costate_map = DMatrix::from_fn(nodes, last, |k, d| {
            if k == 0 || k == last {
                if d + 1 == k.max(1) { 1.0 } else { 0.0 }
            } else if d + 1 == k || d == k {
                0.5
            } else {
                0.0
            }
        });
        Ok(Mesh {
            points: linspace(0.0, 1.0, nodes),
            defects: last,
            costate_map,
        })
    }

    fn solve<M: OptimalControl>(&self, nlp: &Nlp<'_, M>, _: &Algorithm) -> Result<RawSolution, Infallible> {
        let (lower, upper) = nlp.constraint_bounds();
        self.seen.borrow_mut().push(Seen {
            nodes: nlp.layout().phases()[0].nodes(),
            constraint_lower: lower.clone(),
            constraint_upper: upper.clone(),
            initial: nlp.initial().clone(),
        });
        Ok(RawSolution {
            primal: nlp.initial().clone(),
            multipliers: DVector::from_element(nlp.layout().nconstraints(), self.multiplier),
            status: self.status,
            iterations: 3,
            objective: 1.5,
        })
    }
}

#[test]
fn validation_runs_before_the_service() {
    let mut problem = problem(Integrator::default(), vec![5]);
    problem
        .phase_mut(1)
        .and_then(|p| p.bounds_mut().set_states(&[2.0], &[1.0]))
        .expect("lengths match");
    let recorder = Recorder::new(NlpStatus::Converged);

    let err = solve(&problem, &Algorithm::default(), &recorder).expect_err("inverted bounds");
    assert!(matches!(
        err,
        SolveError::Validation(ValidationError::BoundOrder {
            phase: 1,
            field: Field::States,
            ..
        })
    ));
    assert_eq!(recorder.meshes.get(), 0);
    assert_eq!(recorder.solves(), 0);
}

#[test]
fn invalid_algorithm_is_rejected() {
    let problem = problem(Integrator::default(), vec![5]);
    let algorithm = Algorithm {
        nlp_tolerance: 0.0,
        ..Algorithm::default()
    };
    let recorder = Recorder::new(NlpStatus::Converged);
    assert!(matches!(
        solve(&problem, &algorithm, &recorder),
        Err(SolveError::Config(_))
    ));
    assert_eq!(recorder.meshes.get(), 0);
}

#[test]
fn contract_violation_stops_before_the_service() {
    let model = Integrator {
        poison: true,
        ..Integrator::default()
    };
    let problem = problem(model, vec![5]);
    let recorder = Recorder::new(NlpStatus::Converged);

    let err = solve(&problem, &Algorithm::default(), &recorder).expect_err("NaN derivative");
    assert!(matches!(
        err,
        SolveError::Contract(ContractError::NonFinite {
            phase: 1,
            callback: "dae derivatives",
            index: 0,
        })
    ));
    assert_eq!(recorder.meshes.get(), 0);
}

#[test]
fn single_phase_without_linkages_is_accepted() {
    let problem = problem(Integrator::default(), vec![5]);
    let recorder = Recorder::new(NlpStatus::Converged);

    let solution = solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");
    assert_eq!(problem.model().linkage_calls.get(), Some(0));
    assert!(!solution.error_flag());
    assert_eq!(solution.linkage_multipliers().len(), 0);
    assert_relative_eq!(solution.objective(), 1.5);
}

#[test]
fn event_equalities_reach_the_nlp_as_equalities() {
    let problem = problem(Integrator::default(), vec![5]);
    let recorder = Recorder::new(NlpStatus::Converged);
    solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    let seen = recorder.seen.borrow();
    // Four defect rows, then the two event rows; no duration row.
    assert_eq!(seen[0].constraint_lower.len(), 6);
    assert_eq!(seen[0].constraint_lower[4], seen[0].constraint_upper[4]);
    assert_eq!(seen[0].constraint_lower[5], seen[0].constraint_upper[5]);
    assert_relative_eq!(seen[0].constraint_upper[5], 1.0);
}

#[test]
fn duration_row_added_when_time_bounds_overlap() {
    let mut problem = problem(Integrator::default(), vec![5]);
    problem
        .phase_mut(1)
        .expect("phase 1")
        .bounds_mut()
        .set_start_time(0.0, 1.0)
        .set_end_time(0.5, 2.0);
    let recorder = Recorder::new(NlpStatus::Converged);
    solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    let seen = recorder.seen.borrow();
    assert_eq!(seen[0].constraint_lower.len(), 7);
    assert_relative_eq!(seen[0].constraint_lower[6], 0.0);
    assert!(seen[0].constraint_upper[6].is_infinite());
}

#[test]
fn initial_point_interpolates_the_guess() {
    let problem = problem(Integrator::default(), vec![5]);
    let recorder = Recorder::new(NlpStatus::Converged);
    solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    let seen = recorder.seen.borrow();
    let x = &seen[0].initial;
    // States node-major, then controls, then t0 and tf.
    assert_relative_eq!(x[1], 0.25);
    assert_relative_eq!(x[3], 0.75);
    assert_relative_eq!(x[7], 1.0);
    assert_relative_eq!(x[10], 0.0);
    assert_relative_eq!(x[11], 1.0);
}

#[test]
fn manual_refinement_walks_node_lists() {
    let problem = problem(Integrator::default(), vec![5, 9, 17]);
    let recorder = Recorder::new(NlpStatus::Converged);
    let solution = solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    let nodes: Vec<usize> = recorder.seen.borrow().iter().map(|s| s.nodes).collect();
    assert_eq!(nodes, vec![5, 9, 17]);
    assert_eq!(solution.mesh_history().len(), 3);
    assert_eq!(solution.mesh_history()[2].nodes, vec![17]);
    assert_eq!(solution.iterations(), 9);
    assert_eq!(solution.time(1).map(|t| t.len()), Ok(17));

    // Warm start keeps the previous (linear) state trajectory.
    let seen = recorder.seen.borrow();
    assert_relative_eq!(seen[1].initial[2], 0.25);
}

#[test]
fn failed_solve_stops_refinement() {
    let problem = problem(Integrator::default(), vec![5, 9, 17]);
    let recorder = Recorder::new(NlpStatus::MaxIterations);
    let solution = solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    assert_eq!(recorder.solves(), 1);
    assert!(solution.error_flag());
    assert_eq!(solution.states(1).map(|s| s.shape()), Ok((1, 0)));
    assert_eq!(solution.last_iterate(1).map(|p| p.states.ncols()), Ok(5));
}

#[test]
fn costates_follow_defect_multipliers() {
    let problem = problem(Integrator::default(), vec![5]);
    let recorder = Recorder {
        multiplier: 2.0,
        ..Recorder::new(NlpStatus::Converged)
    };
    let solution = solve(&problem, &Algorithm::default(), &recorder).expect("valid problem");

    let costates = solution.costates(1).expect("phase 1");
    let hamiltonian = solution.hamiltonian(1).expect("phase 1");
    for k in 0..5 {
        assert_relative_eq!(costates[(0, k)], -2.0);
        // H = L + λ f with L = 0 and f = u = 1.
        assert_relative_eq!(hamiltonian[k], -2.0);
    }
    assert_relative_eq!(solution.event_multipliers(1).expect("phase 1")[1], 2.0);
}

#[test]
fn automatic_refinement_stops_within_tolerance() {
    let problem = problem(Integrator::default(), vec![5]);
    let algorithm = Algorithm {
        mesh_refinement: MeshRefinement::Automatic,
        ..Algorithm::default()
    };
    let recorder = Recorder::new(NlpStatus::Converged);
    let solution = solve(&problem, &algorithm, &recorder).expect("valid problem");

    // The guess integrates x' = u exactly, so the first mesh is accepted.
    assert_eq!(solution.mesh_history().len(), 1);
    assert_relative_eq!(solution.mesh_history()[0].ode_error, 0.0, epsilon = 1e-12);
}

#[test]
fn automatic_refinement_doubles_intervals() {
    let mut problem = problem(Integrator::default(), vec![5]);
    problem
        .phase_mut(1)
        .and_then(|p| {
            p.guess_mut().set_trajectory(
                DMatrix::zeros(1, 2),
                DMatrix::from_element(1, 2, 1.0),
                linspace(0.0, 1.0, 2),
            )
        })
        .expect("shapes match");
    let algorithm = Algorithm {
        mesh_refinement: MeshRefinement::Automatic,
        mesh_refinement_max_iterations: 3,
        ..Algorithm::default()
    };
    let recorder = Recorder::new(NlpStatus::Converged);
    let solution = solve(&problem, &algorithm, &recorder).expect("valid problem");

    let nodes: Vec<usize> = recorder.seen.borrow().iter().map(|s| s.nodes).collect();
    assert_eq!(nodes, vec![5, 9, 17]);
    assert!(solution.mesh_history()[2].ode_error > algorithm.ode_tolerance);
}
