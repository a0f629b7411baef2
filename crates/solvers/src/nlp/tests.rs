use std::cell::Cell;

use bolza_core::{
    Collocation, Mesh, NlpStatus, Problem, RawSolution, Setup, Transcription, linspace,
};

use super::*;

/// Two coupled states with every callback in use.
struct Testbed;

impl OptimalControl for Testbed {
    fn dae<S: Scalar>(&self, derivatives: &mut [S], path: &mut [S], node: &Node<'_, S>, _: &Workspace) {
        let (x, u) = (node.states, node.controls[0]);
        derivatives[0] = x[1] * node.parameters[0];
        derivatives[1] = u * x[0].cos() + node.time;
        path[0] = u * u + x[1];
    }

    fn integrand_cost<S: Scalar>(&self, node: &Node<'_, S>, _: &Workspace) -> S {
        node.states[0] * node.controls[0] + node.time * node.time * node.parameters[0]
    }

    fn endpoint_cost<S: Scalar>(&self, boundary: &Boundary<'_, S>, _: &Workspace) -> S {
        boundary.final_states[0] * boundary.end_time + boundary.parameters[0]
    }

    fn events<S: Scalar>(&self, events: &mut [S], boundary: &Boundary<'_, S>, _: &Workspace) {
        events[0] = boundary.initial_states[0] * boundary.initial_states[1];
        events[1] = boundary.final_states[1] + boundary.start_time;
    }

    fn linkages<S: Scalar>(&self, linkages: &mut [S], endpoints: &Endpoints<'_, S>, _: &Workspace) {
        if let (Some(first), Some(second)) = (endpoints.get(1), endpoints.get(2)) {
            linkages[0] = first.final_states[0] - second.initial_states[0]
                + first.end_time * second.start_time;
        }
    }
}

fn testbed() -> Problem<Testbed> {
    let mut setup = Setup::new("testbed", 2, 1).expect("two phases");
    for p in 1..=2 {
        let phase = setup.phase_mut(p).expect("phase exists");
        phase.dimensions = Dimensions {
            states: 2,
            controls: 1,
            parameters: 1,
            events: 2,
            path: 1,
        };
        phase.nodes = vec![5];
    }

    let mut problem = setup.build(Testbed).expect("nodes set");
    // (start bounds, end bounds, guess span); the second phase needs a duration row.
    let windows = [
        ((0.0, 0.5), (0.5, 2.0), (0.2, 1.3)),
        ((0.0, 3.0), (1.0, 4.0), (1.3, 2.5)),
    ];
    for (p, (start, end, span)) in windows.into_iter().enumerate() {
        let phase = problem.phase_mut(p + 1).expect("phase exists");
        phase
            .bounds_mut()
            .set_states(&[-5.0, -5.0], &[5.0, 5.0])
            .and_then(|b| b.set_controls(&[-2.0], &[2.0]))
            .and_then(|b| b.set_parameters(&[0.5], &[2.0]))
            .and_then(|b| b.set_events(&[-10.0, -10.0], &[10.0, 10.0]))
            .and_then(|b| b.set_path(&[-10.0], &[10.0]))
            .expect("lengths match");
        phase
            .bounds_mut()
            .set_start_time(start.0, start.1)
            .set_end_time(end.0, end.1);
        phase
            .guess_mut()
            .set_trajectory(
                DMatrix::from_row_slice(2, 3, &[0.1, 0.4, 0.3, -0.2, 0.5, 0.9]),
                DMatrix::from_row_slice(1, 3, &[0.3, -0.1, 0.7]),
                linspace(span.0, span.1, 3),
            )
            .and_then(|g| g.set_parameters(&[1.2]))
            .expect("shapes match");
    }
    problem.set_linkage_bounds(&[0.0], &[0.0]).expect("one linkage");
    problem
}

/// `x' = u` on `[0, 2]` with a unit running cost.
struct Ramp;

impl OptimalControl for Ramp {
    fn dae<S: Scalar>(&self, derivatives: &mut [S], _: &mut [S], node: &Node<'_, S>, _: &Workspace) {
        derivatives[0] = node.controls[0];
    }

    fn integrand_cost<S: Scalar>(&self, _: &Node<'_, S>, _: &Workspace) -> S {
        S::one()
    }
}

fn ramp(nodes: usize) -> Problem<Ramp> {
    let mut setup = Setup::new("ramp", 1, 0).expect("one phase");
    let phase = setup.phase_mut(1).expect("phase exists");
    phase.dimensions = Dimensions {
        states: 1,
        controls: 1,
        ..Dimensions::default()
    };
    phase.nodes = vec![nodes];

    let mut problem = setup.build(Ramp).expect("nodes set");
    let phase = problem.phase_mut(1).expect("phase exists");
    phase
        .bounds_mut()
        .set_states(&[0.0], &[5.0])
        .and_then(|b| b.set_controls(&[0.0], &[2.0]))
        .expect("lengths match");
    phase.bounds_mut().set_start_time(0.0, 0.0).set_end_time(2.0, 2.0);
    phase
        .guess_mut()
        .set_trajectory(
            DMatrix::from_row_slice(1, 3, &[0.0, 1.0, 2.0]),
            DMatrix::from_element(1, 3, 1.0),
            linspace(0.0, 2.0, 3),
        )
        .expect("shapes match");
    problem
}

/// A service that inspects the problem at its initial point instead of solving it.
#[derive(Default)]
struct Inspector {
    /// Largest relative gap between assembled and differenced derivatives.
    derivative_error: Cell<f64>,
    /// Largest physical defect.
    defect: Cell<f64>,
    objective: Cell<f64>,
    round_trip: Cell<bool>,
}

/// Compares the assembled gradient and Jacobian against central differences
/// of the assembled values.
fn derivative_error<P: NlpProblem<Error = Infallible>>(problem: &P, x: &DVector<f64>) -> f64 {
    let derivatives = problem.differentiate(x).expect("infallible");
    let mut worst: f64 = 0.0;
    let mut shifted = x.clone();
    for j in 0..x.len() {
        let h = 1e-6 * x[j].abs().max(1.0);
        shifted[j] = x[j] + h;
        let up = problem.evaluate(&shifted).expect("infallible");
        shifted[j] = x[j] - h;
        let down = problem.evaluate(&shifted).expect("infallible");
        shifted[j] = x[j];

        let gradient = (up.objective - down.objective) / (2.0 * h);
        let analytic = derivatives.gradient[j];
        worst = worst.max((gradient - analytic).abs() / (1.0 + analytic.abs()));
        for i in 0..problem.nconstraints() {
            let column = (up.constraints[i] - down.constraints[i]) / (2.0 * h);
            let analytic = derivatives.jacobian[(i, j)];
            worst = worst.max((column - analytic).abs() / (1.0 + analytic.abs()));
        }
    }
    worst
}

impl Transcription for Inspector {
    type Error = collocation::Error;

    fn mesh(&self, algorithm: &Algorithm, nodes: usize) -> Result<Mesh, Self::Error> {
        Ok(Scheme::new(algorithm.collocation, nodes)?.mesh())
    }

    fn solve<M: OptimalControl>(
        &self,
        nlp: &Nlp<'_, M>,
        algorithm: &Algorithm,
    ) -> Result<RawSolution, Self::Error> {
        let problem = CollocationNlp::new(nlp, algorithm)?;
        let x = problem.initial_point();
        self.derivative_error.set(derivative_error(&problem, &x));

        let (values, _) = problem.assemble(nlp.initial(), false);
        let pl = &nlp.layout().phases()[0];
        let defect = (0..pl.defect_count())
            .flat_map(|d| (0..pl.dimensions().states).map(move |i| pl.defect(d, i)))
            .map(|row| values.constraints[row].abs())
            .fold(0.0, f64::max);
        self.defect.set(defect);
        self.objective.set(values.objective);

        let m = nlp.layout().nconstraints();
        let unit = problem.multipliers(&DVector::from_element(m, 1.0));
        let scales = nlp.constraint_scale() / nlp.objective_scale();
        self.round_trip.set(
            (problem.physical(&x) - nlp.initial()).amax() < 1e-12
                && (unit - scales).amax() < 1e-12,
        );

        Ok(RawSolution {
            primal: nlp.initial().clone(),
            multipliers: DVector::zeros(m),
            status: NlpStatus::Converged,
            iterations: 0,
            objective: values.objective,
        })
    }
}

const ALL: [Collocation; 4] = [
    Collocation::Legendre,
    Collocation::Chebyshev,
    Collocation::Trapezoidal,
    Collocation::HermiteSimpson,
];

#[test]
fn assembled_derivatives_match_differences() {
    let problem = testbed();
    for collocation in ALL {
        let algorithm = Algorithm {
            collocation,
            ..Algorithm::default()
        };
        let inspector = Inspector::default();
        bolza_core::solve(&problem, &algorithm, &inspector).expect("inspection runs");

        let error = inspector.derivative_error.get();
        assert!(error < 1e-6, "{collocation:?}: {error}");
        assert!(inspector.round_trip.get());
    }
}

#[test]
fn numerical_derivatives_agree() {
    let problem = testbed();
    let algorithm = Algorithm {
        collocation: Collocation::HermiteSimpson,
        derivatives: DerivativeMode::Numerical,
        ..Algorithm::default()
    };
    let inspector = Inspector::default();
    bolza_core::solve(&problem, &algorithm, &inspector).expect("inspection runs");

    let error = inspector.derivative_error.get();
    assert!(error < 1e-5, "{error}");
}

#[test]
fn exact_trajectory_has_no_defects() {
    for collocation in ALL {
        let algorithm = Algorithm {
            collocation,
            ..Algorithm::default()
        };
        let inspector = Inspector::default();
        bolza_core::solve(&ramp(7), &algorithm, &inspector).expect("inspection runs");

        assert!(inspector.defect.get() < 1e-12, "{collocation:?}: {}", inspector.defect.get());
        // Unit running cost integrates to the phase duration.
        assert!((inspector.objective.get() - 2.0).abs() < 1e-12, "{collocation:?}");
        assert!(inspector.derivative_error.get() < 1e-6);
    }
}
