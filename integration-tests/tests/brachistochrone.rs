use approx::assert_relative_eq;
use bolza_core::{Algorithm, Collocation, HessianMode, NlpStatus, SolutionError};
use integration_tests::brachistochrone::{MINIMUM_TIME, problem};

/// Checks a converged solution against the known optimum and its bounds.
fn check(solution: &bolza_core::Solution) {
    assert!(!solution.error_flag(), "status: {:?}", solution.status());
    assert_eq!(solution.status(), NlpStatus::Converged);

    let tf = solution.objective();
    assert!(0.0 < tf && tf < 10.0);
    assert!((tf - MINIMUM_TIME).abs() < 0.02, "tf = {tf}");

    let time = solution.time(1).expect("phase 1");
    assert_relative_eq!(time[0], 0.0, epsilon = 1e-6);
    assert_relative_eq!(time[time.len() - 1], tf, epsilon = 1e-6);
    assert!(time.iter().zip(time.iter().skip(1)).all(|(a, b)| a <= b));

    let states = solution.states(1).expect("phase 1");
    let last = states.ncols() - 1;
    assert_relative_eq!(states[(0, last)], 2.0, epsilon = 1e-5);
    assert_relative_eq!(states[(1, last)], 2.0, epsilon = 1e-5);
    assert!(states.iter().all(|&s| (-1e-6..=20.0 + 1e-6).contains(&s)));
    assert_eq!(solution.costates(1).expect("phase 1").shape(), states.shape());

    // Minimum time with autonomous dynamics: H = -1 along the whole arc.
    let hamiltonian = solution.hamiltonian(1).expect("phase 1");
    assert_eq!(hamiltonian.len(), states.ncols());
    assert_relative_eq!(hamiltonian.mean(), -1.0, epsilon = 0.02);
    assert!(hamiltonian.iter().all(|&h| (h + 1.0).abs() < 0.05), "{hamiltonian}");
}

#[test]
fn legendre_with_quasi_newton() {
    let problem = problem(vec![40]).expect("valid setup");
    let solution = bolza_solvers::solve(&problem, &Algorithm::default()).expect("solve runs");

    check(&solution);
    assert_eq!(solution.states(1).expect("phase 1").ncols(), 40);
    assert_eq!(solution.mesh_history().len(), 1);
}

#[test]
fn trapezoidal_with_exact_hessian() {
    let problem = problem(vec![40]).expect("valid setup");
    let algorithm = Algorithm {
        collocation: Collocation::Trapezoidal,
        hessian: HessianMode::Exact,
        ..Algorithm::default()
    };
    let solution = bolza_solvers::solve(&problem, &algorithm).expect("solve runs");

    check(&solution);
}

#[test]
fn phase_indices_are_checked() {
    let problem = problem(vec![20]).expect("valid setup");
    let solution = bolza_solvers::solve(&problem, &Algorithm::default()).expect("solve runs");

    assert!(matches!(
        solution.states(2),
        Err(SolutionError::PhaseOutOfRange { phase: 2, nphases: 1 })
    ));
    assert!(matches!(
        solution.time(0),
        Err(SolutionError::PhaseOutOfRange { phase: 0, .. })
    ));
}
