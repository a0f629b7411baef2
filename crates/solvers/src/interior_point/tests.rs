use std::convert::Infallible;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use super::line_search::Filter;
use super::{
    Action, Config, ConfigError, Derivatives, Error, Event, Hessian, NlpProblem, Status, Values,
    minimize, minimize_unobserved,
};

/// A problem assembled from plain functions.
struct Functions {
    bounds: (Vec<f64>, Vec<f64>),
    constraint_bounds: (Vec<f64>, Vec<f64>),
    start: Vec<f64>,
    objective: fn(&DVector<f64>) -> f64,
    gradient: fn(&DVector<f64>) -> DVector<f64>,
    constraints: fn(&DVector<f64>) -> DVector<f64>,
    jacobian: fn(&DVector<f64>) -> DMatrix<f64>,
}

impl Functions {
    fn unconstrained(
        start: Vec<f64>,
        objective: fn(&DVector<f64>) -> f64,
        gradient: fn(&DVector<f64>) -> DVector<f64>,
    ) -> Self {
        let n = start.len();
        Self {
            bounds: (vec![f64::NEG_INFINITY; n], vec![f64::INFINITY; n]),
            constraint_bounds: (vec![], vec![]),
            start,
            objective,
            gradient,
            constraints: |_| DVector::zeros(0),
            jacobian: |x| DMatrix::zeros(0, x.len()),
        }
    }
}

impl NlpProblem for Functions {
    type Error = Infallible;

    fn nvariables(&self) -> usize {
        self.bounds.0.len()
    }

    fn nconstraints(&self) -> usize {
        self.constraint_bounds.0.len()
    }

    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_vec(self.bounds.0.clone()),
            DVector::from_vec(self.bounds.1.clone()),
        )
    }

    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_vec(self.constraint_bounds.0.clone()),
            DVector::from_vec(self.constraint_bounds.1.clone()),
        )
    }

    fn initial_point(&self) -> DVector<f64> {
        DVector::from_vec(self.start.clone())
    }

    fn evaluate(&self, x: &DVector<f64>) -> Result<Values, Infallible> {
        Ok(Values {
            objective: (self.objective)(x),
            constraints: (self.constraints)(x),
        })
    }

    fn differentiate(&self, x: &DVector<f64>) -> Result<Derivatives, Infallible> {
        Ok(Derivatives {
            gradient: (self.gradient)(x),
            jacobian: (self.jacobian)(x),
        })
    }
}

fn rosenbrock(start: Vec<f64>) -> Functions {
    Functions::unconstrained(
        start,
        |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
        |x| {
            let inner = x[1] - x[0] * x[0];
            DVector::from_vec(vec![
                -2.0 * (1.0 - x[0]) - 400.0 * x[0] * inner,
                200.0 * inner,
            ])
        },
    )
}

#[test]
fn active_bounds_carry_signed_multipliers() {
    // min (x₀ - 3)² + (x₁ + 1)² on [0, 2]², solved at (2, 0).
    let mut problem = Functions::unconstrained(
        vec![1.0, 1.0],
        |x| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2),
        |x| DVector::from_vec(vec![2.0 * (x[0] - 3.0), 2.0 * (x[1] + 1.0)]),
    );
    problem.bounds = (vec![0.0, 0.0], vec![2.0, 2.0]);

    let solution = minimize_unobserved(&problem, &Config::default()).expect("should solve");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 2.0, epsilon = 1e-6);
    assert_relative_eq!(solution.x[1], 0.0, epsilon = 1e-6);
    assert_relative_eq!(solution.objective, 2.0, epsilon = 1e-5);
    assert_relative_eq!(solution.bound_multipliers[0], 2.0, epsilon = 1e-5);
    assert_relative_eq!(solution.bound_multipliers[1], -2.0, epsilon = 1e-5);
}

#[test]
fn equality_constraint_multiplier() {
    // min x₀² + x₁² s.t. x₀ + x₁ = 1.
    let problem = Functions {
        constraint_bounds: (vec![1.0], vec![1.0]),
        constraints: |x| DVector::from_element(1, x[0] + x[1]),
        jacobian: |_| DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
        ..Functions::unconstrained(
            vec![0.0, 0.0],
            |x| x.norm_squared(),
            |x| x * 2.0,
        )
    };

    let solution = minimize_unobserved(&problem, &Config::default()).expect("should solve");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-7);
    assert_relative_eq!(solution.constraints[0], 1.0, epsilon = 1e-7);
    assert_relative_eq!(solution.multipliers[0], -1.0, epsilon = 1e-6);
}

#[test]
fn active_inequality_constraint() {
    // min x₀ + x₁ s.t. x₀² + x₁² ≤ 2, solved at (-1, -1).
    let problem = Functions {
        constraint_bounds: (vec![f64::NEG_INFINITY], vec![2.0]),
        constraints: |x| DVector::from_element(1, x.norm_squared()),
        jacobian: |x| DMatrix::from_row_slice(1, 2, &[2.0 * x[0], 2.0 * x[1]]),
        ..Functions::unconstrained(
            vec![0.0, 0.0],
            |x| x[0] + x[1],
            |_| DVector::from_element(2, 1.0),
        )
    };

    let solution = minimize_unobserved(&problem, &Config::default()).expect("should solve");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, DVector::from_element(2, -1.0), epsilon = 1e-6);
    assert_relative_eq!(solution.multipliers[0], 0.5, epsilon = 1e-5);
}

#[test]
fn rosenbrock_with_either_hessian() {
    for hessian in [Hessian::Bfgs, Hessian::FiniteDifference] {
        let config = Config::new(500, 1e-9, hessian).expect("valid config");
        let solution =
            minimize_unobserved(&rosenbrock(vec![-1.2, 1.0]), &config).expect("should solve");

        assert_eq!(solution.status, Status::Converged, "{hessian:?}");
        assert_relative_eq!(solution.x, DVector::from_element(2, 1.0), epsilon = 1e-5);
        assert!(solution.iters > 1);
    }
}

#[test]
fn fixed_variables_are_held() {
    // min (x₀ - 1)² + (x₁ - x₀)² with x₀ fixed at 2.
    let mut problem = Functions::unconstrained(
        vec![0.0, 0.0],
        |x| (x[0] - 1.0).powi(2) + (x[1] - x[0]).powi(2),
        |x| {
            DVector::from_vec(vec![
                2.0 * (x[0] - 1.0) - 2.0 * (x[1] - x[0]),
                2.0 * (x[1] - x[0]),
            ])
        },
    );
    problem.bounds = (
        vec![2.0, f64::NEG_INFINITY],
        vec![2.0, f64::INFINITY],
    );

    let solution = minimize_unobserved(&problem, &Config::default()).expect("should solve");

    assert_eq!(solution.status, Status::Converged);
    assert_eq!(solution.x[0], 2.0);
    assert_relative_eq!(solution.x[1], 2.0, epsilon = 1e-7);
    assert_relative_eq!(solution.bound_multipliers[0], -2.0, epsilon = 1e-6);
}

#[test]
fn iteration_limit() {
    let config = Config::new(2, 1e-8, Hessian::Bfgs).expect("valid config");
    let solution =
        minimize_unobserved(&rosenbrock(vec![-1.2, 1.0]), &config).expect("should run");

    assert_eq!(solution.status, Status::MaxIters);
    assert_eq!(solution.iters, 2);
}

#[test]
fn observer_stops_early() {
    let mut seen = Vec::new();
    let observer = |event: &Event| {
        if let Event::Iterated(progress) = event {
            seen.push(progress.iteration);
            assert!(progress.step > 0.0 && progress.step <= 1.0);
            if progress.iteration == 3 {
                return Some(Action::StopEarly);
            }
        }
        None
    };

    let solution = minimize(&rosenbrock(vec![-1.2, 1.0]), &Config::default(), observer)
        .expect("should run");

    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.iters, 3);
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn inconsistent_bounds_are_rejected() {
    let mut problem = rosenbrock(vec![0.0, 0.0]);
    problem.bounds = (vec![1.0, 0.0], vec![0.0, 1.0]);

    let result = minimize_unobserved(&problem, &Config::default());
    assert!(matches!(result, Err(Error::VariableBounds { index: 0, .. })));
}

#[test]
fn wrong_sizes_are_rejected() {
    let mut problem = rosenbrock(vec![0.0, 0.0]);
    problem.start = vec![0.0];

    let result = minimize_unobserved(&problem, &Config::default());
    assert!(matches!(
        result,
        Err(Error::Dimension {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

#[test]
fn config_is_validated() {
    assert_eq!(
        Config::new(0, 1e-8, Hessian::Bfgs),
        Err(ConfigError::MaxIters)
    );
    assert_eq!(
        Config::new(10, 0.0, Hessian::Bfgs),
        Err(ConfigError::Tolerance)
    );
    assert_eq!(
        Config::new(10, f64::NAN, Hessian::FiniteDifference),
        Err(ConfigError::Tolerance)
    );
    assert_eq!(Config::default().hessian(), Hessian::Bfgs);
}

#[test]
fn restoration_reduces_infeasibility() {
    // x₀² + x₁² = 1 from far outside the circle.
    let problem = Functions {
        bounds: (vec![-10.0, -10.0], vec![10.0, 10.0]),
        constraint_bounds: (vec![1.0], vec![1.0]),
        constraints: |x| DVector::from_element(1, x.norm_squared()),
        jacobian: |x| DMatrix::from_row_slice(1, 2, &[2.0 * x[0], 2.0 * x[1]]),
        ..Functions::unconstrained(
            vec![3.0, 3.0],
            |x| x[0],
            |_| DVector::from_vec(vec![1.0, 0.0]),
        )
    };
    let barrier = super::barrier::Barrier::new(&problem).expect("valid problem");
    let (z, evaluation) = barrier.start().expect("should evaluate");
    let theta = evaluation.residual.lp_norm(1);

    let filter = Filter::new(1e6);
    let restored = super::restoration::restore(&barrier, &z, &evaluation, &filter, 0.1, 0.99)
        .expect("should evaluate")
        .expect("should restore");

    assert!(restored.iterations >= 1);
    assert!(restored.evaluation.residual.lp_norm(1) <= 0.9 * theta);
}

#[test]
fn feasible_points_need_no_restoration() {
    let problem = Functions {
        constraint_bounds: (vec![1.0], vec![1.0]),
        constraints: |x| DVector::from_element(1, x[0] + x[1]),
        jacobian: |_| DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
        ..Functions::unconstrained(
            vec![0.5, 0.5],
            |x| x.norm_squared(),
            |x| x * 2.0,
        )
    };
    let barrier = super::barrier::Barrier::new(&problem).expect("valid problem");
    let (z, evaluation) = barrier.start().expect("should evaluate");

    let filter = Filter::new(1e6);
    let restored = super::restoration::restore(&barrier, &z, &evaluation, &filter, 0.1, 0.99)
        .expect("should evaluate");
    assert!(restored.is_none());
}

#[test]
fn escapes_where_the_linearization_jams() {
    // min x₀ s.t. x₀² - x₁ = 1, x₀ - x₂ = 0.5, x₁, x₂ ≥ 0 from (-2, 3, 1).
    // Steps that satisfy the linearized constraints stall against the bounds.
    let problem = Functions {
        bounds: (
            vec![f64::NEG_INFINITY, 0.0, 0.0],
            vec![f64::INFINITY; 3],
        ),
        constraint_bounds: (vec![1.0, 0.5], vec![1.0, 0.5]),
        constraints: |x| DVector::from_vec(vec![x[0] * x[0] - x[1], x[0] - x[2]]),
        jacobian: |x| DMatrix::from_row_slice(2, 3, &[2.0 * x[0], -1.0, 0.0, 1.0, 0.0, -1.0]),
        ..Functions::unconstrained(
            vec![-2.0, 3.0, 1.0],
            |x| x[0],
            |_| DVector::from_vec(vec![1.0, 0.0, 0.0]),
        )
    };
    let config = Config::new(500, 1e-8, Hessian::FiniteDifference).expect("valid config");

    let solution = minimize_unobserved(&problem, &config).expect("should solve");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x, DVector::from_vec(vec![1.0, 0.0, 0.5]), epsilon = 1e-5);
}
