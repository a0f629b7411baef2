//! The brachistochrone: the curve of fastest descent between two points.
//!
//! A bead slides without friction from the origin to `(2, 2)` under gravity,
//! steered by the path angle `θ`. The minimum travel time is about 0.8247 s.
//!
//! # Usage
//!
//! ```text
//! cargo run --example brachistochrone
//! cargo run --example brachistochrone -- trapezoidal
//! RUST_LOG=debug cargo run --example brachistochrone
//! ```

use std::{error::Error, f64::consts::PI};

use bolza_core::{
    Algorithm, Boundary, Collocation, Dimensions, Node, OptimalControl, Problem, Scalar, Workspace,
    linspace,
};
use nalgebra::DMatrix;
use tracing_subscriber::EnvFilter;

const GRAVITY: f64 = 9.8;

struct Brachistochrone;

impl OptimalControl for Brachistochrone {
    fn dae<S: Scalar>(&self, derivatives: &mut [S], _path: &mut [S], node: &Node<'_, S>, _: &Workspace) {
        let v = node.states[2];
        let theta = node.controls[0];
        derivatives[0] = v * theta.sin();
        derivatives[1] = v * theta.cos();
        derivatives[2] = theta.cos() * GRAVITY;
    }

    fn endpoint_cost<S: Scalar>(&self, boundary: &Boundary<'_, S>, _: &Workspace) -> S {
        boundary.end_time
    }

    fn events<S: Scalar>(&self, events: &mut [S], boundary: &Boundary<'_, S>, _: &Workspace) {
        events[..3].copy_from_slice(boundary.initial_states);
        events[3] = boundary.final_states[0];
        events[4] = boundary.final_states[1];
    }
}

fn problem() -> Result<Problem<Brachistochrone>, Box<dyn Error>> {
    let mut setup = Problem::setup("brachistochrone", 1, 0)?;
    let phase = setup.phase_mut(1)?;
    phase.dimensions = Dimensions {
        states: 3,
        controls: 1,
        events: 5,
        ..Dimensions::default()
    };
    phase.nodes = vec![40];

    let mut problem = setup.build(Brachistochrone)?;
    let phase = problem.phase_mut(1)?;
    phase
        .bounds_mut()
        .set_states(&[0.0; 3], &[20.0; 3])?
        .set_controls(&[0.0], &[2.0 * PI])?
        .set_events(&[0.0, 0.0, 0.0, 2.0, 2.0], &[0.0, 0.0, 0.0, 2.0, 2.0])?
        .set_start_time(0.0, 0.0)
        .set_end_time(0.0, 10.0);

    let ramp = linspace(0.0, 1.0, 20);
    phase.guess_mut().set_trajectory(
        DMatrix::from_fn(3, 20, |_, k| ramp[k]),
        DMatrix::from_element(1, 20, 1.0),
        linspace(0.0, 2.0, 20),
    )?;
    Ok(problem)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let collocation = match std::env::args().nth(1).as_deref() {
        None | Some("legendre") => Collocation::Legendre,
        Some("chebyshev") => Collocation::Chebyshev,
        Some("trapezoidal") => Collocation::Trapezoidal,
        Some("hermite-simpson") => Collocation::HermiteSimpson,
        Some(other) => {
            eprintln!("Unknown scheme: {other}");
            eprintln!("Usage: brachistochrone [legendre|chebyshev|trapezoidal|hermite-simpson]");
            std::process::exit(1);
        }
    };
    let algorithm = Algorithm {
        collocation,
        ..Algorithm::default()
    };

    let problem = problem()?;
    let solution = bolza_solvers::solve(&problem, &algorithm)?;
    if solution.error_flag() {
        eprintln!("no converged solution: {:?}", solution.status());
        std::process::exit(2);
    }

    let time = solution.time(1)?;
    let states = solution.states(1)?;
    let controls = solution.controls(1)?;
    println!("minimum time: {:.4} s ({} NLP iterations)", solution.objective(), solution.iterations());
    println!("{:>8} {:>8} {:>8} {:>8} {:>8}", "t", "x", "y", "v", "theta");
    for k in 0..time.len() {
        println!(
            "{:8.4} {:8.4} {:8.4} {:8.4} {:8.4}",
            time[k],
            states[(0, k)],
            states[(1, k)],
            states[(2, k)],
            controls[(0, k)],
        );
    }
    Ok(())
}
