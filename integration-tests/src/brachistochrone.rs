use std::f64::consts::PI;

use bolza_core::{
    Boundary, Dimensions, Node, OptimalControl, Problem, Scalar, SetupError, Workspace, linspace,
};
use nalgebra::DMatrix;

/// Final time of the minimum-time descent to `(2, 2)`.
pub const MINIMUM_TIME: f64 = 0.8247;

const GRAVITY: f64 = 9.8;

/// A bead sliding from the origin to `(2, 2)` in minimum time.
///
/// States are `(x, y, v)`, the control is the path angle `θ`.
pub struct Brachistochrone;

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

/// Builds the brachistochrone on the given mesh sequence.
///
/// # Errors
///
/// Returns a [`SetupError`] if `nodes` is empty.
pub fn problem(nodes: Vec<usize>) -> Result<Problem<Brachistochrone>, SetupError> {
    let mut setup = Problem::setup("brachistochrone", 1, 0)?;
    let phase = setup.phase_mut(1)?;
    phase.dimensions = Dimensions {
        states: 3,
        controls: 1,
        events: 5,
        ..Dimensions::default()
    };
    phase.nodes = nodes;

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
