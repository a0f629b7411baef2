use bolza_core::{
    Boundary, Dimensions, Endpoints, Node, OptimalControl, Problem, Scalar, SetupError, Workspace,
};

/// Minimum-effort transfer of `x` from 0 to 1 across two phases.
///
/// Phase 1 runs on `[0, 1]` with `x' = u`, phase 2 on `[1, 2]` with
/// `x' = 2u`, and each minimizes `∫u²`. The state is continuous across the
/// switch through the single linkage. The optimum has `u = 0.2` then
/// `u = 0.4`, `x(1) = 0.2`, cost `0.2`, and a constant costate of `-0.4`.
pub struct TwoPhase;

impl OptimalControl for TwoPhase {
    fn dae<S: Scalar>(&self, derivatives: &mut [S], _path: &mut [S], node: &Node<'_, S>, _: &Workspace) {
        let gain = if node.phase == 1 { 1.0 } else { 2.0 };
        derivatives[0] = node.controls[0] * gain;
    }

    fn integrand_cost<S: Scalar>(&self, node: &Node<'_, S>, _: &Workspace) -> S {
        node.controls[0] * node.controls[0]
    }

    fn events<S: Scalar>(&self, events: &mut [S], boundary: &Boundary<'_, S>, _: &Workspace) {
        events[0] = if boundary.phase == 1 {
            boundary.initial_states[0]
        } else {
            boundary.final_states[0]
        };
    }

    fn linkages<S: Scalar>(&self, linkages: &mut [S], endpoints: &Endpoints<'_, S>, _: &Workspace) {
        if let (Some(first), Some(second)) = (endpoints.get(1), endpoints.get(2)) {
            linkages[0] = first.final_states[0] - second.initial_states[0];
        }
    }
}

/// Builds the two-phase transfer with `nodes` nodes per phase and no guess.
///
/// # Errors
///
/// Returns a [`SetupError`] if `nodes` is empty.
pub fn problem(nodes: Vec<usize>) -> Result<Problem<TwoPhase>, SetupError> {
    let mut setup = Problem::setup("two-phase", 2, 1)?;
    for p in 1..=2 {
        let phase = setup.phase_mut(p)?;
        phase.dimensions = Dimensions {
            states: 1,
            controls: 1,
            events: 1,
            ..Dimensions::default()
        };
        phase.nodes.clone_from(&nodes);
    }

    let mut problem = setup.build(TwoPhase)?;
    for (p, (start, end, target)) in [(1, (0.0, 1.0, 0.0)), (2, (1.0, 2.0, 1.0))] {
        let phase = problem.phase_mut(p)?;
        phase
            .bounds_mut()
            .set_states(&[-5.0], &[5.0])?
            .set_controls(&[-5.0], &[5.0])?
            .set_events(&[target], &[target])?
            .set_start_time(start, start)
            .set_end_time(end, end);
    }
    Ok(problem)
}
