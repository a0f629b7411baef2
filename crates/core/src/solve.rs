use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::guess::interpolate_columns;
use crate::scaling::from_bounds;
use crate::{
    Algorithm, Dimensions, Layout, Mesh, MeshIteration, MeshRefinement, Nlp, NlpStatus, Node,
    OptimalControl, Phase, PhaseLayout, PhaseShape, PhaseSolution, PhaseTrajectory, Problem,
    RawSolution, ScalingMode, Solution, SolveError, Transcription, Workspace, validate,
};

/// Solves an optimal-control problem.
///
/// Validates the problem and configuration, checks the callbacks at the
/// initial guess, then walks the mesh sequence: each mesh iteration lays the
/// problem out on the meshes supplied by `transcription`, solves it, and
/// warm-starts the next iteration from the result. Iteration stops after the
/// last mesh, when a solve fails to converge, or (with automatic refinement)
/// once the ODE error estimate is within tolerance.
///
/// # Errors
///
/// Returns an error for an invalid configuration or problem, a callback
/// contract violation, or a failure of the transcription service itself.
/// A solve that runs but does not converge is not an error; it is reported
/// through [`Solution::error_flag`].
pub fn solve<M, T>(
    problem: &Problem<M>,
    algorithm: &Algorithm,
    transcription: &T,
) -> Result<Solution, SolveError>
where
    M: OptimalControl,
    T: Transcription,
{
    algorithm.validate()?;
    validate::problem(problem)?;

    let dims = problem.phases().iter().map(|p| *p.dimensions()).collect();
    let mut workspace = Workspace::new(problem.name(), dims);
    let max_iterations = match algorithm.mesh_refinement {
        MeshRefinement::Manual => problem
            .phases()
            .iter()
            .map(|p| p.nodes().len())
            .max()
            .unwrap_or(1),
        MeshRefinement::Automatic => algorithm.mesh_refinement_max_iterations,
    };

    // The callbacks are checked at the start point before the service is touched.
    let endpoints_only = Mesh {
        points: DVector::from_vec(vec![0.0, 1.0]),
        defects: 0,
        costate_map: DMatrix::zeros(2, 0),
    };
    let starts: Vec<PhaseTrajectory> = problem.phases().iter().map(|p| cold_start(p, &endpoints_only)).collect();
    validate::contract(problem, &starts, &workspace)?;

    info!(
        problem = problem.name(),
        phases = problem.nphases(),
        collocation = ?algorithm.collocation,
        "starting solve"
    );

    let mut requested: Vec<usize> = problem.phases().iter().map(|p| p.nodes_at(1)).collect();
    let mut outcome = mesh_iteration(problem, algorithm, transcription, &mut workspace, &requested, None)?;
    let mut history = vec![outcome.summary.clone()];
    let mut iterations = outcome.summary.nlp_iterations;

    for iteration in 2..=max_iterations {
        if !outcome.status.is_converged() {
            break;
        }
        requested = match algorithm.mesh_refinement {
            MeshRefinement::Manual => problem.phases().iter().map(|p| p.nodes_at(iteration)).collect(),
            MeshRefinement::Automatic => {
                if outcome.summary.ode_error <= algorithm.ode_tolerance {
                    break;
                }
                requested.iter().map(|&n| 2 * n - 1).collect()
            }
        };
        outcome = mesh_iteration(
            problem,
            algorithm,
            transcription,
            &mut workspace,
            &requested,
            Some(outcome.phases.as_slice()),
        )?;
        iterations += outcome.summary.nlp_iterations;
        history.push(outcome.summary.clone());
    }

    let solution = Solution::new(
        outcome.status,
        outcome.summary.objective,
        iterations,
        outcome.phases,
        outcome.linkage_multipliers,
        history,
    );

    if solution.error_flag() {
        warn!(
            problem = problem.name(),
            status = ?solution.status(),
            "solve finished without converging"
        );
    } else {
        info!(
            problem = problem.name(),
            objective = solution.objective(),
            iterations = solution.iterations(),
            "solve converged"
        );
    }
    Ok(solution)
}

/// Result of one mesh iteration.
struct Outcome {
    status: NlpStatus,
    phases: Vec<PhaseSolution>,
    linkage_multipliers: DVector<f64>,
    summary: MeshIteration,
}

fn mesh_iteration<M, T>(
    problem: &Problem<M>,
    algorithm: &Algorithm,
    transcription: &T,
    workspace: &mut Workspace,
    requested: &[usize],
    previous: Option<&[PhaseSolution]>,
) -> Result<Outcome, SolveError>
where
    M: OptimalControl,
    T: Transcription,
{
    let meshes = requested
        .iter()
        .map(|&n| transcription.mesh(algorithm, n))
        .collect::<Result<Vec<_>, _>>()
        .map_err(SolveError::transcription)?;
    let iteration = workspace.mesh_iteration() + 1;
    workspace.enter_mesh(iteration, meshes.iter().map(Mesh::nodes).collect());

    let starts: Vec<PhaseTrajectory> = problem
        .phases()
        .iter()
        .zip(&meshes)
        .enumerate()
        .map(|(i, (phase, mesh))| match previous.and_then(|p| p.get(i)) {
            Some(last) => warm_start(last, mesh),
            None => cold_start(phase, mesh),
        })
        .collect();

    let nlp = assemble(problem, algorithm, workspace, meshes, &starts);
    debug!(
        iteration,
        nodes = ?requested,
        variables = nlp.layout.nvariables(),
        constraints = nlp.layout.nconstraints(),
        "mesh iteration"
    );

    let raw = transcription
        .solve(&nlp, algorithm)
        .map_err(SolveError::transcription)?;
    check_shape(&nlp.layout, &raw)?;

    let phases = reconstruct(&nlp, &raw);
    let ode_error = phases
        .iter()
        .map(|r| ode_error(problem.model(), workspace, r))
        .fold(0.0, f64::max);
    let linkage_multipliers = DVector::from_fn(nlp.layout.nlinkages(), |l, _| {
        raw.multipliers[nlp.layout.linkage(l)]
    });

    debug!(
        iteration,
        status = ?raw.status,
        objective = raw.objective,
        nlp_iterations = raw.iterations,
        ode_error,
        "mesh iteration finished"
    );

    Ok(Outcome {
        status: raw.status,
        phases: phases.into_iter().map(|r| r.solution).collect(),
        linkage_multipliers,
        summary: MeshIteration {
            iteration,
            nodes: nlp.meshes.iter().map(Mesh::nodes).collect(),
            status: raw.status,
            objective: raw.objective,
            nlp_iterations: raw.iterations,
            ode_error,
        },
    })
}

fn check_shape(layout: &Layout, raw: &RawSolution) -> Result<(), SolveError> {
    for (what, expected, actual) in [
        ("primal values", layout.nvariables(), raw.primal.len()),
        ("multipliers", layout.nconstraints(), raw.multipliers.len()),
    ] {
        if expected != actual {
            return Err(SolveError::MalformedResult {
                what,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Centre of a bound pair, falling back to the finite side or zero.
fn midpoint(lower: f64, upper: f64) -> f64 {
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) => 0.5 * (lower + upper),
        (true, false) => lower,
        (false, true) => upper,
        (false, false) => 0.0,
    }
}

/// Node times of a mesh spanning `[t0, tf]`.
fn node_times(mesh: &Mesh, t0: f64, tf: f64) -> Vec<f64> {
    mesh.points.iter().map(|s| t0 + (tf - t0) * s).collect()
}

fn cold_start(phase: &Phase, mesh: &Mesh) -> PhaseTrajectory {
    let (lower, upper) = (phase.bounds().lower(), phase.bounds().upper());
    let guess = phase.guess();
    let n = mesh.nodes();

    let parameters = DVector::from_fn(guess.parameters().len(), |i, _| {
        guess.parameters()[i].clamp(lower.parameters[i], upper.parameters[i])
    });

    if guess.is_empty() {
        let t0 = midpoint(lower.start_time, upper.start_time);
        let mut tf = midpoint(lower.end_time, upper.end_time);
        if tf <= t0 {
            tf = t0 + 1.0;
        }
        return PhaseTrajectory {
            states: DMatrix::from_fn(lower.states.len(), n, |i, _| {
                midpoint(lower.states[i], upper.states[i])
            }),
            controls: DMatrix::from_fn(lower.controls.len(), n, |j, _| {
                midpoint(lower.controls[j], upper.controls[j])
            }),
            parameters,
            start_time: t0,
            end_time: tf,
        };
    }

    let time = guess.time().as_slice();
    let t0 = time[0];
    let tf = time[time.len() - 1];
    let targets = node_times(mesh, t0, tf);
    PhaseTrajectory {
        states: interpolate_columns(guess.states(), time, &targets),
        controls: interpolate_columns(guess.controls(), time, &targets),
        parameters,
        start_time: t0,
        end_time: tf,
    }
}

fn warm_start(last: &PhaseSolution, mesh: &Mesh) -> PhaseTrajectory {
    let time = last.time.as_slice();
    let t0 = time.first().copied().unwrap_or(0.0);
    let tf = time.last().copied().unwrap_or(t0);
    let targets = node_times(mesh, t0, tf);
    PhaseTrajectory {
        states: interpolate_columns(&last.states, time, &targets),
        controls: interpolate_columns(&last.controls, time, &targets),
        parameters: last.parameters.clone(),
        start_time: t0,
        end_time: tf,
    }
}

/// Per-component scale factors of one phase.
struct Factors {
    states: Vec<f64>,
    controls: Vec<f64>,
    parameters: Vec<f64>,
    events: Vec<f64>,
    path: Vec<f64>,
    defects: Vec<f64>,
    start_time: f64,
    end_time: f64,
}

impl Factors {
    fn new(phase: &Phase, mode: ScalingMode) -> Self {
        match mode {
            ScalingMode::Manual => {
                let scale = phase.scale();
                Self {
                    states: scale.states.iter().copied().collect(),
                    controls: scale.controls.iter().copied().collect(),
                    parameters: scale.parameters.iter().copied().collect(),
                    events: scale.events.iter().copied().collect(),
                    path: scale.path.iter().copied().collect(),
                    defects: scale.defects.iter().copied().collect(),
                    start_time: scale.time,
                    end_time: scale.time,
                }
            }
            ScalingMode::Automatic => {
                let (lower, upper) = (phase.bounds().lower(), phase.bounds().upper());
                let auto = |l: &DVector<f64>, u: &DVector<f64>| -> Vec<f64> {
                    l.iter().zip(u).map(|(&l, &u)| from_bounds(l, u)).collect()
                };
                let states = auto(&lower.states, &upper.states);
                Self {
                    defects: states.clone(),
                    states,
                    controls: auto(&lower.controls, &upper.controls),
                    parameters: auto(&lower.parameters, &upper.parameters),
                    events: auto(&lower.events, &upper.events),
                    path: auto(&lower.path, &upper.path),
                    start_time: from_bounds(lower.start_time, upper.start_time),
                    end_time: from_bounds(lower.end_time, upper.end_time),
                }
            }
        }
    }
}

/// Bounds and scales of the flat problem.
struct Flat {
    variable_lower: DVector<f64>,
    variable_upper: DVector<f64>,
    variable_scale: DVector<f64>,
    constraint_lower: DVector<f64>,
    constraint_upper: DVector<f64>,
    constraint_scale: DVector<f64>,
}

impl Flat {
    fn new(layout: &Layout) -> Self {
        let (n, m) = (layout.nvariables(), layout.nconstraints());
        Self {
            variable_lower: DVector::zeros(n),
            variable_upper: DVector::zeros(n),
            variable_scale: DVector::from_element(n, 1.0),
            constraint_lower: DVector::zeros(m),
            constraint_upper: DVector::zeros(m),
            constraint_scale: DVector::from_element(m, 1.0),
        }
    }

    fn variable(&mut self, index: usize, lower: f64, upper: f64, scale: f64) {
        self.variable_lower[index] = lower;
        self.variable_upper[index] = upper;
        self.variable_scale[index] = scale;
    }

    fn constraint(&mut self, index: usize, lower: f64, upper: f64, scale: f64) {
        self.constraint_lower[index] = lower;
        self.constraint_upper[index] = upper;
        self.constraint_scale[index] = scale;
    }

    fn fill_phase(&mut self, phase: &Phase, pl: &PhaseLayout, factors: &Factors) {
        let (lower, upper) = (phase.bounds().lower(), phase.bounds().upper());
        let dims = phase.dimensions();

        for k in 0..pl.nodes() {
            for i in 0..dims.states {
                self.variable(pl.state(k, i), lower.states[i], upper.states[i], factors.states[i]);
            }
            for j in 0..dims.controls {
                self.variable(
                    pl.control(k, j),
                    lower.controls[j],
                    upper.controls[j],
                    factors.controls[j],
                );
            }
            for m in 0..dims.path {
                self.constraint(pl.path(k, m), lower.path[m], upper.path[m], factors.path[m]);
            }
        }
        for i in 0..dims.parameters {
            self.variable(
                pl.parameter(i),
                lower.parameters[i],
                upper.parameters[i],
                factors.parameters[i],
            );
        }
        self.variable(pl.start_time(), lower.start_time, upper.start_time, factors.start_time);
        self.variable(pl.end_time(), lower.end_time, upper.end_time, factors.end_time);

        for d in 0..pl.defect_count() {
            for i in 0..dims.states {
                self.constraint(pl.defect(d, i), 0.0, 0.0, factors.defects[i]);
            }
        }
        for e in 0..dims.events {
            self.constraint(pl.event(e), lower.events[e], upper.events[e], factors.events[e]);
        }
        if let Some(row) = pl.duration() {
            self.constraint(row, 0.0, f64::INFINITY, factors.end_time);
        }
    }
}

fn assemble<'a, M>(
    problem: &'a Problem<M>,
    algorithm: &Algorithm,
    workspace: &'a Workspace,
    meshes: Vec<Mesh>,
    starts: &[PhaseTrajectory],
) -> Nlp<'a, M> {
    let shapes: Vec<PhaseShape> = problem
        .phases()
        .iter()
        .zip(&meshes)
        .map(|(phase, mesh)| PhaseShape {
            dimensions: *phase.dimensions(),
            nodes: mesh.nodes(),
            defects: mesh.defects,
            // Needed only when the time bounds allow the phase to end before it starts.
            duration_row: phase.bounds().upper().start_time > phase.bounds().lower().end_time,
        })
        .collect();
    let layout = Layout::new(&shapes, problem.nlinkages());

    let mut flat = Flat::new(&layout);
    for (phase, pl) in problem.phases().iter().zip(layout.phases()) {
        flat.fill_phase(phase, pl, &Factors::new(phase, algorithm.scaling));
    }
    for l in 0..layout.nlinkages() {
        let (lower, upper) = (problem.linkage_lower()[l], problem.linkage_upper()[l]);
        let scale = match algorithm.scaling {
            ScalingMode::Automatic => from_bounds(lower, upper),
            ScalingMode::Manual => 1.0,
        };
        flat.constraint(layout.linkage(l), lower, upper, scale);
    }

    let objective_scale = match algorithm.scaling {
        ScalingMode::Automatic => 1.0,
        ScalingMode::Manual => problem.objective_scale(),
    };
    let initial = layout.flatten(starts);

    Nlp {
        problem,
        workspace,
        layout,
        meshes,
        variable_lower: flat.variable_lower,
        variable_upper: flat.variable_upper,
        constraint_lower: flat.constraint_lower,
        constraint_upper: flat.constraint_upper,
        variable_scale: flat.variable_scale,
        constraint_scale: flat.constraint_scale,
        objective_scale,
        initial,
    }
}

/// A reconstructed phase plus the state derivatives at its nodes.
struct Reconstructed {
    solution: PhaseSolution,
    derivatives: DMatrix<f64>,
    phase: usize,
}

fn column(matrix: &DMatrix<f64>, k: usize) -> Vec<f64> {
    matrix.column(k).iter().copied().collect()
}

/// Evaluates the dynamics and running cost at every node of a trajectory.
fn node_values<M: OptimalControl>(
    model: &M,
    workspace: &Workspace,
    dims: &Dimensions,
    traj: &PhaseTrajectory,
    time: &DVector<f64>,
    phase: usize,
) -> (DMatrix<f64>, DMatrix<f64>, DVector<f64>) {
    let n = time.len();
    let mut derivatives = DMatrix::zeros(dims.states, n);
    let mut path = DMatrix::zeros(dims.path, n);
    let mut integrand = DVector::zeros(n);
    let mut f = vec![0.0; dims.states];
    let mut g = vec![0.0; dims.path];

    for k in 0..n {
        let states = column(&traj.states, k);
        let controls = column(&traj.controls, k);
        let node = Node {
            states: &states,
            controls: &controls,
            parameters: traj.parameters.as_slice(),
            time: time[k],
            phase,
        };
        model.dae(&mut f, &mut g, &node, workspace);
        integrand[k] = model.integrand_cost(&node, workspace);
        derivatives.set_column(k, &DVector::from_column_slice(&f));
        path.set_column(k, &DVector::from_column_slice(&g));
    }
    (derivatives, path, integrand)
}

fn reconstruct<M: OptimalControl>(nlp: &Nlp<'_, M>, raw: &RawSolution) -> Vec<Reconstructed> {
    let layout = &nlp.layout;
    let model = nlp.problem.model();
    let trajectories = layout.unflatten(&raw.primal);

    layout
        .phases()
        .iter()
        .zip(&nlp.meshes)
        .zip(trajectories)
        .enumerate()
        .map(|(p, ((pl, mesh), traj))| {
            let dims = *pl.dimensions();
            let n = pl.nodes();
            let time = DVector::from_vec(node_times(mesh, traj.start_time, traj.end_time));
            let (derivatives, path, integrand) =
                node_values(model, nlp.workspace, &dims, &traj, &time, p + 1);

            let nu = DMatrix::from_fn(pl.defect_count(), dims.states, |d, i| {
                raw.multipliers[pl.defect(d, i)]
            });
            let costates = -(&mesh.costate_map * nu).transpose();
            let hamiltonian = DVector::from_fn(n, |k, _| {
                integrand[k] + costates.column(k).dot(&derivatives.column(k))
            });

            Reconstructed {
                solution: PhaseSolution {
                    time,
                    costates,
                    hamiltonian,
                    path,
                    event_multipliers: DVector::from_fn(dims.events, |e, _| {
                        raw.multipliers[pl.event(e)]
                    }),
                    path_multipliers: DMatrix::from_fn(dims.path, n, |m, k| {
                        raw.multipliers[pl.path(k, m)]
                    }),
                    states: traj.states,
                    controls: traj.controls,
                    parameters: traj.parameters,
                },
                derivatives,
                phase: p + 1,
            }
        })
        .collect()
}

/// Largest relative Simpson residual over all node intervals of a phase.
///
/// Each interval is checked with a Hermite cubic midpoint built from the
/// node states and derivatives; controls are interpolated linearly.
fn ode_error<M: OptimalControl>(model: &M, workspace: &Workspace, phase: &Reconstructed) -> f64 {
    let sol = &phase.solution;
    let f = &phase.derivatives;
    let nstates = sol.states.nrows();
    let mut fm = vec![0.0; nstates];
    let mut gm = vec![0.0; sol.path.nrows()];
    let mut worst: f64 = 0.0;

    for k in 0..sol.time.len().saturating_sub(1) {
        let h = sol.time[k + 1] - sol.time[k];
        if h <= 0.0 {
            continue;
        }
        let (xa, xb) = (sol.states.column(k), sol.states.column(k + 1));
        let (fa, fb) = (f.column(k), f.column(k + 1));
        let xm: Vec<f64> = ((xa + xb) * 0.5 + (fa - fb) * (h / 8.0)).iter().copied().collect();
        let um: Vec<f64> = ((sol.controls.column(k) + sol.controls.column(k + 1)) * 0.5)
            .iter()
            .copied()
            .collect();
        let node = Node {
            states: &xm,
            controls: &um,
            parameters: sol.parameters.as_slice(),
            time: sol.time[k] + 0.5 * h,
            phase: phase.phase,
        };
        model.dae(&mut fm, &mut gm, &node, workspace);

        for i in 0..nstates {
            let residual = xb[i] - xa[i] - h / 6.0 * (fa[i] + 4.0 * fm[i] + fb[i]);
            let magnitude = 1.0 + xa[i].abs().max(xb[i].abs());
            worst = worst.max(residual.abs() / magnitude);
        }
    }
    worst
}

#[cfg(test)]
mod tests;
