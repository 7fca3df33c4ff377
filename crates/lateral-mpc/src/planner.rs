//! Per-tick trajectory planning around a `LateralSolver`

use crate::clip::{clip_curvature, lag_adjusted_curvature};
use crate::params::{CostWeights, VehicleParams};
use crate::reference::yaw_from_path;
use crate::solver::{LateralSolver, LqSolver, MpcProblem, Solution, NX};
use crate::throttle::WarnThrottle;
use serde::{Deserialize, Serialize};
use signal_core::{
    interp, t_idxs, validate_finite, validate_len, PathPoint, SignalError, CONTROL_N, DT_MDL,
    LAT_MPC_N, MIN_SPEED, TRAJECTORY_SIZE,
};
use tracing::{debug, warn};

/// Cost above which a solution counts as invalid
const MAX_VALID_COST: f64 = 1e6;
/// Consecutive invalid ticks that mark the plan invalid
const INVALID_TICKS: u32 = 2;
/// Speed floor for curvature conversion (m/s)
const CURVATURE_SPEED_FLOOR: f64 = 6.0;
const RESET_WARN_COOLDOWN_S: f64 = 5.0;
const LANE_SMOOTH_WINDOW: usize = 5;
const LANE_YAW_RATE_CLIP: f64 = 2.0;

/// Solver initial condition carried between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    /// `[x, y, psi, psi_rate]`; only `psi_rate` is ever nonzero
    pub x0: [f64; NX],
}

impl ControlState {
    /// Reset seeded from the measured curvature at speed `v_ego`
    pub fn seeded(measured_curvature: f64, v_ego: f64) -> Self {
        Self {
            x0: [0.0, 0.0, 0.0, measured_curvature * v_ego],
        }
    }

    pub fn psi_rate(&self) -> f64 {
        self.x0[3]
    }
}

/// One tick of model trajectory for the planner
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryInput<'a> {
    /// Path to follow, `TRAJECTORY_SIZE` points
    pub path: &'a [PathPoint],
    /// Model heading per knot (rad)
    pub psi: &'a [f64],
    /// Model yaw rate per knot (rad/s)
    pub psi_rate: &'a [f64],
    /// Planned speed per knot (m/s)
    pub v_plan: &'a [f64],
    pub v_ego: f64,
    pub measured_curvature: f64,
    /// Road roll (rad)
    pub roll: f64,
    /// Lateral bias added to the path (m)
    pub path_offset: f64,
    /// Path came from lane lines: recompute heading and yaw rate from it
    pub lanelines_active: bool,
}

impl<'a> TrajectoryInput<'a> {
    fn validate(&self) -> Result<(), SignalError> {
        validate_len("path", self.path.len(), TRAJECTORY_SIZE)?;
        validate_len("psi", self.psi.len(), TRAJECTORY_SIZE)?;
        validate_len("psi_rate", self.psi_rate.len(), TRAJECTORY_SIZE)?;
        validate_len("v_plan", self.v_plan.len(), TRAJECTORY_SIZE)?;
        let ys: Vec<f64> = self.path.iter().flat_map(|p| [p.x, p.y]).collect();
        validate_finite("path", &ys)?;
        validate_finite("psi", self.psi)?;
        validate_finite("psi_rate", self.psi_rate)?;
        validate_finite("v_plan", self.v_plan)?;
        validate_finite(
            "scalars",
            &[self.v_ego, self.measured_curvature, self.roll, self.path_offset],
        )
    }
}

/// Planner output for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateralPlan {
    /// Planned curvature per control knot (1/m)
    pub curvatures: Vec<f64>,
    /// Planned curvature rate per control knot, last is 0
    pub curvature_rates: Vec<f64>,
    pub psis: Vec<f64>,
    pub distances: Vec<f64>,
    pub lateral_positions: Vec<f64>,
    /// Lateral reference handed to the solver
    pub y_pts: Vec<f64>,
    /// Lag-compensated curvature before clipping
    pub desired_curvature: f64,
    /// Curvature to command this tick, hard limited
    pub output_curvature: f64,
    /// Curvature sequence after the jerk, acceleration and absolute limits
    pub clipped_curvatures: Vec<f64>,
    pub solution_valid: bool,
    /// 0 on success, otherwise the solver error code
    pub solver_status: i32,
    pub cost: f64,
    /// Any clipping limit was active this tick
    pub limited: bool,
}

impl Default for LateralPlan {
    fn default() -> Self {
        Self {
            curvatures: vec![0.0; CONTROL_N],
            curvature_rates: vec![0.0; CONTROL_N],
            psis: vec![0.0; CONTROL_N],
            distances: vec![0.0; CONTROL_N],
            lateral_positions: vec![0.0; CONTROL_N],
            y_pts: vec![0.0; LAT_MPC_N + 1],
            desired_curvature: 0.0,
            output_curvature: 0.0,
            clipped_curvatures: vec![0.0; CONTROL_N],
            solution_valid: true,
            solver_status: 0,
            cost: 0.0,
            limited: false,
        }
    }
}

/// Lateral trajectory planner
pub struct TrajectoryPlanner<S: LateralSolver = LqSolver> {
    solver: S,
    params: VehicleParams,
    weights: CostWeights,
    state: ControlState,
    solution: Solution,
    invalid_count: u32,
    throttle: WarnThrottle,
    last_plan: LateralPlan,
}

impl TrajectoryPlanner<LqSolver> {
    pub fn new(params: VehicleParams, weights: CostWeights) -> Self {
        Self::with_solver(LqSolver::new(), params, weights)
    }
}

impl<S: LateralSolver> TrajectoryPlanner<S> {
    pub fn with_solver(solver: S, params: VehicleParams, weights: CostWeights) -> Self {
        Self {
            solver,
            params,
            weights,
            state: ControlState::default(),
            solution: Solution::zeros(LAT_MPC_N + 1),
            invalid_count: 0,
            throttle: WarnThrottle::new(RESET_WARN_COOLDOWN_S),
            last_plan: LateralPlan::default(),
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn weights(&self) -> CostWeights {
        self.weights
    }

    /// Apply new cost weights; non-finite weights are ignored
    pub fn set_weights(&mut self, weights: CostWeights) {
        if weights.is_finite() {
            self.weights = weights;
        } else {
            warn!("Ignoring non-finite MPC weights: {:?}", weights);
        }
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn set_params(&mut self, params: VehicleParams) {
        self.params = params;
    }

    pub fn last_plan(&self) -> &LateralPlan {
        &self.last_plan
    }

    /// Zero the solver state and forget the previous command
    pub fn reset(&mut self) {
        self.state = ControlState::default();
        self.solution = Solution::zeros(LAT_MPC_N + 1);
        self.invalid_count = 0;
        self.last_plan = LateralPlan::default();
    }

    /// Plan one tick
    pub fn update(&mut self, input: &TrajectoryInput<'_>) -> LateralPlan {
        self.throttle.tick();

        if let Err(e) = input.validate() {
            debug!("Trajectory input rejected, holding last plan: {}", e);
            self.mark_invalid();
            let mut held = self.last_plan.clone();
            held.solution_valid = self.solution_valid();
            self.last_plan = held.clone();
            return held;
        }

        let t = t_idxs();
        let knots = LAT_MPC_N + 1;
        let v_ego = input.v_ego.max(MIN_SPEED);
        let v_plan: Vec<f64> = input.v_plan.iter().map(|v| v.max(MIN_SPEED)).collect();

        let (psi_ref, psi_rate_ref) = if input.lanelines_active {
            yaw_from_path(input.path, &v_plan, LANE_SMOOTH_WINDOW, LANE_YAW_RATE_CLIP)
        } else {
            (input.psi.to_vec(), input.psi_rate.to_vec())
        };
        let y_pts: Vec<f64> = input.path[..knots]
            .iter()
            .map(|p| p.y + input.path_offset)
            .collect();
        let lateral_factor: Vec<f64> = v_plan[..knots]
            .iter()
            .map(|&v| self.params.lateral_factor(v))
            .collect();

        let problem = MpcProblem {
            x0: self.state.x0,
            t: &t[..knots],
            v: &v_plan[..knots],
            lateral_factor: &lateral_factor,
            y_ref: &y_pts,
            psi_ref: &psi_ref[..knots],
            psi_rate_ref: &psi_rate_ref[..knots],
            weights: self.weights,
        };

        let result = self.solver.solve(&problem).and_then(|solution| {
            if solution.has_non_finite() || solution.x.len() != knots {
                Err(crate::SolverError::NonFiniteSolution)
            } else {
                Ok(solution)
            }
        });

        let (solver_status, failed) = match result {
            Ok(solution) => {
                // Warm start at the actuator delay instead of the first knot
                let psi_rates = solution.column(3);
                let warm_t = self.params.steer_actuator_delay.max(DT_MDL);
                self.state.x0[3] = interp(warm_t, &t[..knots], &psi_rates);
                if solution.cost > MAX_VALID_COST {
                    self.mark_invalid();
                } else {
                    self.invalid_count = 0;
                }
                self.solution = solution;
                (0, false)
            }
            Err(e) => {
                self.state = ControlState::seeded(input.measured_curvature, v_ego);
                self.solution = fallback_solution(input.measured_curvature, v_ego, &t[..knots]);
                self.mark_invalid();
                metrics::counter!("lateral_mpc_resets_total").increment(1);
                if self.throttle.ready() {
                    warn!("Lateral MPC reset: {}", e);
                }
                (e.status(), true)
            }
        };

        let x = &self.solution.x;
        let psis: Vec<f64> = x.iter().take(CONTROL_N).map(|s| s[2]).collect();
        let distances: Vec<f64> = x.iter().take(CONTROL_N).map(|s| s[0]).collect();
        let lateral_positions: Vec<f64> = x.iter().take(CONTROL_N).map(|s| s[1]).collect();
        let curvatures: Vec<f64> = if failed {
            vec![input.measured_curvature; CONTROL_N]
        } else {
            x.iter()
                .zip(&v_plan)
                .take(CONTROL_N)
                .map(|(s, v)| s[3] / v.max(CURVATURE_SPEED_FLOOR))
                .collect()
        };
        let rate_div = v_ego.max(CURVATURE_SPEED_FLOOR);
        let mut curvature_rates: Vec<f64> = self
            .solution
            .u
            .iter()
            .take(CONTROL_N - 1)
            .map(|u| u / rate_div)
            .collect();
        curvature_rates.resize(CONTROL_N, 0.0);

        let desired_curvature = lag_adjusted_curvature(
            v_ego,
            &psis,
            &curvatures,
            self.params.steer_actuator_delay,
        );
        let (output_curvature, mut limited) = clip_curvature(
            v_ego,
            self.last_plan.output_curvature,
            desired_curvature,
            input.roll,
            DT_MDL,
        );

        let mut clipped_curvatures = Vec::with_capacity(CONTROL_N);
        clipped_curvatures.push(output_curvature);
        for i in 1..curvatures.len() {
            let (c, hit) = clip_curvature(
                v_ego,
                clipped_curvatures[i - 1],
                curvatures[i],
                input.roll,
                t[i] - t[i - 1],
            );
            limited |= hit;
            clipped_curvatures.push(c);
        }

        let plan = LateralPlan {
            curvatures,
            curvature_rates,
            psis,
            distances,
            lateral_positions,
            y_pts,
            desired_curvature,
            output_curvature,
            clipped_curvatures,
            solution_valid: self.solution_valid(),
            solver_status,
            cost: self.solution.cost,
            limited,
        };
        debug!(
            "MPC status={} cost={:.3} curvature={:.5} valid={}",
            plan.solver_status, plan.cost, plan.output_curvature, plan.solution_valid
        );
        self.last_plan = plan.clone();
        plan
    }

    fn mark_invalid(&mut self) {
        self.invalid_count = self.invalid_count.saturating_add(1);
        metrics::counter!("lateral_mpc_invalid_total").increment(1);
    }

    fn solution_valid(&self) -> bool {
        self.invalid_count < INVALID_TICKS
    }
}

/// Constant-curvature trajectory at the measured curvature
fn fallback_solution(measured_curvature: f64, v_ego: f64, t: &[f64]) -> Solution {
    let yaw_rate = measured_curvature * v_ego;
    Solution {
        x: t.iter()
            .map(|&time| [v_ego * time, 0.0, yaw_rate * time, yaw_rate])
            .collect(),
        u: vec![0.0; t.len().saturating_sub(1)],
        cost: 0.0,
    }
}
