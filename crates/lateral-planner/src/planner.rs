//! Per-tick composition: fuser, maneuver state machine, then MPC

use crate::config::{PlannerConfig, Tuning};
use crate::input::PlannerInput;
use crate::tuning::{StaticTuning, TuningCache, TuningSource};
use lane_fuser::{FusedPath, FuserInput, LaneFuser};
use lateral_mpc::{LateralPlan, LqSolver, TrajectoryInput, TrajectoryPlanner};
use maneuver::{Desire, ManeuverInput, ManeuverOutput, ManeuverStateMachine};
use serde::{Deserialize, Serialize};
use signal_core::{clip, seconds_to_ticks, MIN_SPEED, MS_TO_KPH, TRAJECTORY_SIZE};
use tracing::{debug, info};

/// Lane-line mode switches this far either side of the threshold (km/h)
const LANE_MODE_HYSTERESIS_KPH: f64 = 2.0;
/// Model decelerating below this share of current speed forbids lane mode
const DECEL_RATIO: f64 = 0.7;
/// Steady model speed needed before lane mode is allowed again (s)
const LANE_MODE_SETTLE_S: f64 = 1.0;
const CURVE_SPEED_DISPLAY_KPH: f64 = 200.0;

/// Everything published for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralPlanOutput {
    pub plan: LateralPlan,
    /// The lane-derived path was used
    pub use_lane_lines: bool,
    pub lane_width: f64,
    pub lane_width_left: f64,
    pub lane_width_right: f64,
    /// Lateral offset applied by the fuser (m)
    pub offset: f64,
    pub maneuver: ManeuverOutput,
    pub debug_text: String,
}

/// Lateral guidance core
pub struct LateralPlanner<S: TuningSource = StaticTuning> {
    config: PlannerConfig,
    tuning: TuningCache<S>,
    fuser: LaneFuser,
    maneuver: ManeuverStateMachine,
    mpc: TrajectoryPlanner<LqSolver>,
    lane_line_mode: bool,
    laneless_only: bool,
    lane_mode_possible_ticks: u32,
    last_desire: Desire,
}

impl LateralPlanner<StaticTuning> {
    /// Planner whose tuning never changes from `config.tuning`
    pub fn new(config: PlannerConfig) -> Self {
        let source = StaticTuning(config.tuning.clone());
        Self::with_tuning(config, source)
    }
}

impl<S: TuningSource> LateralPlanner<S> {
    pub fn with_tuning(config: PlannerConfig, source: S) -> Self {
        let tuning = config.tuning.clone();
        let fuser = LaneFuser::new(tuning.apply_to_fuser(&config.fuser));
        let maneuver = ManeuverStateMachine::new(tuning.apply_to_maneuver(&config.maneuver));
        let mpc = TrajectoryPlanner::new(config.vehicle.clone(), tuning.weights);
        info!(
            "Lateral planner ready: wheelbase={:.2}m delay={:.2}s",
            config.vehicle.wheelbase, config.vehicle.steer_actuator_delay
        );
        Self {
            tuning: TuningCache::new(source, tuning, config.tuning_refresh_s),
            config,
            fuser,
            maneuver,
            mpc,
            lane_line_mode: false,
            laneless_only: true,
            lane_mode_possible_ticks: 0,
            last_desire: Desire::None,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn tuning(&self) -> &Tuning {
        self.tuning.current()
    }

    pub fn lane_line_mode(&self) -> bool {
        self.lane_line_mode
    }

    pub fn maneuver(&self) -> &ManeuverStateMachine {
        &self.maneuver
    }

    pub fn trajectory(&self) -> &TrajectoryPlanner<LqSolver> {
        &self.mpc
    }

    /// Run one planning tick
    pub fn update(&mut self, input: &PlannerInput) -> LateralPlanOutput {
        if self.tuning.tick() {
            self.apply_tuning();
        }
        let tuning = self.tuning.current().clone();

        let v_ego = if input.vehicle.v_ego.is_finite() {
            input.vehicle.v_ego.max(MIN_SPEED)
        } else {
            MIN_SPEED
        };
        let speed_kph = v_ego * MS_TO_KPH;
        let model = &input.model;

        let v_plan: Vec<f64> = if model.velocity.len() == TRAJECTORY_SIZE {
            self.track_model_deceleration(&model.velocity);
            model.velocity.iter().map(|v| v.max(MIN_SPEED)).collect()
        } else {
            vec![v_ego; TRAJECTORY_SIZE]
        };
        self.update_lane_line_mode(speed_kph, tuning.use_lane_line_speed_kph);

        let lane_change_multiplier = if self.last_desire != Desire::None || input.nav.is_active() {
            0.0
        } else {
            1.0
        };
        let fused = self.fuser.update(&FuserInput {
            sample: &model.lanes,
            path: &model.path,
            v_ego,
            curve_speed: input.nav.turn_speed_kph,
            lane_change_multiplier,
            lane_line_mode: self.lane_line_mode,
            lane_width_left: model.lane_width_left,
            lane_width_right: model.lane_width_right,
        });

        let maneuver = self.maneuver.update(&ManeuverInput {
            vehicle: input.vehicle.clone(),
            left: fused.left,
            right: fused.right,
            radar_left: input.radar_left,
            radar_right: input.radar_right,
            nav: input.nav.clone(),
            lateral_active: input.lateral_active,
            lane_change_prob: model.lane_change_prob(),
            turn_prob: model.turn_prob(),
        });
        self.last_desire = maneuver.desire;

        if !input.lateral_active {
            self.mpc.reset();
        }

        let plan = self.mpc.update(&TrajectoryInput {
            path: &fused.path,
            psi: &model.orientation,
            psi_rate: &model.orientation_rate,
            v_plan: &v_plan,
            v_ego,
            measured_curvature: input.measured_curvature,
            roll: input.roll,
            path_offset: tuning.path_offset,
            lanelines_active: fused.lanelines_active,
        });

        let lateral_text = lateral_debug_text(&fused, input.nav.turn_speed_kph);
        let debug_text = if maneuver.debug_text.is_empty() {
            lateral_text
        } else {
            format!("{} | {}", lateral_text, maneuver.debug_text)
        };
        debug!("{}", debug_text);

        LateralPlanOutput {
            plan,
            use_lane_lines: fused.lanelines_active,
            lane_width: fused.lane_width,
            lane_width_left: fused.lane_width_left,
            lane_width_right: fused.lane_width_right,
            offset: fused.offset,
            maneuver,
            debug_text,
        }
    }

    fn apply_tuning(&mut self) {
        let tuning = self.tuning.current();
        self.fuser
            .set_config(tuning.apply_to_fuser(&self.config.fuser));
        self.maneuver
            .set_config(tuning.apply_to_maneuver(&self.config.maneuver));
        self.mpc.set_weights(tuning.weights);
    }

    /// Lane mode is unusable while the model plans a strong slowdown
    fn track_model_deceleration(&mut self, velocity: &[f64]) {
        let first = velocity[0];
        let last = velocity[velocity.len() - 1];
        if last < first * DECEL_RATIO {
            self.lane_mode_possible_ticks = 0;
            self.laneless_only = true;
        } else {
            self.lane_mode_possible_ticks = self.lane_mode_possible_ticks.saturating_add(1);
            if self.lane_mode_possible_ticks > seconds_to_ticks(LANE_MODE_SETTLE_S) {
                self.laneless_only = false;
            }
        }
    }

    fn update_lane_line_mode(&mut self, speed_kph: f64, threshold_kph: f64) {
        let previous = self.lane_line_mode;
        if threshold_kph <= 0.0 || self.laneless_only {
            self.lane_line_mode = false;
        } else if speed_kph >= threshold_kph + LANE_MODE_HYSTERESIS_KPH {
            self.lane_line_mode = true;
        } else if speed_kph < threshold_kph - LANE_MODE_HYSTERESIS_KPH {
            self.lane_line_mode = false;
        }
        if previous != self.lane_line_mode {
            info!(speed_kph, enabled = self.lane_line_mode, "lane line mode changed");
        }
    }
}

fn lateral_debug_text(fused: &FusedPath, curve_speed_kph: f64) -> String {
    let mode = if fused.lanelines_active {
        "lanemode"
    } else {
        "laneless"
    };
    let detail = if fused.lanelines_active {
        format!(
            "offset={:.1}cm turn={:.0}km/h",
            fused.offset * 100.0,
            clip(curve_speed_kph, -CURVE_SPEED_DISPLAY_KPH, CURVE_SPEED_DISPLAY_KPH)
        )
    } else {
        String::new()
    };
    format!(
        "{} | {:.1}m | {:.1}m | {:.1}m | {}",
        mode, fused.lane_width_left, fused.lane_width, fused.lane_width_right, detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ModelOutput;
    use crate::PlannerError;
    use lane_fuser::{LaneLine, LaneSample};
    use lateral_mpc::clip::{max_curvature_step, MAX_CURVATURE};
    use maneuver::{LaneChangeState, ManeuverType, VehicleState};
    use signal_core::{t_idxs, PathPoint, DT_MDL};

    fn kph(v: f64) -> f64 {
        v / MS_TO_KPH
    }

    fn highway_model(v: f64) -> ModelOutput {
        let t = t_idxs();
        let mut desire_state = vec![0.0; Desire::COUNT];
        desire_state[0] = 1.0;
        ModelOutput {
            lanes: LaneSample {
                lines: [
                    LaneLine::straight(-5.4, 0.9, 0.1),
                    LaneLine::straight(-1.8, 0.9, 0.1),
                    LaneLine::straight(1.8, 0.9, 0.1),
                    LaneLine::straight(5.4, 0.9, 0.1),
                ],
                edges: [
                    LaneLine::straight(-9.0, 0.9, 0.2),
                    LaneLine::straight(9.0, 0.9, 0.2),
                ],
            },
            path: t.iter().map(|&t| PathPoint::new(v * t, 0.0, 0.0, t)).collect(),
            orientation: vec![0.0; TRAJECTORY_SIZE],
            orientation_rate: vec![0.0; TRAJECTORY_SIZE],
            velocity: vec![v; TRAJECTORY_SIZE],
            desire_state,
            lane_width_left: 3.6,
            lane_width_right: 3.6,
        }
    }

    fn highway_input(speed_kph: f64) -> PlannerInput {
        let v = kph(speed_kph);
        PlannerInput {
            vehicle: VehicleState {
                v_ego: v,
                left_lane_line: 1,
                right_lane_line: 1,
                ..Default::default()
            },
            model: highway_model(v),
            lateral_active: true,
            ..Default::default()
        }
    }

    fn lane_mode_config() -> PlannerConfig {
        PlannerConfig {
            tuning: Tuning {
                use_lane_line_speed_kph: 40.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_straight_highway_tick() {
        let mut planner = LateralPlanner::new(PlannerConfig::default());
        let out = planner.update(&highway_input(90.0));
        assert!(out.plan.solution_valid);
        assert_eq!(out.plan.solver_status, 0);
        assert!(out.plan.output_curvature.abs() < 1e-6);
        assert_eq!(out.maneuver.desire, Desire::None);
        assert!(!out.use_lane_lines);
        assert!(out.debug_text.starts_with("laneless | "));
    }

    #[test]
    fn test_lane_mode_needs_settled_model_speed() {
        let mut planner = LateralPlanner::new(lane_mode_config());
        let input = highway_input(90.0);
        for _ in 0..seconds_to_ticks(LANE_MODE_SETTLE_S) {
            planner.update(&input);
            assert!(!planner.lane_line_mode());
        }
        planner.update(&input);
        assert!(planner.lane_line_mode());

        // Model asks for a hard slowdown: straight back to laneless
        let mut braking = highway_input(90.0);
        let v = kph(90.0);
        braking.model.velocity = (0..TRAJECTORY_SIZE)
            .map(|i| v * (1.0 - 0.5 * i as f64 / (TRAJECTORY_SIZE - 1) as f64))
            .collect();
        planner.update(&braking);
        assert!(!planner.lane_line_mode());
    }

    #[test]
    fn test_lane_mode_speed_hysteresis() {
        let mut planner = LateralPlanner::new(lane_mode_config());
        let settle = seconds_to_ticks(LANE_MODE_SETTLE_S) + 2;
        for _ in 0..settle {
            planner.update(&highway_input(43.0));
        }
        assert!(planner.lane_line_mode());
        planner.update(&highway_input(39.0));
        assert!(planner.lane_line_mode(), "inside the band keeps the mode");
        planner.update(&highway_input(37.0));
        assert!(!planner.lane_line_mode());
        planner.update(&highway_input(41.0));
        assert!(!planner.lane_line_mode());
    }

    #[test]
    fn test_lane_mode_fuses_lane_path() {
        let mut planner = LateralPlanner::new(lane_mode_config());
        let mut out = planner.update(&highway_input(90.0));
        for _ in 0..60 {
            out = planner.update(&highway_input(90.0));
        }
        assert!(out.use_lane_lines);
        assert!((out.lane_width - 3.6).abs() < 0.5);
        assert!(out.debug_text.starts_with("lanemode | "));
        assert!(out.debug_text.contains("offset="));
        assert!(out.plan.solution_valid);
    }

    #[test]
    fn test_disengage_resets_state() {
        let mut planner = LateralPlanner::new(PlannerConfig::default());
        let mut input = highway_input(90.0);
        input.measured_curvature = 0.01;
        input.model.path = t_idxs()
            .iter()
            .map(|&t| PathPoint::new(25.0 * t, 0.5, 0.0, t))
            .collect();
        input.vehicle.left_blinker = true;
        let engaged = planner.update(&input);
        assert_eq!(engaged.maneuver.maneuver_type, ManeuverType::LaneChange);
        assert!(planner.trajectory().state().psi_rate() != 0.0);

        input.lateral_active = false;
        let out = planner.update(&input);
        assert_eq!(out.maneuver.lane_change_state, LaneChangeState::Off);
        assert_eq!(out.maneuver.maneuver_type, ManeuverType::None);
        assert_eq!(out.maneuver.desire, Desire::None);
        assert_eq!(planner.maneuver().state(), LaneChangeState::Off);

        // The solve on the disengaged tick starts from the zeroed state
        assert_eq!(out.plan.solver_status, 0);
        assert_eq!(out.plan.distances[0], 0.0);
        assert_eq!(out.plan.lateral_positions[0], 0.0);
        assert_eq!(out.plan.psis[0], 0.0);
        assert_eq!(out.plan.curvatures[0], 0.0);
        assert!(out.plan.output_curvature.abs() <= max_curvature_step(kph(90.0), DT_MDL) + 1e-12);
    }

    #[test]
    fn test_driver_lane_change_drops_lane_lines() {
        let mut planner = LateralPlanner::new(lane_mode_config());
        for _ in 0..60 {
            planner.update(&highway_input(90.0));
        }
        assert!(planner.update(&highway_input(90.0)).use_lane_lines);
        let mut input = highway_input(90.0);
        input.vehicle.left_blinker = true;
        input.vehicle.steering_pressed = true;
        input.vehicle.steering_torque = 1.0;
        let mut out = planner.update(&input);
        for _ in 0..3 {
            out = planner.update(&input);
        }
        assert_eq!(out.maneuver.lane_change_state, LaneChangeState::Starting);
        assert_eq!(out.maneuver.desire, Desire::LaneChangeLeft);
        assert!(!out.use_lane_lines);
    }

    #[test]
    fn test_malformed_model_degrades_without_panic() {
        let mut planner = LateralPlanner::new(PlannerConfig::default());
        planner.update(&highway_input(90.0));
        let mut input = highway_input(90.0);
        input.model.orientation.clear();
        input.model.velocity = vec![f64::NAN; 3];
        input.model.path[4].y = f64::NAN;
        input.measured_curvature = f64::NAN;
        for _ in 0..3 {
            let out = planner.update(&input);
            assert!(out.plan.output_curvature.is_finite());
            assert!(out.plan.output_curvature.abs() <= MAX_CURVATURE);
        }
        assert!(!planner.update(&input).plan.solution_valid);
    }

    struct Unavailable;

    impl TuningSource for Unavailable {
        fn read(&mut self) -> Result<Tuning, PlannerError> {
            Err(PlannerError::TuningUnavailable("unplugged".to_string()))
        }
    }

    #[test]
    fn test_tuning_failure_keeps_initial_values() {
        let config = PlannerConfig {
            tuning: Tuning {
                path_offset: 0.2,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut planner = LateralPlanner::with_tuning(config, Unavailable);
        let out = planner.update(&highway_input(90.0));
        assert_eq!(planner.tuning().path_offset, 0.2);
        assert!(out.plan.y_pts.iter().all(|y| (y - 0.2).abs() < 1e-9));
    }
}
