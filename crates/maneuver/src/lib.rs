//! Maneuver State Machine
//!
//! Decides every tick whether the vehicle may turn or change lanes:
//! - Driver/navigation blinker fusion with conflict voiding
//! - Turn vs. lane-change classification
//! - Lane change FSM (Off → PreLaneChange → Starting → Finishing)
//! - Blind-spot, radar object and steering-override gating

pub mod blinker;
pub mod classifier;
pub mod config;
pub mod input;
pub mod side_gate;
pub mod types;

pub use blinker::{AtcStatus, BlinkerFusion, BlinkerOutput};
pub use classifier::{classify, turn_score};
pub use config::{BsdPolicy, ClassifierThresholds, ManeuverConfig};
pub use input::{AtcType, ManeuverInput, NavCommand, NavigationHint, RadarSideInfo, VehicleState};
pub use side_gate::{SideGate, SideGateState};
pub use types::{
    BlinkerState, Desire, LaneChangeDirection, LaneChangeState, ManeuverType, TurnDirection,
};

use lane_fuser::Side;
use serde::{Deserialize, Serialize};
use signal_core::{seconds_to_ticks, DT_MDL, MS_TO_KPH};
use tracing::{debug, info};

/// Model turn probability above which vision agrees on a turn
const TURN_DESIRE_PROB: f64 = 0.1;

/// Lane change probability below which the model considers the change done
const LANE_CHANGE_DONE_PROB: f64 = 0.02;

/// Result of one state machine tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManeuverOutput {
    pub desire: Desire,
    pub maneuver_type: ManeuverType,
    pub lane_change_state: LaneChangeState,
    pub lane_change_direction: LaneChangeDirection,
    pub turn_direction: TurnDirection,
    /// Lane line weight, faded out while the change is starting
    pub lane_change_ll_prob: f64,
    pub blinker: BlinkerOutput,
    pub atc_status: AtcStatus,
    pub blinker_ignore: bool,
    pub lane_change_available_left: bool,
    pub lane_change_available_right: bool,
    pub left: SideGateState,
    pub right: SideGateState,
    pub debug_text: String,
}

/// Lane change / turn state machine
pub struct ManeuverStateMachine {
    config: ManeuverConfig,
    blinkers: BlinkerFusion,
    left: SideGate,
    right: SideGate,
    state: LaneChangeState,
    direction: LaneChangeDirection,
    turn_direction: TurnDirection,
    maneuver_type: ManeuverType,
    ll_prob: f64,
    episode_ticks: u32,
    delay_ticks: u32,
    turn_disable_ticks: u32,
    keep_pulse_ticks: u32,
    auto_enable: bool,
    next_lane_change: bool,
    prev_desire_enabled: bool,
    blinker: BlinkerOutput,
    desire: Desire,
    debug_text: String,
}

impl ManeuverStateMachine {
    pub fn new(config: ManeuverConfig) -> Self {
        Self {
            blinkers: BlinkerFusion::new(seconds_to_ticks(config.nav_command_hold_s)),
            left: SideGate::new(Side::Left, config.bsd_hold_s),
            right: SideGate::new(Side::Right, config.bsd_hold_s),
            config,
            state: LaneChangeState::Off,
            direction: LaneChangeDirection::None,
            turn_direction: TurnDirection::None,
            maneuver_type: ManeuverType::None,
            ll_prob: 1.0,
            episode_ticks: 0,
            delay_ticks: 0,
            turn_disable_ticks: 0,
            keep_pulse_ticks: 0,
            auto_enable: false,
            next_lane_change: false,
            prev_desire_enabled: false,
            blinker: BlinkerOutput::default(),
            desire: Desire::None,
            debug_text: String::new(),
        }
    }

    pub fn config(&self) -> &ManeuverConfig {
        &self.config
    }

    /// Swap tuning between ticks, hold lengths included
    pub fn set_config(&mut self, config: ManeuverConfig) {
        self.blinkers
            .set_hold_ticks(seconds_to_ticks(config.nav_command_hold_s));
        self.left.set_bsd_hold_s(config.bsd_hold_s);
        self.right.set_bsd_hold_s(config.bsd_hold_s);
        self.config = config;
    }

    pub fn state(&self) -> LaneChangeState {
        self.state
    }

    pub fn maneuver_type(&self) -> ManeuverType {
        self.maneuver_type
    }

    /// Desire emitted on the last tick
    pub fn desire(&self) -> Desire {
        self.desire
    }

    pub fn lane_change_ll_prob(&self) -> f64 {
        self.ll_prob
    }

    /// Hard cut to Off, as on disengagement
    pub fn cut(&mut self) {
        if self.state != LaneChangeState::Off || self.maneuver_type != ManeuverType::None {
            info!(state = ?self.state, maneuver = self.maneuver_type.as_str(), "maneuver reset");
        }
        self.state = LaneChangeState::Off;
        self.direction = LaneChangeDirection::None;
        self.turn_direction = TurnDirection::None;
        self.maneuver_type = ManeuverType::None;
        self.episode_ticks = 0;
        self.desire = Desire::None;
    }

    /// Full reset, including per-side history
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn update(&mut self, input: &ManeuverInput) -> ManeuverOutput {
        if let Err(e) = input.vehicle.validate() {
            debug!(error = %e, "vehicle state rejected, holding maneuver state");
            if !input.lateral_active {
                self.cut();
            }
            return self.output();
        }

        let vehicle = &input.vehicle;
        let v_ego = vehicle.v_ego;
        let below_speed = v_ego * MS_TO_KPH < self.config.lane_change_speed_min_kph;
        self.delay_ticks = self.delay_ticks.saturating_sub(1);

        let left = self.left.observe(input, self.config.bsd_policy);
        let right = self.right.observe(input, self.config.bsd_policy);

        let turn_desire = input.turn_prob > TURN_DESIRE_PROB;
        if vehicle.steering_angle_deg.abs() > self.config.turn_disable_angle_deg {
            self.turn_disable_ticks = seconds_to_ticks(self.config.turn_disable_s);
        } else {
            self.turn_disable_ticks = self.turn_disable_ticks.saturating_sub(1);
        }

        let blinker = self.blinkers.update(
            vehicle,
            &input.nav,
            self.config.lane_change_need_torque,
        );
        self.blinker = blinker;
        let desire_enabled = blinker.desire_enabled;
        let target = blinker.effective.side().map(|side| match side {
            Side::Left => (side, left),
            Side::Right => (side, right),
        });

        let mut auto_trigger = false;
        match target {
            Some((side, gate)) if desire_enabled => {
                auto_trigger = if self.blinkers.command_pending() {
                    gate.lane_change_available
                } else {
                    self.auto_enable
                        && gate.geometry.edge_available
                        && (gate.lane_available_trigger || gate.lane_appeared)
                        && !gate.object_detected
                        && !gate.bsd_active()
                };
                self.debug_text = match side {
                    Side::Left => self.left.debug_text(self.auto_enable),
                    Side::Right => self.right.debug_text(self.auto_enable),
                };
            }
            _ => {
                self.auto_enable = false;
                self.next_lane_change = false;
            }
        }

        let timed_out =
            self.episode_ticks >= seconds_to_ticks(self.config.lane_change_time_max_s);
        if !input.lateral_active || timed_out {
            if timed_out {
                info!(state = ?self.state, "lane change timed out");
            }
            self.cut();
        } else {
            let new_type = match target {
                Some((_, gate)) if desire_enabled => classify(
                    blinker.effective,
                    vehicle,
                    &gate,
                    turn_desire,
                    input.nav.atc,
                    self.maneuver_type,
                    &self.config.classifier,
                ),
                _ => ManeuverType::None,
            };

            if self.maneuver_type == ManeuverType::LaneChange
                && new_type == ManeuverType::Turn
                && self.state.is_idle()
            {
                info!("lane change geometry now looks like a turn, reclassifying");
                self.state = LaneChangeState::Off;
                self.direction = LaneChangeDirection::None;
                self.maneuver_type = ManeuverType::None;
            } else if self.state.is_idle() {
                if new_type != self.maneuver_type {
                    debug!(from = self.maneuver_type.as_str(), to = new_type.as_str(), "maneuver classified");
                }
                self.maneuver_type = new_type;
            }

            let turn_side = target.map(|(side, _)| side);
            match turn_side {
                Some(side)
                    if desire_enabled
                        && self.maneuver_type == ManeuverType::Turn
                        && self.config.enable_turn_desires =>
                {
                    self.state = LaneChangeState::Off;
                    if self.turn_disable_ticks > 0 {
                        self.turn_direction = TurnDirection::None;
                        self.direction = LaneChangeDirection::None;
                    } else {
                        self.turn_direction = side.into();
                        self.direction = self.turn_direction.into();
                    }
                }
                _ => {
                    self.turn_direction = TurnDirection::None;
                    self.step_lane_change(
                        input,
                        target,
                        desire_enabled,
                        below_speed,
                        auto_trigger,
                    );
                }
            }
        }

        if self.state.is_idle() {
            self.episode_ticks = 0;
        } else {
            self.episode_ticks = self.episode_ticks.saturating_add(1);
        }
        self.prev_desire_enabled = desire_enabled;

        // Driver steering against the maneuver cancels it outright
        if let Some((side, _)) = target {
            if vehicle.steering_pressed
                && vehicle.torque_toward(side.opposite())
                && self.state != LaneChangeState::Off
            {
                info!(side = side.as_str(), "lane change cancelled by driver steering");
                metrics::counter!("lane_change_cancel_total").increment(1);
                self.state = LaneChangeState::Off;
                self.direction = LaneChangeDirection::None;
                self.blinkers.ignore_until_cleared();
            }
        }

        self.desire = if self.turn_direction != TurnDirection::None {
            self.direction = self.turn_direction.into();
            Desire::from_turn(self.turn_direction)
        } else {
            Desire::from_lane_change(self.direction, self.state)
        };

        match self.state {
            LaneChangeState::Off | LaneChangeState::Starting => self.keep_pulse_ticks = 0,
            // Keep desires only reach here if the lookup table grows them;
            // `from_lane_change` yields none today
            LaneChangeState::PreLaneChange => {
                self.keep_pulse_ticks += 1;
                if self.keep_pulse_ticks > seconds_to_ticks(self.config.keep_pulse_s) {
                    self.keep_pulse_ticks = 0;
                } else if self.desire.is_keep() {
                    self.desire = Desire::None;
                }
            }
            LaneChangeState::Finishing => {}
        }

        self.output()
    }

    fn step_lane_change(
        &mut self,
        input: &ManeuverInput,
        target: Option<(Side, SideGateState)>,
        desire_enabled: bool,
        below_speed: bool,
        auto_trigger: bool,
    ) {
        let vehicle = &input.vehicle;
        match self.state {
            LaneChangeState::Off => {
                if let Some((side, gate)) = target {
                    if desire_enabled && !self.prev_desire_enabled && !below_speed {
                        self.state = LaneChangeState::PreLaneChange;
                        self.ll_prob = 1.0;
                        self.delay_ticks = seconds_to_ticks(self.config.lane_change_delay_s);
                        // An existing neighbour lane argues against an automatic nudge
                        self.auto_enable = !(gate.geometry.lane_exist_counter > 0
                            || gate.lane_change_available_geom);
                        self.next_lane_change = false;
                        info!(side = side.as_str(), auto = self.auto_enable, "lane change armed");
                    }
                }
            }
            LaneChangeState::PreLaneChange => {
                let Some((side, gate)) = target else {
                    self.state = LaneChangeState::Off;
                    self.direction = LaneChangeDirection::None;
                    return;
                };
                self.direction = side.into();

                let torque_applied = vehicle.steering_pressed && vehicle.torque_toward(side);
                let policy = self.config.bsd_policy;
                let bsd_active = gate.bsd_active() && !policy.ignores();

                if !gate.geometry.lane_available
                    || gate.geometry.lane_exist_counter < seconds_to_ticks(2.0) as i32
                {
                    self.auto_enable = true;
                }

                if !desire_enabled || below_speed {
                    self.state = LaneChangeState::Off;
                    self.direction = LaneChangeDirection::None;
                    return;
                }

                let start_gate = (gate.lane_change_available_geom && self.delay_ticks == 0)
                    || gate.edge_detect;
                if !start_gate {
                    return;
                }
                let start = if bsd_active {
                    torque_applied && policy != BsdPolicy::Block
                } else if self.config.lane_change_need_torque > 0 || self.next_lane_change {
                    torque_applied
                } else if self.blinker.driver_enabled {
                    gate.lane_change_available
                } else {
                    (torque_applied || auto_trigger || gate.edge_detect)
                        && gate.lane_change_available
                };
                if start {
                    info!(side = side.as_str(), torque = torque_applied, "lane change starting");
                    metrics::counter!("lane_change_started_total").increment(1);
                    self.state = LaneChangeState::Starting;
                }
            }
            LaneChangeState::Starting => {
                self.ll_prob = (self.ll_prob - 2.0 * DT_MDL).max(0.0);
                if input.lane_change_prob < LANE_CHANGE_DONE_PROB && self.ll_prob < 0.01 {
                    debug!("lane change finishing");
                    self.state = LaneChangeState::Finishing;
                }
            }
            LaneChangeState::Finishing => {
                self.ll_prob = (self.ll_prob + DT_MDL).min(1.0);
                if self.ll_prob > 0.99 {
                    self.direction = LaneChangeDirection::None;
                    if desire_enabled {
                        self.state = LaneChangeState::PreLaneChange;
                        self.next_lane_change = true;
                    } else {
                        self.state = LaneChangeState::Off;
                    }
                    info!(next = self.next_lane_change, "lane change complete");
                }
            }
        }
    }

    fn output(&self) -> ManeuverOutput {
        let left = *self.left.state();
        let right = *self.right.state();
        ManeuverOutput {
            desire: self.desire,
            maneuver_type: self.maneuver_type,
            lane_change_state: self.state,
            lane_change_direction: self.direction,
            turn_direction: self.turn_direction,
            lane_change_ll_prob: self.ll_prob,
            blinker: self.blinker,
            atc_status: self.blinkers.status(),
            blinker_ignore: self.blinkers.is_ignoring(),
            lane_change_available_left: left.lane_change_available,
            lane_change_available_right: right.lane_change_available,
            left,
            right,
            debug_text: self.debug_text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lane_fuser::SideAvailability;
    use proptest::prelude::*;

    fn kph(v: f64) -> f64 {
        v / MS_TO_KPH
    }

    fn open_side() -> SideAvailability {
        SideAvailability {
            lane_available: true,
            edge_available: true,
            lane_exist_counter: 100,
            dist_to_edge: 7.0,
            dist_to_edge_far: 7.0,
            lane_width: 3.5,
            cur_lane_line_prob: 0.9,
            ..Default::default()
        }
    }

    fn highway() -> ManeuverInput {
        ManeuverInput {
            vehicle: VehicleState {
                v_ego: kph(90.0),
                left_lane_line: 1,
                right_lane_line: 1,
                ..Default::default()
            },
            left: open_side(),
            right: open_side(),
            lateral_active: true,
            lane_change_prob: 0.0,
            ..Default::default()
        }
    }

    fn warm_up(fsm: &mut ManeuverStateMachine, input: &ManeuverInput) {
        for _ in 0..10 {
            fsm.update(input);
        }
    }

    fn start_right_change(fsm: &mut ManeuverStateMachine) -> ManeuverInput {
        let mut input = highway();
        warm_up(fsm, &input);
        input.vehicle.right_blinker = true;
        input.vehicle.steering_pressed = true;
        input.vehicle.steering_torque = -1.0;
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
        input
    }

    #[test]
    fn test_intersection_turn_from_navigation() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let bare = SideAvailability {
            dist_to_edge: 10.0,
            dist_to_edge_far: 10.0,
            ..Default::default()
        };
        let input = ManeuverInput {
            vehicle: VehicleState {
                v_ego: kph(15.0),
                ..Default::default()
            },
            left: bare,
            right: bare,
            nav: NavigationHint {
                atc: AtcType::TurnLeft,
                ..Default::default()
            },
            lateral_active: true,
            turn_prob: 0.8,
            ..Default::default()
        };

        let first = fsm.update(&input);
        assert_eq!(first.desire, Desire::None, "new hint type is held for a tick");

        let second = fsm.update(&input);
        assert_eq!(second.maneuver_type, ManeuverType::Turn);
        assert_eq!(second.desire, Desire::TurnLeft);
        assert_eq!(second.lane_change_state, LaneChangeState::Off);
        assert_eq!(second.lane_change_direction, LaneChangeDirection::Left);
    }

    #[test]
    fn test_highway_lane_change_with_torque() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::torque_required());
        let input = start_right_change(&mut fsm);
        let out = fsm.update(&input);
        assert_eq!(out.maneuver_type, ManeuverType::LaneChange);
        assert_eq!(out.desire, Desire::LaneChangeRight);
    }

    #[test]
    fn test_torque_required_waits_for_driver() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::torque_required());
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.vehicle.left_blinker = true;
        for _ in 0..20 {
            let out = fsm.update(&input);
            assert_eq!(out.lane_change_state, LaneChangeState::PreLaneChange);
            assert_eq!(out.desire, Desire::None);
        }
        input.vehicle.steering_pressed = true;
        input.vehicle.steering_torque = 0.8;
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
    }

    #[test]
    fn test_driver_counter_steer_cancels() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);

        input.vehicle.steering_torque = 1.2;
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
        assert_eq!(out.lane_change_direction, LaneChangeDirection::None);
        assert_eq!(out.desire, Desire::None);
        assert!(out.blinker_ignore);

        // Blinker still on: no rising edge, stays off
        input.vehicle.steering_pressed = false;
        for _ in 0..5 {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Off);
        }

        input.vehicle.right_blinker = false;
        assert!(!fsm.update(&input).blinker_ignore);
    }

    #[test]
    fn test_full_cycle_returns_to_off() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);
        input.vehicle.steering_pressed = false;
        input.vehicle.steering_torque = 0.0;
        input.lane_change_prob = 0.9;
        for _ in 0..10 {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
        }
        assert!(fsm.lane_change_ll_prob() < 0.01);

        input.lane_change_prob = 0.0;
        input.vehicle.right_blinker = false;
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Finishing);

        let mut out = fsm.update(&input);
        for _ in 0..30 {
            out = fsm.update(&input);
        }
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
        assert!((out.lane_change_ll_prob - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_held_blinker_loops_to_pre() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);
        input.vehicle.steering_pressed = false;
        input.vehicle.steering_torque = 0.0;

        let mut saw_finishing = false;
        let mut out = fsm.update(&input);
        for _ in 0..40 {
            out = fsm.update(&input);
            saw_finishing |= out.lane_change_state == LaneChangeState::Finishing;
            if out.lane_change_state == LaneChangeState::PreLaneChange {
                break;
            }
        }
        assert!(saw_finishing);
        assert_eq!(out.lane_change_state, LaneChangeState::PreLaneChange);

        // A looped change needs torque again
        for _ in 0..5 {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);
        }
    }

    #[test]
    fn test_blind_spot_block_policy() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig {
            bsd_policy: BsdPolicy::Block,
            ..Default::default()
        });
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.vehicle.right_blinker = true;
        input.vehicle.right_blindspot = true;
        input.vehicle.steering_pressed = true;
        input.vehicle.steering_torque = -1.0;
        for _ in 0..10 {
            let out = fsm.update(&input);
            assert_eq!(out.lane_change_state, LaneChangeState::PreLaneChange);
            assert!(out.right.bsd_active());
        }
    }

    #[test]
    fn test_blind_spot_warn_allows_torque() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.vehicle.left_blinker = true;
        input.vehicle.left_blindspot = true;
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);

        input.vehicle.steering_pressed = true;
        input.vehicle.steering_torque = 1.0;
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
    }

    #[test]
    fn test_blinker_conflict_voids_navigation() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = highway();
        input.vehicle.left_blinker = true;
        input.nav.atc = AtcType::TurnRight;

        let out = fsm.update(&input);
        assert_eq!(out.blinker.effective, BlinkerState::Left);
        assert_eq!(out.atc_status, AtcStatus::Voided);

        let out = fsm.update(&input);
        assert_eq!(out.atc_status, AtcStatus::Voided);

        input.vehicle.left_blinker = false;
        let out = fsm.update(&input);
        assert_ne!(out.atc_status, AtcStatus::Voided);
    }

    #[test]
    fn test_disengage_is_hard_cut() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);
        input.lateral_active = false;
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
        assert_eq!(out.maneuver_type, ManeuverType::None);
        assert_eq!(out.desire, Desire::None);
    }

    #[test]
    fn test_below_speed_never_arms() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = highway();
        input.vehicle.v_ego = kph(25.0);
        input.left.dist_to_edge_far = 2.0;
        warm_up(&mut fsm, &input);
        input.vehicle.left_blinker = true;
        for _ in 0..10 {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Off);
        }
    }

    #[test]
    fn test_steering_angle_disables_turn() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let bare = SideAvailability {
            dist_to_edge_far: 10.0,
            ..Default::default()
        };
        let mut input = ManeuverInput {
            vehicle: VehicleState {
                v_ego: kph(10.0),
                left_blinker: true,
                steering_angle_deg: 120.0,
                ..Default::default()
            },
            left: bare,
            right: bare,
            lateral_active: true,
            turn_prob: 0.5,
            ..Default::default()
        };
        let out = fsm.update(&input);
        assert_eq!(out.maneuver_type, ManeuverType::Turn);
        assert_eq!(out.desire, Desire::None);

        input.vehicle.steering_angle_deg = 0.0;
        for _ in 0..50 {
            assert_eq!(fsm.update(&input).desire, Desire::None);
        }
    }

    #[test]
    fn test_started_change_times_out() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);
        input.vehicle.steering_pressed = false;
        input.vehicle.steering_torque = 0.0;
        input.lane_change_prob = 0.9;

        let limit = seconds_to_ticks(ManeuverConfig::default().lane_change_time_max_s);
        for _ in 1..limit {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
        }
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
        assert_eq!(out.maneuver_type, ManeuverType::None);
        assert_eq!(out.desire, Desire::None);

        // Blinker still held: no new rising edge
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Off);
    }

    #[test]
    fn test_idle_lane_change_reclassified_as_turn() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::torque_required());
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.vehicle.left_blinker = true;
        fsm.update(&input);
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::PreLaneChange);
        assert_eq!(out.maneuver_type, ManeuverType::LaneChange);

        // Slowing down with vision seeing a turn
        input.vehicle.v_ego = kph(15.0);
        input.turn_prob = 0.8;
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
        assert_eq!(out.maneuver_type, ManeuverType::None);
        assert_eq!(out.desire, Desire::None);

        let out = fsm.update(&input);
        assert_eq!(out.maneuver_type, ManeuverType::Turn);
        assert_eq!(out.turn_direction, TurnDirection::Left);
        assert_eq!(out.desire, Desire::TurnLeft);
    }

    #[test]
    fn test_navigation_command_starts_change() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.nav.command_index = 1;
        input.nav.command = "LANECHANGE".to_string();
        input.nav.command_arg = "LEFT".to_string();

        let out = fsm.update(&input);
        assert!(!out.blinker.driver_enabled);
        assert_eq!(out.blinker.effective, BlinkerState::Left);
        assert_eq!(out.lane_change_state, LaneChangeState::PreLaneChange);

        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Starting);
        assert_eq!(out.lane_change_direction, LaneChangeDirection::Left);
        assert_eq!(out.desire, Desire::LaneChangeLeft);
    }

    #[test]
    fn test_lane_change_delay_holds_start() {
        let config = ManeuverConfig {
            lane_change_delay_s: 1.0,
            ..Default::default()
        };
        let delay = seconds_to_ticks(config.lane_change_delay_s);
        let mut fsm = ManeuverStateMachine::new(config);
        let mut input = highway();
        warm_up(&mut fsm, &input);
        input.vehicle.left_blinker = true;

        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);
        for _ in 1..delay {
            assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::PreLaneChange);
        }
        assert_eq!(fsm.update(&input).lane_change_state, LaneChangeState::Starting);
    }

    #[test]
    fn test_set_config_retunes_holds() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        fsm.set_config(ManeuverConfig {
            bsd_hold_s: 0.5,
            ..Default::default()
        });
        let mut input = highway();
        input.vehicle.right_blindspot = true;
        let out = fsm.update(&input);
        assert_eq!(out.right.bsd_hold, seconds_to_ticks(0.5));

        input.vehicle.right_blindspot = false;
        let mut out = out;
        for _ in 0..seconds_to_ticks(0.5) {
            out = fsm.update(&input);
        }
        assert!(!out.right.bsd_active());
    }

    #[test]
    fn test_nan_vehicle_state_holds() {
        let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
        let mut input = start_right_change(&mut fsm);
        input.vehicle.v_ego = f64::NAN;
        let out = fsm.update(&input);
        assert_eq!(out.lane_change_state, LaneChangeState::Starting);
    }

    fn arb_tick() -> impl Strategy<Value = (u8, f64, bool, bool, f64, f64, u8, bool)> {
        (
            0u8..4,
            -2.0f64..2.0,
            any::<bool>(),
            prop::bool::weighted(0.95),
            0.0f64..40.0,
            0.0f64..1.0,
            0u8..4,
            any::<bool>(),
        )
    }

    proptest! {
        #[test]
        fn prop_fsm_safety(ticks in prop::collection::vec(arb_tick(), 1..400)) {
            let mut fsm = ManeuverStateMachine::new(ManeuverConfig::default());
            let limit = seconds_to_ticks(10.0);
            let mut prev = LaneChangeState::Off;
            let mut active_run = 0u32;
            for (blinker, torque, pressed, lateral, v, lc_prob, atc, bsd) in ticks {
                let mut input = highway();
                input.vehicle.left_blinker = blinker & 1 != 0;
                input.vehicle.right_blinker = blinker & 2 != 0;
                input.vehicle.steering_torque = torque;
                input.vehicle.steering_pressed = pressed;
                input.vehicle.v_ego = v;
                input.vehicle.right_blindspot = bsd;
                input.lateral_active = lateral;
                input.lane_change_prob = lc_prob;
                input.nav.atc = match atc {
                    0 => AtcType::None,
                    1 => AtcType::TurnLeft,
                    2 => AtcType::ForkRight,
                    _ => AtcType::AtcLeft,
                };

                let out = fsm.update(&input);
                let state = out.lane_change_state;
                if prev == LaneChangeState::Off {
                    prop_assert!(
                        state == LaneChangeState::Off || state == LaneChangeState::PreLaneChange,
                        "Off jumped to {:?}", state
                    );
                }
                if !lateral {
                    prop_assert_eq!(state, LaneChangeState::Off);
                }
                if matches!(state, LaneChangeState::Starting | LaneChangeState::Finishing) {
                    active_run += 1;
                    prop_assert!(active_run <= limit);
                } else {
                    active_run = 0;
                }
                prev = state;
            }
        }
    }
}
