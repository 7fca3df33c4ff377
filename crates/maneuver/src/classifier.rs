//! Turn vs. lane-change classification

use crate::config::ClassifierThresholds;
use crate::input::{AtcType, VehicleState};
use crate::side_gate::SideGateState;
use crate::types::{BlinkerState, ManeuverType};
use signal_core::{seconds_to_ticks, MS_TO_KPH};

/// Turn likelihood score for the side the blinker points at
pub fn turn_score(
    vehicle: &VehicleState,
    side: &SideGateState,
    turn_desire: bool,
    atc: AtcType,
    th: &ClassifierThresholds,
) -> i32 {
    let v_kph = vehicle.v_ego * MS_TO_KPH;
    let slow = v_kph < th.braking_speed_kph;
    let geom = &side.geometry;
    let mut score = 0;

    if v_kph < th.turn_speed_kph || (slow && vehicle.a_ego < th.braking_accel) {
        score += 1;
    }
    // No neighbour lane and no room to the road edge
    if slow && !geom.lane_available && !geom.edge_available {
        score += 1;
    }
    // Lane line recently lost, typical at intersections
    if slow && geom.lane_exist_counter < seconds_to_ticks(th.lane_loss_s) as i32 {
        score += 1;
    }
    if turn_desire {
        score += 1;
    }
    if atc.is_turn() {
        score += th.nav_turn_score;
    } else if atc.is_fork() {
        score += th.nav_fork_score;
    }
    score
}

/// Classify the maneuver the blinker asks for.
///
/// A turn-level score without a far road edge keeps `old`, so the
/// classification does not oscillate near the boundary.
pub fn classify(
    blinker: BlinkerState,
    vehicle: &VehicleState,
    side: &SideGateState,
    turn_desire: bool,
    atc: AtcType,
    old: ManeuverType,
    th: &ClassifierThresholds,
) -> ManeuverType {
    if !blinker.is_directional() {
        return ManeuverType::None;
    }
    if turn_score(vehicle, side, turn_desire, atc, th) >= th.decision_score {
        if side.geometry.dist_to_edge_far > th.far_edge_m {
            ManeuverType::Turn
        } else {
            old
        }
    } else {
        ManeuverType::LaneChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lane_fuser::SideAvailability;

    fn vehicle(kph: f64, accel: f64) -> VehicleState {
        VehicleState {
            v_ego: kph / MS_TO_KPH,
            a_ego: accel,
            ..Default::default()
        }
    }

    fn side(lane: bool, exist: i32, edge_far: f64) -> SideGateState {
        SideGateState {
            geometry: SideAvailability {
                lane_available: lane,
                edge_available: lane,
                lane_exist_counter: exist,
                dist_to_edge_far: edge_far,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_intersection_is_turn() {
        let th = ClassifierThresholds::default();
        let s = side(false, -5, 10.0);
        let v = vehicle(15.0, 0.0);
        assert_eq!(turn_score(&v, &s, true, AtcType::TurnLeft, &th), 6);
        assert_eq!(
            classify(BlinkerState::Left, &v, &s, true, AtcType::TurnLeft, ManeuverType::None, &th),
            ManeuverType::Turn
        );
    }

    #[test]
    fn test_highway_is_lane_change() {
        let th = ClassifierThresholds::default();
        let s = side(true, 100, 8.0);
        let v = vehicle(90.0, 0.0);
        assert_eq!(
            classify(BlinkerState::Right, &v, &s, false, AtcType::None, ManeuverType::None, &th),
            ManeuverType::LaneChange
        );
    }

    #[test]
    fn test_close_edge_keeps_previous() {
        let th = ClassifierThresholds::default();
        let s = side(false, -5, 2.0);
        let v = vehicle(20.0, 0.0);
        assert_eq!(
            classify(BlinkerState::Left, &v, &s, false, AtcType::None, ManeuverType::LaneChange, &th),
            ManeuverType::LaneChange
        );
        assert_eq!(
            classify(BlinkerState::Left, &v, &s, false, AtcType::None, ManeuverType::None, &th),
            ManeuverType::None
        );
    }

    #[test]
    fn test_fork_hint_biases_to_lane_change() {
        let th = ClassifierThresholds::default();
        let s = side(true, 100, 10.0);
        let v = vehicle(25.0, 0.0);
        // Low speed and model turn desire (+2) cancelled by the fork (-2)
        assert_eq!(turn_score(&v, &s, true, AtcType::ForkRight, &th), 0);
        assert_eq!(
            classify(BlinkerState::Right, &v, &s, true, AtcType::ForkRight, ManeuverType::Turn, &th),
            ManeuverType::LaneChange
        );
    }

    #[test]
    fn test_no_blinker_is_none() {
        let th = ClassifierThresholds::default();
        let s = side(false, 0, 10.0);
        assert_eq!(
            classify(BlinkerState::Both, &vehicle(10.0, 0.0), &s, true, AtcType::None, ManeuverType::Turn, &th),
            ManeuverType::None
        );
    }
}
