//! Snapshot of everything one planning tick reads

use lane_fuser::LaneSample;
use maneuver::{Desire, NavigationHint, RadarSideInfo, VehicleState};
use serde::{Deserialize, Serialize};
use signal_core::PathPoint;

/// Vision model output for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOutput {
    /// Lane lines and road edges
    pub lanes: LaneSample,
    /// Planned path, positive y right
    pub path: Vec<PathPoint>,
    /// Planned heading per knot (rad)
    pub orientation: Vec<f64>,
    /// Planned yaw rate per knot (rad/s)
    pub orientation_rate: Vec<f64>,
    /// Planned forward speed per knot (m/s)
    pub velocity: Vec<f64>,
    /// Probability per `Desire` index
    pub desire_state: Vec<f64>,
    /// Model width of the neighbouring lanes (m, 0 when unknown)
    pub lane_width_left: f64,
    pub lane_width_right: f64,
}

impl ModelOutput {
    pub fn desire_prob(&self, desire: Desire) -> f64 {
        self.desire_state
            .get(desire.index())
            .copied()
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
    }

    /// Probability the model sees a turn
    pub fn turn_prob(&self) -> f64 {
        self.desire_prob(Desire::TurnLeft) + self.desire_prob(Desire::TurnRight)
    }

    /// Probability the model sees a lane change
    pub fn lane_change_prob(&self) -> f64 {
        self.desire_prob(Desire::LaneChangeLeft) + self.desire_prob(Desire::LaneChangeRight)
    }
}

/// One tick of planner input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerInput {
    pub vehicle: VehicleState,
    pub model: ModelOutput,
    pub nav: NavigationHint,
    pub radar_left: RadarSideInfo,
    pub radar_right: RadarSideInfo,
    /// Curvature the car is driving now (1/m)
    pub measured_curvature: f64,
    /// Road roll (rad)
    pub roll: f64,
    /// Lateral control engaged
    pub lateral_active: bool,
}
