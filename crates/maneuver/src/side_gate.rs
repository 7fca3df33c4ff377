//! Per-side lane change safety gating

use crate::config::BsdPolicy;
use crate::input::{ManeuverInput, RadarSideInfo};
use lane_fuser::{Side, SideAvailability};
use serde::{Deserialize, Serialize};
use signal_core::seconds_to_ticks;

/// Projected distance used when no radar track is present (m)
const NO_TRACK_DISTANCE: f64 = 255.0;

/// Lane line codes at or above this mean the camera reports no lane
const LANE_CODE_NONE: i32 = 20;

/// Road edge this close keeps a freshly appeared lane latched (m)
const APPEARED_EDGE_LIMIT: f64 = 4.0;

/// Gating snapshot for one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideGateState {
    pub geometry: SideAvailability,
    /// Camera lane line code for this side
    pub lane_line_code: i32,
    /// Lane line type just switched to a dashed/edge pattern
    pub edge_detect: bool,
    /// Radar reports an object in the target zone
    pub object_detected: bool,
    /// Ticks left on the blind-spot hold
    pub bsd_hold: u32,
    /// Lane or edge geometry allows a change
    pub lane_change_available_geom: bool,
    /// Geometry allows a change and nothing blocks it
    pub lane_change_available: bool,
    /// Neighbour lane is opening up
    pub lane_available_trigger: bool,
    /// Neighbour lane line appeared recently
    pub lane_appeared: bool,
}

impl SideGateState {
    pub fn bsd_active(&self) -> bool {
        self.bsd_hold > 0
    }
}

/// Tracks obstacles, blind-spot holds and lane line codes for one side
#[derive(Debug, Clone)]
pub struct SideGate {
    side: Side,
    object_count: i32,
    object_sustain: i32,
    bsd_hold_ticks: u32,
    last_code_mod: i32,
    appeared_ticks: i32,
    state: SideGateState,
}

impl SideGate {
    pub fn new(side: Side, bsd_hold_s: f64) -> Self {
        Self {
            side,
            object_count: 0,
            object_sustain: seconds_to_ticks(0.3) as i32,
            bsd_hold_ticks: seconds_to_ticks(bsd_hold_s),
            last_code_mod: 0,
            appeared_ticks: seconds_to_ticks(0.2) as i32,
            state: SideGateState::default(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn state(&self) -> &SideGateState {
        &self.state
    }

    /// Retune the blind-spot hold; a hold already counting down is not stretched
    pub fn set_bsd_hold_s(&mut self, bsd_hold_s: f64) {
        self.bsd_hold_ticks = seconds_to_ticks(bsd_hold_s);
        self.state.bsd_hold = self.state.bsd_hold.min(self.bsd_hold_ticks);
    }

    /// Pull this side's signals out of a full tick input
    pub fn observe(&mut self, input: &ManeuverInput, policy: BsdPolicy) -> SideGateState {
        let vehicle = &input.vehicle;
        self.update(
            *input.side(self.side),
            input.radar(self.side),
            vehicle.blindspot(self.side),
            vehicle.lane_line_code(self.side),
            vehicle.v_ego,
            policy,
        )
    }

    pub fn update(
        &mut self,
        geometry: SideAvailability,
        radar: &RadarSideInfo,
        blindspot: bool,
        lane_line_code: i32,
        v_ego: f64,
        policy: BsdPolicy,
    ) -> SideGateState {
        let code_mod = lane_line_code.rem_euclid(10);
        let edge_detect = matches!(code_mod, 0 | 5) && !matches!(self.last_code_mod, 0 | 5);
        self.last_code_mod = code_mod;

        let projected = if radar.status && radar.d_rel.is_finite() && radar.v_lead.is_finite() {
            radar.d_rel + 4.0 * radar.v_lead
        } else {
            NO_TRACK_DISTANCE
        };
        if projected < 3.0 * v_ego {
            self.object_count = self.object_count.saturating_add(1).max(1);
        } else {
            self.object_count = self.object_count.saturating_sub(1).min(-1);
        }
        let object_detected = self.object_count > -self.object_sustain;

        let bsd_hold = if blindspot && !policy.ignores() {
            self.bsd_hold_ticks
        } else {
            self.state.bsd_hold.saturating_sub(1)
        };
        let bsd_active = bsd_hold > 0 && !policy.ignores();

        let lane_change_available_geom = (geometry.lane_available || geometry.edge_available)
            && lane_line_code < LANE_CODE_NONE;
        let lane_change_available = lane_change_available_geom && !object_detected && !bsd_active;

        let lane_available_trigger =
            geometry.lane_width_diff > 0.8 && geometry.lane_width < geometry.dist_to_edge;
        let appeared_now = geometry.lane_exist_counter >= self.appeared_ticks;
        let lane_appeared = (self.state.lane_appeared || appeared_now)
            && geometry.dist_to_edge < APPEARED_EDGE_LIMIT;

        self.state = SideGateState {
            geometry,
            lane_line_code,
            edge_detect,
            object_detected,
            bsd_hold,
            lane_change_available_geom,
            lane_change_available,
            lane_available_trigger,
            lane_appeared,
        };
        self.state
    }

    /// Short gating summary for the debug line
    pub fn debug_text(&self, auto_enabled: bool) -> String {
        let s = &self.state;
        format!(
            "{}:ALC={},L={},E={},T={},A={},OBJ={},BSD={}",
            self.side.as_str(),
            auto_enabled,
            s.geometry.lane_available,
            s.geometry.edge_available,
            s.lane_available_trigger,
            s.lane_appeared,
            s.object_detected,
            s.bsd_active(),
        )
    }
}
