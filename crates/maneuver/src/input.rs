//! Per-tick inputs, typed at the boundary

use lane_fuser::{Side, SideAvailability};
use serde::{Deserialize, Serialize};
use signal_core::SignalError;

/// Vehicle signals snapshotted at the start of a tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    /// Speed (m/s)
    pub v_ego: f64,
    /// Longitudinal acceleration (m/s²)
    pub a_ego: f64,
    pub steering_angle_deg: f64,
    /// Driver torque, positive steers left
    pub steering_torque: f64,
    pub steering_pressed: bool,
    pub left_blinker: bool,
    pub right_blinker: bool,
    pub left_blindspot: bool,
    pub right_blindspot: bool,
    /// Lane line type codes reported by the camera (>= 20 means no lane)
    pub left_lane_line: i32,
    pub right_lane_line: i32,
    pub standstill: bool,
}

impl VehicleState {
    pub fn validate(&self) -> Result<(), SignalError> {
        for (field, value) in [
            ("v_ego", self.v_ego),
            ("a_ego", self.a_ego),
            ("steering_angle_deg", self.steering_angle_deg),
            ("steering_torque", self.steering_torque),
        ] {
            if !value.is_finite() {
                return Err(SignalError::NonFinite { field, index: 0 });
            }
        }
        Ok(())
    }

    pub fn blindspot(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left_blindspot,
            Side::Right => self.right_blindspot,
        }
    }

    pub fn lane_line_code(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.left_lane_line,
            Side::Right => self.right_lane_line,
        }
    }

    /// Driver torque points toward `side`
    pub fn torque_toward(&self, side: Side) -> bool {
        match side {
            Side::Left => self.steering_torque > 0.0,
            Side::Right => self.steering_torque < 0.0,
        }
    }
}

/// Auto-turn-control hint from navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AtcType {
    #[default]
    None,
    TurnLeft,
    TurnRight,
    ForkLeft,
    ForkRight,
    AtcLeft,
    AtcRight,
}

impl AtcType {
    /// Wire string; anything unrecognised is `None`
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "turn left" => AtcType::TurnLeft,
            "turn right" => AtcType::TurnRight,
            "fork left" => AtcType::ForkLeft,
            "fork right" => AtcType::ForkRight,
            "atc left" => AtcType::AtcLeft,
            "atc right" => AtcType::AtcRight,
            _ => AtcType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AtcType::None => "",
            AtcType::TurnLeft => "turn left",
            AtcType::TurnRight => "turn right",
            AtcType::ForkLeft => "fork left",
            AtcType::ForkRight => "fork right",
            AtcType::AtcLeft => "atc left",
            AtcType::AtcRight => "atc right",
        }
    }

    pub fn is_turn(&self) -> bool {
        matches!(self, AtcType::TurnLeft | AtcType::TurnRight)
    }

    /// Fork or assisted-turn-continue hints
    pub fn is_fork(&self) -> bool {
        matches!(
            self,
            AtcType::ForkLeft | AtcType::ForkRight | AtcType::AtcLeft | AtcType::AtcRight
        )
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            AtcType::TurnLeft | AtcType::ForkLeft | AtcType::AtcLeft => Some(Side::Left),
            AtcType::TurnRight | AtcType::ForkRight | AtcType::AtcRight => Some(Side::Right),
            AtcType::None => None,
        }
    }
}

impl From<String> for AtcType {
    fn from(s: String) -> Self {
        AtcType::parse(&s)
    }
}

impl From<AtcType> for String {
    fn from(atc: AtcType) -> Self {
        atc.as_str().to_string()
    }
}

/// One-shot navigation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    LaneChange(Side),
}

impl NavCommand {
    /// Parse a command name and argument, e.g. `("LANECHANGE", "LEFT")`
    pub fn parse(command: &str, arg: &str) -> Option<Self> {
        match command {
            "LANECHANGE" => {
                let side = if arg == "LEFT" { Side::Left } else { Side::Right };
                Some(NavCommand::LaneChange(side))
            }
            _ => None,
        }
    }
}

/// Navigation hint snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationHint {
    pub atc: AtcType,
    /// Increments every time a new command is issued
    pub command_index: i64,
    /// Command name as sent by navigation, e.g. `LANECHANGE`
    pub command: String,
    pub command_arg: String,
    /// Advised turn speed (km/h)
    pub turn_speed_kph: f64,
}

impl NavigationHint {
    /// Any hint that should suppress lane centring
    pub fn is_active(&self) -> bool {
        self.atc != AtcType::None
    }

    /// Typed view of the current command; unknown names are `None`
    pub fn command(&self) -> Option<NavCommand> {
        NavCommand::parse(&self.command, &self.command_arg)
    }
}

/// Nearest radar track on one side
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSideInfo {
    /// Track present
    pub status: bool,
    /// Relative distance (m)
    pub d_rel: f64,
    /// Speed of the tracked object relative to ego (m/s)
    pub v_lead: f64,
}

/// Everything the state machine reads in one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverInput {
    pub vehicle: VehicleState,
    pub left: SideAvailability,
    pub right: SideAvailability,
    pub radar_left: RadarSideInfo,
    pub radar_right: RadarSideInfo,
    pub nav: NavigationHint,
    pub lateral_active: bool,
    /// Model probability that a lane change is in progress
    pub lane_change_prob: f64,
    /// Model probability of a turn
    pub turn_prob: f64,
}

impl ManeuverInput {
    pub fn side(&self, side: Side) -> &SideAvailability {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn radar(&self, side: Side) -> &RadarSideInfo {
        match side {
            Side::Left => &self.radar_left,
            Side::Right => &self.radar_right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atc_wire_strings() {
        assert_eq!(AtcType::parse("turn left"), AtcType::TurnLeft);
        assert_eq!(AtcType::parse("atc right"), AtcType::AtcRight);
        assert_eq!(AtcType::parse("straight"), AtcType::None);
        assert!(AtcType::ForkLeft.is_fork());
        assert_eq!(AtcType::ForkRight.side(), Some(Side::Right));
    }

    #[test]
    fn test_nav_command_parse() {
        assert_eq!(
            NavCommand::parse("LANECHANGE", "LEFT"),
            Some(NavCommand::LaneChange(Side::Left))
        );
        assert_eq!(
            NavCommand::parse("LANECHANGE", "RIGHT"),
            Some(NavCommand::LaneChange(Side::Right))
        );
        assert_eq!(NavCommand::parse("SPEED", "30"), None);
    }

    #[test]
    fn test_nav_command_from_wire() {
        let hint: NavigationHint = serde_json::from_str(
            r#"{"atc": "fork left", "command_index": 3, "command": "LANECHANGE", "command_arg": "LEFT"}"#,
        )
        .unwrap();
        assert_eq!(hint.atc, AtcType::ForkLeft);
        assert_eq!(hint.command(), Some(NavCommand::LaneChange(Side::Left)));

        let hint = NavigationHint {
            command: "SPEED".to_string(),
            command_arg: "30".to_string(),
            ..Default::default()
        };
        assert_eq!(hint.command(), None);
    }

    #[test]
    fn test_per_side_accessors() {
        let input = ManeuverInput {
            vehicle: VehicleState {
                right_blindspot: true,
                left_lane_line: 21,
                ..Default::default()
            },
            radar_left: RadarSideInfo {
                status: true,
                d_rel: 12.0,
                v_lead: 0.0,
            },
            ..Default::default()
        };
        assert!(input.vehicle.blindspot(Side::Right));
        assert!(!input.vehicle.blindspot(Side::Left));
        assert_eq!(input.vehicle.lane_line_code(Side::Left), 21);
        assert!(input.radar(Side::Left).status);
        assert!(!input.radar(Side::Right).status);
        assert_eq!(input.side(Side::Left).lane_width, 0.0);
    }

    #[test]
    fn test_torque_sign() {
        let vehicle = VehicleState {
            steering_torque: 1.5,
            ..Default::default()
        };
        assert!(vehicle.torque_toward(Side::Left));
        assert!(!vehicle.torque_toward(Side::Right));
    }
}
