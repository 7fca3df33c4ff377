//! Maneuver configuration

use serde::{Deserialize, Serialize};

/// How a blind-spot warning affects lane changes
///
/// Deserializes from either the policy name or the integer tuning parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "BsdPolicyParam")]
pub enum BsdPolicy {
    /// Blind-spot flags are not consulted
    Ignore,
    /// Blocks automatic starts; driver torque may still override
    #[default]
    Warn,
    /// Never start while the blind-spot hold is armed
    Block,
}

impl BsdPolicy {
    /// Map the integer tuning parameter (-1, 0, 1)
    pub fn from_param(value: i64) -> Self {
        match value {
            v if v < 0 => BsdPolicy::Ignore,
            0 => BsdPolicy::Warn,
            _ => BsdPolicy::Block,
        }
    }

    pub fn ignores(&self) -> bool {
        *self == BsdPolicy::Ignore
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BsdPolicyParam {
    Code(i64),
    Name(String),
}

impl TryFrom<BsdPolicyParam> for BsdPolicy {
    type Error = String;

    fn try_from(param: BsdPolicyParam) -> Result<Self, Self::Error> {
        match param {
            BsdPolicyParam::Code(value) => Ok(BsdPolicy::from_param(value)),
            BsdPolicyParam::Name(name) => match name.as_str() {
                "ignore" => Ok(BsdPolicy::Ignore),
                "warn" => Ok(BsdPolicy::Warn),
                "block" => Ok(BsdPolicy::Block),
                other => Err(format!("unknown blind-spot policy `{other}`")),
            },
        }
    }
}

/// Score terms for the turn vs. lane-change classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Below this speed a turn is likely (km/h)
    pub turn_speed_kph: f64,
    /// Below this speed braking or missing geometry hint at a turn (km/h)
    pub braking_speed_kph: f64,
    /// Deceleration that counts as braking (m/s²)
    pub braking_accel: f64,
    /// Lane line confirmed for less than this counts as lost (s)
    pub lane_loss_s: f64,
    /// Score for a navigation turn hint
    pub nav_turn_score: i32,
    /// Score for a navigation fork hint (usually negative)
    pub nav_fork_score: i32,
    /// Score at which the maneuver is a turn candidate
    pub decision_score: i32,
    /// Far road edge must be beyond this for a turn (m)
    pub far_edge_m: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            turn_speed_kph: 30.0,
            braking_speed_kph: 40.0,
            braking_accel: -1.0,
            lane_loss_s: 0.5,
            nav_turn_score: 2,
            nav_fork_score: -2,
            decision_score: 2,
            far_edge_m: 4.0,
        }
    }
}

/// Maneuver state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverConfig {
    /// > 0 requires driver torque to start, < 0 disables driver blinker desire
    pub lane_change_need_torque: i64,

    pub bsd_policy: BsdPolicy,

    /// Blind-spot hold after the last detection (s)
    pub bsd_hold_s: f64,

    /// Wait after entering PreLaneChange before geometry may start the change (s)
    pub lane_change_delay_s: f64,

    /// Minimum speed for a lane change (km/h)
    pub lane_change_speed_min_kph: f64,

    /// Episode timeout once the change has started (s)
    pub lane_change_time_max_s: f64,

    /// Steering angle that arms the turn-disable timer (deg)
    pub turn_disable_angle_deg: f64,

    /// Turn-disable duration (s)
    pub turn_disable_s: f64,

    /// Emit turn desires at all
    pub enable_turn_desires: bool,

    /// Keep desires are suppressed for this long after PreLaneChange (s)
    pub keep_pulse_s: f64,

    /// How long a navigation lane-change command holds its direction (s)
    pub nav_command_hold_s: f64,

    pub classifier: ClassifierThresholds,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            lane_change_need_torque: 0,
            bsd_policy: BsdPolicy::Warn,
            bsd_hold_s: 2.0,
            lane_change_delay_s: 0.0,
            lane_change_speed_min_kph: 30.0,
            lane_change_time_max_s: 10.0,
            turn_disable_angle_deg: 80.0,
            turn_disable_s: 10.0,
            enable_turn_desires: true,
            keep_pulse_s: 1.0,
            nav_command_hold_s: 0.2,
            classifier: ClassifierThresholds::default(),
        }
    }
}

impl ManeuverConfig {
    /// Lane changes only start on driver torque
    pub fn torque_required() -> Self {
        Self {
            lane_change_need_torque: 1,
            ..Default::default()
        }
    }
}
