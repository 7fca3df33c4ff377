//! Planner configuration and slow-cadence tuning values

use crate::error::PlannerError;
use lane_fuser::FuserConfig;
use lateral_mpc::{CostWeights, VehicleParams};
use maneuver::{BsdPolicy, ManeuverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides, e.g. `LATERAL__TUNING__PATH_OFFSET`
pub const ENV_PREFIX: &str = "LATERAL";

/// Values that may change while driving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// MPC cost weights
    pub weights: CostWeights,

    /// Lateral bias added to the planned path, positive right (m)
    pub path_offset: f64,

    /// Lane-asymmetry offset (m)
    pub adjust_lane_offset: f64,

    /// Curve offset (m)
    pub adjust_curve_offset: f64,

    /// Look-ahead stretch on the lane path (fraction of t)
    pub lane_time_offset: f64,

    /// Lane lines are used above this speed, 0 disables them (km/h)
    pub use_lane_line_speed_kph: f64,

    pub bsd_policy: BsdPolicy,

    /// > 0 requires driver torque, < 0 disables driver blinker desire
    pub lane_change_need_torque: i64,

    /// Wait before an automatic lane change starts (s)
    pub lane_change_delay_s: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            path_offset: 0.0,
            adjust_lane_offset: 0.0,
            adjust_curve_offset: 0.0,
            lane_time_offset: 0.0,
            use_lane_line_speed_kph: 0.0,
            bsd_policy: BsdPolicy::default(),
            lane_change_need_torque: 0,
            lane_change_delay_s: 0.0,
        }
    }
}

impl Tuning {
    /// Fuser config with these tuning values applied
    pub fn apply_to_fuser(&self, base: &FuserConfig) -> FuserConfig {
        FuserConfig {
            adjust_lane_offset: self.adjust_lane_offset,
            adjust_curve_offset: self.adjust_curve_offset,
            lane_time_offset: self.lane_time_offset,
            ..base.clone()
        }
    }

    /// Maneuver config with these tuning values applied
    pub fn apply_to_maneuver(&self, base: &ManeuverConfig) -> ManeuverConfig {
        ManeuverConfig {
            bsd_policy: self.bsd_policy,
            lane_change_need_torque: self.lane_change_need_torque,
            lane_change_delay_s: self.lane_change_delay_s,
            ..base.clone()
        }
    }
}

/// Full planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub fuser: FuserConfig,
    pub maneuver: ManeuverConfig,
    pub vehicle: VehicleParams,
    /// Initial tuning, replaced by the tuning source when it answers
    pub tuning: Tuning,
    /// Tuning re-read period (s)
    pub tuning_refresh_s: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            fuser: FuserConfig::default(),
            maneuver: ManeuverConfig::default(),
            vehicle: VehicleParams::default(),
            tuning: Tuning::default(),
            tuning_refresh_s: 5.0,
        }
    }
}

impl PlannerConfig {
    /// Load from an optional file plus `LATERAL__`-prefixed environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, PlannerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
