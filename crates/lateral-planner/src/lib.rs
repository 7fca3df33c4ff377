//! Lateral Guidance Core
//!
//! Runs once per model frame and turns perception, vehicle and navigation
//! snapshots into a bounded curvature plan:
//! - Lane geometry fusion and lane-line mode selection
//! - Turn and lane change state machine
//! - Lateral MPC with actuator-lag compensation and hard curvature limits
//! - Slow-cadence tuning with cached fallback

pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod planner;
pub mod tuning;

pub use config::{PlannerConfig, Tuning, ENV_PREFIX};
pub use error::PlannerError;
pub use input::{ModelOutput, PlannerInput};
pub use logging::init_logging;
pub use planner::{LateralPlanOutput, LateralPlanner};
pub use tuning::{FileTuning, StaticTuning, TuningCache, TuningSource};
