//! Trajectory MPC Planner
//!
//! Plans one horizon of curvature commands per tick:
//! - Bicycle-model lateral MPC over the model time grid
//! - Warm start compensating steering-actuator lag
//! - Solver failure detection, state reset and validity gating
//! - Jerk, lateral-acceleration and absolute curvature clipping

pub mod clip;
pub mod params;
pub mod planner;
pub mod reference;
pub mod solver;
pub mod throttle;

pub use clip::{clip_curvature, lag_adjusted_curvature};
pub use params::{CostWeights, VehicleParams};
pub use planner::{ControlState, LateralPlan, TrajectoryInput, TrajectoryPlanner};
pub use reference::yaw_from_path;
pub use solver::{LateralSolver, LqSolver, MpcProblem, Solution, NX};
pub use throttle::WarnThrottle;

use thiserror::Error;

/// Solver error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Horizon needs at least two knots, got {0}")]
    Horizon(usize),

    #[error("{field}: expected {expected} knots, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Knot times must be strictly increasing")]
    NonMonotonic,

    #[error("Hessian is not positive definite")]
    NotPositiveDefinite,

    #[error("Solver produced a non-finite solution")]
    NonFiniteSolution,
}

impl SolverError {
    /// Nonzero status code reported alongside the plan
    pub fn status(&self) -> i32 {
        match self {
            SolverError::Horizon(_) => 1,
            SolverError::LengthMismatch { .. } => 2,
            SolverError::NonFinite(_) => 3,
            SolverError::NonMonotonic => 4,
            SolverError::NotPositiveDefinite => 5,
            SolverError::NonFiniteSolution => 6,
        }
    }
}
