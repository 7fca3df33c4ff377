//! Vehicle model and cost tuning

use serde::{Deserialize, Serialize};

/// Simplified bicycle model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Wheelbase (m)
    pub wheelbase: f64,
    /// Centre of gravity to front axle (m)
    pub center_to_front: f64,
    /// Vehicle mass (kg)
    pub mass: f64,
    /// Rear tyre cornering stiffness (N/rad)
    pub tire_stiffness_rear: f64,
    /// Steering actuator delay (s)
    pub steer_actuator_delay: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            wheelbase: 2.7,
            center_to_front: 1.2,
            mass: 1500.0,
            tire_stiffness_rear: 200_000.0,
            steer_actuator_delay: 0.2,
        }
    }
}

impl VehicleParams {
    /// Lateral offset gained per unit yaw rate at speed `v`, never negative
    pub fn lateral_factor(&self, v: f64) -> f64 {
        let rear = self.wheelbase - self.center_to_front;
        let slip = (self.center_to_front * self.mass)
            / (self.wheelbase * self.tire_stiffness_rear).max(f64::EPSILON);
        (rear - slip * v * v).max(0.0)
    }
}

/// MPC cost weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Lateral path error
    pub path: f64,
    /// Heading error, scaled by speed
    pub motion: f64,
    /// Yaw rate error (lateral acceleration)
    pub accel: f64,
    /// Yaw acceleration (lateral jerk)
    pub jerk: f64,
    /// Raw steering rate
    pub steering_rate: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            path: 1.0,
            motion: 0.11,
            accel: 0.0,
            jerk: 0.04,
            steering_rate: 700.0,
        }
    }
}

impl CostWeights {
    pub fn is_finite(&self) -> bool {
        [self.path, self.motion, self.accel, self.jerk, self.steering_rate]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}
