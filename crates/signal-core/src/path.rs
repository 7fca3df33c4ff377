//! Trajectory sample type

use serde::{Deserialize, Serialize};

/// One knot of a planned path in the car frame (x forward, y right)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Forward distance (m)
    pub x: f64,
    /// Lateral offset (m)
    pub y: f64,
    /// Height (m)
    pub z: f64,
    /// Time along the path (s)
    pub t: f64,
}

impl PathPoint {
    pub fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }
}
