//! First-order low-pass filter

use serde::{Deserialize, Serialize};

/// Discrete first-order low-pass filter, `x += k * (input - x)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FirstOrderFilter {
    x: f64,
    k: f64,
}

impl FirstOrderFilter {
    /// Create a filter with initial value `x0`, time constant `rc` and sample period `dt`
    pub fn new(x0: f64, rc: f64, dt: f64) -> Self {
        let mut filter = Self { x: x0, k: 1.0 };
        filter.set_time_constant(rc, dt);
        filter
    }

    /// Change the time constant, keeping the current value
    pub fn set_time_constant(&mut self, rc: f64, dt: f64) {
        let rc = rc.max(0.0);
        self.k = if rc + dt > 0.0 { dt / (rc + dt) } else { 1.0 };
    }

    /// Feed a sample and get the filtered output
    pub fn update(&mut self, input: f64) -> f64 {
        self.x = (1.0 - self.k) * self.x + self.k * input;
        self.x
    }

    /// Current filtered value
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Blend gain per update
    pub fn gain(&self) -> f64 {
        self.k
    }

    /// Reset the filter to a value
    pub fn reset(&mut self, x: f64) {
        self.x = x;
    }
}
