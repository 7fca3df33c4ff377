//! Perception samples consumed each tick

use serde::{Deserialize, Serialize};
use signal_core::{t_idxs, validate_len, validate_samples, SignalError, TRAJECTORY_SIZE};

/// One detected lane line or road edge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneLine {
    /// Longitudinal sample positions (m)
    pub x: Vec<f64>,
    /// Lateral offsets, positive right (m)
    pub y: Vec<f64>,
    /// Time along the line (s)
    pub t: Vec<f64>,
    /// Detection probability
    pub prob: f64,
    /// Lateral standard deviation (m)
    pub std: f64,
}

impl LaneLine {
    /// Straight line at a constant lateral offset over the model horizon
    pub fn straight(y: f64, prob: f64, std: f64) -> Self {
        let t = t_idxs().to_vec();
        let x = (0..TRAJECTORY_SIZE)
            .map(|i| {
                let r = i as f64 / (TRAJECTORY_SIZE - 1) as f64;
                192.0 * r * r
            })
            .collect();
        Self {
            x,
            y: vec![y; TRAJECTORY_SIZE],
            t,
            prob,
            std,
        }
    }

    /// Reject tables that cannot be interpolated
    pub fn validate(&self, field: &'static str) -> Result<(), SignalError> {
        validate_samples(field, &self.x, &self.y)?;
        validate_samples(field, &self.t, &self.y)?;
        validate_len(field, self.y.len(), TRAJECTORY_SIZE)?;
        if !self.prob.is_finite() || !self.std.is_finite() {
            return Err(SignalError::NonFinite { field, index: 0 });
        }
        Ok(())
    }
}

/// All lane geometry the model reports for one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneSample {
    /// Far-left, left, right and far-right lane lines
    pub lines: [LaneLine; 4],
    /// Left and right road edges
    pub edges: [LaneLine; 2],
}

impl LaneSample {
    pub fn far_left(&self) -> &LaneLine {
        &self.lines[0]
    }

    pub fn left(&self) -> &LaneLine {
        &self.lines[1]
    }

    pub fn right(&self) -> &LaneLine {
        &self.lines[2]
    }

    pub fn far_right(&self) -> &LaneLine {
        &self.lines[3]
    }

    pub fn left_edge(&self) -> &LaneLine {
        &self.edges[0]
    }

    pub fn right_edge(&self) -> &LaneLine {
        &self.edges[1]
    }
}
