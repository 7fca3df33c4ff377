//! Per-side lane and road-edge availability

use crate::sample::LaneLine;
use ring_buffer::WindowMean;
use serde::{Deserialize, Serialize};
use signal_core::{seconds_to_ticks, try_interp, ExistCounter, SignalError, MIN_SPEED};
use tracing::debug;

/// Narrowest gap that still counts as a usable lane (m)
const MIN_LANE_WIDTH: f64 = 2.5;

/// Presence sustain time for every side counter (s)
const SUSTAIN_S: f64 = 0.2;

/// Inward bias applied to road edges, in edge standard deviations
const EDGE_STD_BIAS: f64 = 0.4;

/// Lane-width smoothing window: 1 s at 20 Hz
const WIDTH_WINDOW: usize = 20;

/// Which side of the ego lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Snapshot of one side's geometry, passed by value downstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideAvailability {
    /// Adjacent lane confirmed wide enough
    pub lane_available: bool,
    /// Road edge confirmed far enough away
    pub edge_available: bool,
    /// Signed presence counter of the adjacent lane line
    pub lane_exist_counter: i32,
    /// Distance from the ego lane line to the road edge at 1 s (m)
    pub dist_to_edge: f64,
    /// Same at 2 s (m)
    pub dist_to_edge_far: f64,
    /// 1 s running mean of the adjacent lane width (m)
    pub lane_width: f64,
    /// Change of adjacent lane width across the window (m)
    pub lane_width_diff: f64,
    /// Probability of the ego lane line on this side
    pub cur_lane_line_prob: f64,
    /// Ego lane line on this side is barely visible
    pub current_lane_missing: bool,
}

struct Measurement {
    lane_width: f64,
    dist_to_edge: f64,
    dist_to_edge_far: f64,
    lane_valid: bool,
}

/// Tracks one side of the ego lane across ticks
#[derive(Debug, Clone)]
pub struct SideTracker {
    side: Side,
    width_window: WindowMean<WIDTH_WINDOW>,
    lane_exist: ExistCounter,
    lane_width_count: ExistCounter,
    edge_count: ExistCounter,
    available_count: i32,
    snapshot: SideAvailability,
}

impl SideTracker {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            width_window: WindowMean::new(),
            lane_exist: ExistCounter::new(SUSTAIN_S),
            lane_width_count: ExistCounter::new(SUSTAIN_S),
            edge_count: ExistCounter::new(SUSTAIN_S),
            available_count: seconds_to_ticks(SUSTAIN_S) as i32,
            snapshot: SideAvailability {
                cur_lane_line_prob: 1.0,
                ..Default::default()
            },
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Latest snapshot
    pub fn availability(&self) -> SideAvailability {
        self.snapshot
    }

    /// Update from this tick's lines. Malformed input holds the last snapshot.
    pub fn update(
        &mut self,
        outer: &LaneLine,
        current: &LaneLine,
        edge: &LaneLine,
        v_ego: f64,
    ) -> SideAvailability {
        match self.measure(outer, current, edge, v_ego) {
            Ok(m) => self.apply(m, current.prob),
            Err(e) => debug!(side = self.side.as_str(), error = %e, "side geometry skipped"),
        }
        self.snapshot
    }

    fn measure(
        &self,
        outer: &LaneLine,
        current: &LaneLine,
        edge: &LaneLine,
        v_ego: f64,
    ) -> Result<Measurement, SignalError> {
        if !v_ego.is_finite() || !outer.prob.is_finite() {
            return Err(SignalError::NonFinite {
                field: "side.input",
                index: 0,
            });
        }
        let v = v_ego.max(MIN_SPEED);
        let near = v * 1.0;
        let far = v * 2.0;

        let bias = match self.side {
            Side::Left => EDGE_STD_BIAS * edge.std,
            Side::Right => -EDGE_STD_BIAS * edge.std,
        };

        let current_y = try_interp(near, &current.x, &current.y)?;
        let lane_y = try_interp(near, &outer.x, &outer.y)?;
        let edge_y = try_interp(near, &edge.x, &edge.y)? + bias;
        let edge_far_y = try_interp(far, &edge.x, &edge.y)? + bias;

        let distance_to_lane = (current_y - lane_y).abs();
        let dist_to_edge = (current_y - edge_y).abs();

        Ok(Measurement {
            lane_width: distance_to_lane.min(dist_to_edge),
            dist_to_edge,
            dist_to_edge_far: (current_y - edge_far_y).abs(),
            lane_valid: outer.prob > 0.5,
        })
    }

    fn apply(&mut self, m: Measurement, cur_prob: f64) {
        self.lane_exist.update(m.lane_valid);

        let lane_width = self.width_window.push(m.lane_width);
        let lane_width_diff = self.width_window.span();

        self.lane_width_count.update(lane_width > MIN_LANE_WIDTH);
        self.edge_count.update(m.dist_to_edge > MIN_LANE_WIDTH);

        let cur_lane_line_prob = if cur_prob.is_finite() { cur_prob } else { 0.0 };

        self.snapshot = SideAvailability {
            lane_available: self.lane_width_count.counter() > self.available_count,
            edge_available: self.edge_count.counter() > self.available_count
                && m.dist_to_edge_far > MIN_LANE_WIDTH,
            lane_exist_counter: self.lane_exist.counter(),
            dist_to_edge: m.dist_to_edge,
            dist_to_edge_far: m.dist_to_edge_far,
            lane_width,
            lane_width_diff,
            cur_lane_line_prob,
            current_lane_missing: cur_lane_line_prob < 0.3,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.side);
    }
}
