//! Lane-centred path fusion

use crate::config::FuserConfig;
use crate::sample::LaneSample;
use crate::side::{Side, SideAvailability, SideTracker};
use serde::{Deserialize, Serialize};
use signal_core::{
    clip, interp, max_abs, seconds_to_ticks, FirstOrderFilter, PathPoint, SignalError, DT_MDL,
    MS_TO_KPH,
};
use tracing::debug;

/// Upper bound on a single raw lane width reading (m)
const MAX_RAW_WIDTH: f64 = 6.0;

/// Per-side model lane widths below this leave no room on that side (m)
const SIDE_TIGHT_WIDTH: f64 = 2.0;
const SIDE_ROOMY_WIDTH: f64 = 2.2;

/// Tick input for the fuser
#[derive(Debug, Clone, Copy)]
pub struct FuserInput<'a> {
    pub sample: &'a LaneSample,
    /// Model path to blend with
    pub path: &'a [PathPoint],
    /// Ego speed (m/s)
    pub v_ego: f64,
    /// Signed curve speed hint (km/h, sign gives curve direction)
    pub curve_speed: f64,
    /// 1.0 when no maneuver is active, 0.0 mid lane change or turn
    pub lane_change_multiplier: f64,
    /// Planner wants lane lines this tick
    pub lane_line_mode: bool,
    /// Model width of the lane to the left (m, 0 when unknown)
    pub lane_width_left: f64,
    /// Model width of the lane to the right (m, 0 when unknown)
    pub lane_width_right: f64,
}

/// Result of one fuser tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusedPath {
    /// Target path, positive y right
    pub path: Vec<PathPoint>,
    /// The lane-derived path overrode the model path
    pub lanelines_active: bool,
    /// Filtered ego lane width (m)
    pub lane_width: f64,
    /// Filtered model width of the neighbouring lanes (m)
    pub lane_width_left: f64,
    pub lane_width_right: f64,
    /// Trust in the lane-derived path
    pub d_prob: f64,
    /// Shaped line probabilities
    pub l_prob: f64,
    pub r_prob: f64,
    /// Filtered lateral offset (m)
    pub offset: f64,
    /// False when this tick's lane input was rejected
    pub input_valid: bool,
    pub left: SideAvailability,
    pub right: SideAvailability,
}

/// Lane geometry fuser
pub struct LaneFuser {
    config: FuserConfig,
    left: SideTracker,
    right: SideTracker,
    lane_width: FirstOrderFilter,
    lane_width_last: f64,
    side_width_left: FirstOrderFilter,
    side_width_right: FirstOrderFilter,
    offset: FirstOrderFilter,
    d_prob_count: u32,
    trust_ticks: u32,
}

impl LaneFuser {
    pub fn new(config: FuserConfig) -> Self {
        let lane_width = FirstOrderFilter::new(config.lane_width_init, config.lane_width_rc, DT_MDL);
        let side_width_left = FirstOrderFilter::new(1.0, config.side_width_rc, DT_MDL);
        let side_width_right = FirstOrderFilter::new(1.0, config.side_width_rc, DT_MDL);
        let offset = FirstOrderFilter::new(0.0, config.offset_rc, DT_MDL);
        let trust_ticks = seconds_to_ticks(config.trust_sustain_s);
        Self {
            lane_width_last: config.lane_width_init,
            config,
            left: SideTracker::new(Side::Left),
            right: SideTracker::new(Side::Right),
            lane_width,
            side_width_left,
            side_width_right,
            offset,
            d_prob_count: 0,
            trust_ticks,
        }
    }

    pub fn config(&self) -> &FuserConfig {
        &self.config
    }

    /// Swap tuning, keeping filter state
    pub fn set_config(&mut self, config: FuserConfig) {
        self.lane_width.set_time_constant(config.lane_width_rc, DT_MDL);
        self.side_width_left.set_time_constant(config.side_width_rc, DT_MDL);
        self.side_width_right.set_time_constant(config.side_width_rc, DT_MDL);
        self.offset.set_time_constant(config.offset_rc, DT_MDL);
        self.trust_ticks = seconds_to_ticks(config.trust_sustain_s);
        self.config = config;
    }

    /// Current lane width estimate (m)
    pub fn lane_width(&self) -> f64 {
        self.lane_width.x()
    }

    /// Largest change of the lane width estimate in one tick
    pub fn width_step_limit(&self) -> f64 {
        self.lane_width.gain() * MAX_RAW_WIDTH
    }

    pub fn side(&self, side: Side) -> SideAvailability {
        match side {
            Side::Left => self.left.availability(),
            Side::Right => self.right.availability(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Run one tick
    pub fn update(&mut self, input: &FuserInput<'_>) -> FusedPath {
        let sample = input.sample;
        let left = self
            .left
            .update(sample.far_left(), sample.left(), sample.left_edge(), input.v_ego);
        let right = self
            .right
            .update(sample.far_right(), sample.right(), sample.right_edge(), input.v_ego);

        if input.lane_width_left > 0.0 {
            self.side_width_left.update(input.lane_width_left);
        }
        if input.lane_width_right > 0.0 {
            self.side_width_right.update(input.lane_width_right);
        }

        let mut fused = match self.fuse(input) {
            Ok(fused) => fused,
            Err(e) => {
                debug!(error = %e, "lane input rejected, passing model path through");
                self.d_prob_count = 0;
                FusedPath {
                    path: input.path.to_vec(),
                    lane_width: self.lane_width.x(),
                    lane_width_left: self.side_width_left.x(),
                    lane_width_right: self.side_width_right.x(),
                    offset: self.offset.x(),
                    ..Default::default()
                }
            }
        };
        fused.left = left;
        fused.right = right;
        fused
    }

    fn validate(&self, input: &FuserInput<'_>) -> Result<(), SignalError> {
        input.sample.left().validate("lane.left")?;
        input.sample.right().validate("lane.right")?;
        if input.path.is_empty() {
            return Err(SignalError::Empty("path"));
        }
        for (index, p) in input.path.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.t.is_finite()) {
                return Err(SignalError::NonFinite {
                    field: "path",
                    index,
                });
            }
        }
        for (field, value) in [
            ("v_ego", input.v_ego),
            ("curve_speed", input.curve_speed),
            ("lane_change_multiplier", input.lane_change_multiplier),
        ] {
            if !value.is_finite() {
                return Err(SignalError::NonFinite { field, index: 0 });
            }
        }
        Ok(())
    }

    fn fuse(&mut self, input: &FuserInput<'_>) -> Result<FusedPath, SignalError> {
        self.validate(input)?;
        let cfg = &self.config;
        let ll = input.sample.left();
        let rl = input.sample.right();
        let v_ego = input.v_ego;
        let multiplier = input.lane_change_multiplier;

        // Implausibly wide lanes are usually a merge or a missed line
        let width_pts: Vec<f64> = rl.y.iter().zip(&ll.y).map(|(r, l)| r - l).collect();
        let width_mod = [0.0, 1.5, 3.0]
            .iter()
            .map(|t| {
                let width = interp(t * (v_ego + 7.0), &ll.x, &width_pts);
                interp(width, &[4.5, 6.0], &[1.0, 0.0])
            })
            .fold(f64::INFINITY, f64::min);

        let l_prob = ll.prob * width_mod * interp(ll.std, &[0.15, 0.3], &[1.0, 0.0]);
        let r_prob = rl.prob * width_mod * interp(rl.std, &[0.15, 0.3], &[1.0, 0.0]);

        let current_width = clip((rl.y[0] - ll.y[0]).abs(), 0.0, MAX_RAW_WIDTH);
        let both_available =
            l_prob > cfg.line_valid_prob && r_prob > cfg.line_valid_prob && multiplier > 0.5;
        if both_available {
            self.lane_width_last = self.lane_width.update(current_width);
        }
        let lane_width = self.lane_width.x();

        let half_width = lane_width.min(cfg.max_centering_width) / 2.0;
        let from_left: Vec<f64> = ll.y.iter().map(|y| y + half_width).collect();
        let from_right: Vec<f64> = rl.y.iter().map(|y| y - half_width).collect();

        let mut d_prob = if both_available {
            1.0
        } else {
            l_prob.max(r_prob)
        };

        let side_left = self.side_width_left.x();
        let side_right = self.side_width_right.x();

        let offset_curve = interp(
            input.curve_speed.abs(),
            &[50.0, 200.0],
            &[cfg.adjust_curve_offset, 0.0],
        ) * sign(input.curve_speed);

        // Bias toward the roomier neighbour, away from the tight side
        let offset_lane = if (side_left > SIDE_ROOMY_WIDTH && side_right > SIDE_ROOMY_WIDTH)
            || (side_left < SIDE_TIGHT_WIDTH && side_right < SIDE_TIGHT_WIDTH)
        {
            0.0
        } else if side_left > side_right {
            -interp(lane_width, &[2.5, 2.9], &[0.0, cfg.adjust_lane_offset])
        } else {
            interp(lane_width, &[2.5, 2.9], &[0.0, cfg.adjust_lane_offset])
        };

        let lane_path_y: Vec<f64> = if lane_width < cfg.narrow_lane_width {
            if r_prob > cfg.line_valid_prob && side_right < side_left {
                from_right
            } else if l_prob > cfg.line_valid_prob && side_left < SIDE_TIGHT_WIDTH {
                from_left
            } else if l_prob > cfg.line_valid_prob || l_prob > r_prob {
                from_left
            } else {
                from_right
            }
        } else if l_prob > cfg.both_lines_prob && r_prob > cfg.both_lines_prob {
            from_left
                .iter()
                .zip(&from_right)
                .map(|(l, r)| (l + r) / 2.0)
                .collect()
        } else {
            let total = l_prob + r_prob + 1e-4;
            from_left
                .iter()
                .zip(&from_right)
                .map(|(l, r)| (l_prob * l + r_prob * r) / total)
                .collect()
        };

        let limit = cfg.offset_limit;
        let offset_total = if offset_curve * offset_lane < 0.0 {
            clip(offset_curve + offset_lane, -limit, limit)
        } else {
            clip(max_abs(offset_lane, offset_curve), -limit, limit)
        };

        d_prob *= multiplier;
        if multiplier >= 0.5 {
            self.offset
                .update(interp(d_prob, &[0.0, 0.3], &[0.0, offset_total]));
        }

        d_prob *= interp(
            v_ego * MS_TO_KPH,
            &[cfg.low_speed_off_kph, cfg.low_speed_full_kph],
            &[0.0, 1.0],
        );

        if d_prob > cfg.trust_prob {
            self.d_prob_count = self.d_prob_count.saturating_add(1);
        } else {
            self.d_prob_count = 0;
        }
        let lanelines_active = input.lane_line_mode && self.d_prob_count > self.trust_ticks;

        let mut path = input.path.to_vec();
        if lanelines_active {
            let shift = cfg.camera_offset + self.offset.x();
            let stretch = 1.0 + cfg.lane_time_offset;
            for p in path.iter_mut() {
                let lane_y = interp(p.t * stretch, &ll.t, &lane_path_y);
                p.y = d_prob * lane_y + (1.0 - d_prob) * p.y + shift;
            }
        }

        Ok(FusedPath {
            path,
            lanelines_active,
            lane_width,
            lane_width_left: side_left,
            lane_width_right: side_right,
            d_prob,
            l_prob,
            r_prob,
            offset: self.offset.x(),
            input_valid: true,
            left: SideAvailability::default(),
            right: SideAvailability::default(),
        })
    }
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
