//! Lane fuser configuration

use serde::{Deserialize, Serialize};

/// Lane fuser tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuserConfig {
    /// Lane-asymmetry offset magnitude (m)
    pub adjust_lane_offset: f64,

    /// Curve offset magnitude at low curve speed (m)
    pub adjust_curve_offset: f64,

    /// Limit on the combined lateral offset (m)
    pub offset_limit: f64,

    /// Initial lane width estimate (m)
    pub lane_width_init: f64,

    /// Lane width filter time constant (s)
    pub lane_width_rc: f64,

    /// Per-side model lane width filter time constant (s)
    pub side_width_rc: f64,

    /// Lateral offset filter time constant (s)
    pub offset_rc: f64,

    /// Widest lane the path is centred in (m)
    pub max_centering_width: f64,

    /// Below this lane width the path hugs the road-edge side (m)
    pub narrow_lane_width: f64,

    /// Both lines above this probability are averaged
    pub both_lines_prob: f64,

    /// A line above this probability counts as present
    pub line_valid_prob: f64,

    /// `d_prob` above which the fused path builds trust
    pub trust_prob: f64,

    /// Sustain time before the fused path overrides the model path (s)
    pub trust_sustain_s: f64,

    /// Lane centring fades in between these speeds (km/h)
    pub low_speed_off_kph: f64,
    pub low_speed_full_kph: f64,

    /// Look-ahead stretch applied when resampling the lane path (fraction of t)
    pub lane_time_offset: f64,

    /// Camera mounting offset, positive right (m)
    pub camera_offset: f64,
}

impl Default for FuserConfig {
    fn default() -> Self {
        Self {
            adjust_lane_offset: 0.0,
            adjust_curve_offset: 0.0,
            offset_limit: 0.4,
            lane_width_init: 3.2,
            lane_width_rc: 3.0,
            side_width_rc: 1.0,
            offset_rc: 2.0,
            max_centering_width: 4.0,
            narrow_lane_width: 2.5,
            both_lines_prob: 0.7,
            line_valid_prob: 0.5,
            trust_prob: 0.3,
            trust_sustain_s: 1.0,
            low_speed_off_kph: 5.0,
            low_speed_full_kph: 10.0,
            lane_time_offset: 0.0,
            camera_offset: 0.0,
        }
    }
}
