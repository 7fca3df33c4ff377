//! Hard curvature limits applied after the optimiser

use signal_core::{clip, interp, t_idxs, CONTROL_N, DT_MDL, MIN_SPEED};

/// Lateral jerk budget (m/s^3)
pub const MAX_LATERAL_JERK: f64 = 5.0;
/// Lateral acceleration on a flat road (m/s^2)
pub const MAX_LATERAL_ACCEL_NO_ROLL: f64 = 3.0;
/// Steering-ratio limit (1/m)
pub const MAX_CURVATURE: f64 = 0.2;
/// Largest curvature step within one frame
pub const MAX_CURVATURE_DELTA_FRAME: f64 = 0.03;
pub const GRAVITY: f64 = 9.81;

/// Largest curvature change allowed over `dt` at speed `v_ego`
pub fn max_curvature_step(v_ego: f64, dt: f64) -> f64 {
    let v = v_ego.max(MIN_SPEED);
    (MAX_LATERAL_JERK / (v * v) * dt.max(0.0)).min(MAX_CURVATURE_DELTA_FRAME)
}

/// Clip `new_curvature` against `prev_curvature`.
///
/// Returns the clipped value and whether any limit was active. The result
/// always satisfies `|c| <= MAX_CURVATURE` and `|c - prev| <= max_curvature_step`,
/// with `prev` itself first brought inside the absolute limit.
pub fn clip_curvature(
    v_ego: f64,
    prev_curvature: f64,
    new_curvature: f64,
    roll: f64,
    dt: f64,
) -> (f64, bool) {
    let v = if v_ego.is_finite() {
        v_ego.max(MIN_SPEED)
    } else {
        MIN_SPEED
    };
    let prev = if prev_curvature.is_finite() {
        clip(prev_curvature, -MAX_CURVATURE, MAX_CURVATURE)
    } else {
        0.0
    };
    let requested = if new_curvature.is_finite() {
        new_curvature
    } else {
        prev
    };
    let roll = if roll.is_finite() { roll } else { 0.0 };

    let roll_compensation = roll * GRAVITY;
    let max_accel = MAX_LATERAL_ACCEL_NO_ROLL + roll_compensation;
    let min_accel = -MAX_LATERAL_ACCEL_NO_ROLL + roll_compensation;
    let mut curvature = clip(requested, min_accel / (v * v), max_accel / (v * v));
    curvature = clip(curvature, -MAX_CURVATURE, MAX_CURVATURE);

    let step = max_curvature_step(v, dt);
    curvature = clip(curvature, prev - step, prev + step);

    let limited = (curvature - requested).abs() > 1e-12 || !new_curvature.is_finite();
    (curvature, limited)
}

/// Curvature to command now so the actuator reaches the planned heading
/// after `steer_delay`.
///
/// Returns 0 when the horizon arrays are not `CONTROL_N` long.
pub fn lag_adjusted_curvature(v_ego: f64, psis: &[f64], curvatures: &[f64], steer_delay: f64) -> f64 {
    if psis.len() != CONTROL_N || curvatures.len() != CONTROL_N {
        return 0.0;
    }
    let v = v_ego.max(MIN_SPEED);
    let delay = steer_delay.max(0.01);
    let t = t_idxs();
    let current = curvatures[0];
    let psi = interp(delay, &t[..CONTROL_N], psis);
    let average = psi / (v * delay);
    let desired = 2.0 * average - current;

    let rate = MAX_LATERAL_JERK / (v * v);
    clip(desired, current - rate * DT_MDL, current + rate * DT_MDL)
}
