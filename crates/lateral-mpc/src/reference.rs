//! Heading and yaw-rate references recomputed from a fused path

use signal_core::{clip, PathPoint};
use std::f64::consts::PI;

/// Speed at or below which the path is smoothed harder (m/s)
const LOW_SPEED: f64 = 6.0;
const LOW_SPEED_WINDOW: usize = 9;
const LOW_SPEED_RATE_WINDOW: usize = 7;
const MIN_SEGMENT: f64 = 0.05;
const MIN_ARC_LENGTH: f64 = 0.5;
const MIN_CURVATURE_DENOM: f64 = 1e-9;

/// Centered moving average with edge padding; even windows grow by one
fn smooth_moving_avg(values: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || values.is_empty() {
        return values.to_vec();
    }
    let window = if window % 2 == 0 { window + 1 } else { window };
    let pad = window / 2;
    let n = values.len();
    let at = |i: isize| -> f64 {
        let idx = i.clamp(0, n as isize - 1) as usize;
        values[idx]
    };
    (0..n as isize)
        .map(|i| {
            let sum: f64 = (i - pad as isize..=i + pad as isize).map(at).sum();
            sum / window as f64
        })
        .collect()
}

/// Second-order gradient on a non-uniform grid, first order at the ends
fn gradient(f: &[f64], s: &[f64]) -> Vec<f64> {
    let n = f.len();
    let mut out = vec![0.0; n];
    if n < 2 {
        return out;
    }
    out[0] = (f[1] - f[0]) / (s[1] - s[0]);
    out[n - 1] = (f[n - 1] - f[n - 2]) / (s[n - 1] - s[n - 2]);
    for i in 1..n - 1 {
        let hs = s[i] - s[i - 1];
        let hd = s[i + 1] - s[i];
        out[i] = (hs * hs * f[i + 1] + (hd * hd - hs * hs) * f[i] - hd * hd * f[i - 1])
            / (hs * hd * (hd + hs));
    }
    out
}

/// Remove 2*pi jumps between consecutive angles
fn unwrap_angles(angles: &mut [f64]) {
    let mut offset = 0.0;
    for i in 1..angles.len() {
        let raw_prev = angles[i - 1] - offset;
        let delta = angles[i] - raw_prev;
        if delta > PI || delta < -PI {
            offset += -(2.0 * PI) * ((delta + PI) / (2.0 * PI)).floor();
        }
        angles[i] += offset;
    }
}

/// Heading (rad) and yaw rate (rad/s) along `path` driven at `v_plan`.
///
/// Curvature is taken over arc length and scaled by speed. Degenerate
/// paths (fewer than five points or under half a metre long) give zeros.
/// Non-finite results become zero and the yaw rate is clipped to
/// `±clip_rate`.
pub fn yaw_from_path(
    path: &[PathPoint],
    v_plan: &[f64],
    smooth_window: usize,
    clip_rate: f64,
) -> (Vec<f64>, Vec<f64>) {
    let n = path.len();
    let zeros = || (vec![0.0; n], vec![0.0; n]);
    if n < 5 {
        return zeros();
    }

    let v0 = v_plan.first().copied().unwrap_or(0.0);
    let low_speed = v0 <= LOW_SPEED;
    let window = if low_speed {
        smooth_window.max(LOW_SPEED_WINDOW)
    } else {
        smooth_window
    };

    let mut s = vec![0.0; n];
    for i in 1..n {
        let dx = path[i].x - path[i - 1].x;
        let dy = path[i].y - path[i - 1].y;
        let ds = (dx * dx + dy * dy).sqrt();
        // NaN compares false here and propagates into the zero fill below
        let ds = if ds < MIN_SEGMENT { MIN_SEGMENT } else { ds };
        s[i] = s[i - 1] + ds;
    }
    if s[n - 1] < MIN_ARC_LENGTH {
        return zeros();
    }

    let xs: Vec<f64> = path.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = path.iter().map(|p| p.y).collect();
    let x_smooth = smooth_moving_avg(&xs, window);
    let y_smooth = smooth_moving_avg(&ys, window);

    let dx_ds = gradient(&x_smooth, &s);
    let dy_ds = gradient(&y_smooth, &s);
    let d2x_ds2 = gradient(&dx_ds, &s);
    let d2y_ds2 = gradient(&dy_ds, &s);

    let mut yaw: Vec<f64> = dx_ds
        .iter()
        .zip(&dy_ds)
        .map(|(dx, dy)| dy.atan2(*dx))
        .collect();
    unwrap_angles(&mut yaw);

    let last_v = v_plan.last().copied().unwrap_or(0.0);
    let mut yaw_rate: Vec<f64> = (0..n)
        .map(|i| {
            let speed_sq = dx_ds[i] * dx_ds[i] + dy_ds[i] * dy_ds[i];
            let denom = speed_sq.powf(1.5).max(MIN_CURVATURE_DENOM);
            let kappa = (dx_ds[i] * d2y_ds2[i] - dy_ds[i] * d2x_ds2[i]) / denom;
            kappa * v_plan.get(i).copied().unwrap_or(last_v)
        })
        .collect();
    if low_speed {
        yaw_rate = smooth_moving_avg(&yaw_rate, LOW_SPEED_RATE_WINDOW);
    }

    let limit = clip_rate.abs();
    for y in yaw.iter_mut() {
        if !y.is_finite() {
            *y = 0.0;
        }
    }
    for r in yaw_rate.iter_mut() {
        *r = if r.is_finite() { clip(*r, -limit, limit) } else { 0.0 };
    }
    (yaw, yaw_rate)
}
