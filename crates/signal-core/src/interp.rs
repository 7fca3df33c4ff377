//! Piecewise-linear interpolation helpers

use crate::error::SignalError;
use crate::validator::validate_samples;

/// Interpolate `fp(xp)` at `x`, clamping to the end values.
///
/// `xp` must be non-decreasing; use [`try_interp`] when that is not known.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // First knot strictly above x
    let hi = xp[..n].partition_point(|&v| v <= x);
    let lo = hi - 1;
    let dx = xp[hi] - xp[lo];
    if dx <= 0.0 {
        return fp[hi];
    }
    fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / dx
}

/// Validated interpolation: rejects empty, mismatched, non-finite or non-monotonic input
pub fn try_interp(x: f64, xp: &[f64], fp: &[f64]) -> Result<f64, SignalError> {
    validate_samples("interp", xp, fp)?;
    if !x.is_finite() {
        return Err(SignalError::NonFinite {
            field: "interp.x",
            index: 0,
        });
    }
    Ok(interp(x, xp, fp))
}

/// Interpolate a whole query vector
pub fn interp_slice(xs: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| interp(x, xp, fp)).collect()
}

/// Clamp without panicking on inverted bounds (returns their midpoint)
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    if lo > hi {
        return (lo + hi) * 0.5;
    }
    value.max(lo).min(hi)
}

/// Linear blend with `t` clamped to [0, 1]
pub fn lerp(start: f64, end: f64, t: f64) -> f64 {
    let t = clip(t, 0.0, 1.0);
    start * (1.0 - t) + end * t
}

/// Whichever argument has the larger magnitude (ties favour `b`)
pub fn max_abs(a: f64, b: f64) -> f64 {
    if a.abs() > b.abs() {
        a
    } else {
        b
    }
}
