//! Signal Primitives
//!
//! Shared building blocks for the lateral planning pipeline: debounced
//! presence counters, first-order low-pass filters, piecewise-linear
//! interpolation, sample validation and model-horizon timing.

mod error;
mod filter;
mod hysteresis;
mod interp;
mod path;
mod timing;
mod validator;

pub use error::SignalError;
pub use filter::FirstOrderFilter;
pub use hysteresis::ExistCounter;
pub use interp::{clip, interp, interp_slice, lerp, max_abs, try_interp};
pub use path::PathPoint;
pub use timing::{
    seconds_to_ticks, t_idxs, CONTROL_N, DT_CTRL, DT_MDL, LAT_MPC_N, MIN_SPEED, MS_TO_KPH,
    TRAJECTORY_SIZE,
};
pub use validator::{validate_finite, validate_len, validate_samples};
