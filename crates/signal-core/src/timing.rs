//! Planning tick and model horizon constants

/// Planning loop period (20 Hz)
pub const DT_MDL: f64 = 0.05;

/// Steering control loop period (100 Hz)
pub const DT_CTRL: f64 = 0.01;

/// Number of knots in a model trajectory
pub const TRAJECTORY_SIZE: usize = 33;

/// MPC horizon steps (the solver sees `LAT_MPC_N + 1` knots)
pub const LAT_MPC_N: usize = 16;

/// Samples published to the steering controller
pub const CONTROL_N: usize = 17;

/// Lateral planning is meaningless at standstill; speeds clamp to this
pub const MIN_SPEED: f64 = 1.0;

pub const MS_TO_KPH: f64 = 3.6;

/// Knot times of a model trajectory: `10 * (i / 32)^2` seconds
pub fn t_idxs() -> [f64; TRAJECTORY_SIZE] {
    let mut t = [0.0; TRAJECTORY_SIZE];
    let last = (TRAJECTORY_SIZE - 1) as f64;
    for (i, v) in t.iter_mut().enumerate() {
        let r = i as f64 / last;
        *v = 10.0 * r * r;
    }
    t
}

/// Convert a duration to a whole number of planning ticks
pub fn seconds_to_ticks(seconds: f64) -> u32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // Absorb representation error so 0.3 s is 6 ticks, not 5
    (seconds / DT_MDL + 1e-6).floor() as u32
}
