//! Lane Geometry Fuser
//!
//! Turns per-tick lane-line and road-edge detections into:
//! - per-side lane/edge availability (debounced)
//! - a filtered lane width
//! - a lane-centred target path blended with the model path
//! - the `d_prob` confidence that the lane-derived path should be trusted

pub mod config;
pub mod fuser;
pub mod sample;
pub mod side;

pub use config::FuserConfig;
pub use fuser::{FusedPath, FuserInput, LaneFuser};
pub use sample::{LaneLine, LaneSample};
pub use side::{Side, SideAvailability, SideTracker};
