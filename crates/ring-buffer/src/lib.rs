//! Fixed-Capacity Ring Buffer
//!
//! Provides bounded, compile-time sized history windows for per-tick
//! signals. Nothing here allocates after construction.

mod buffer;
mod window;

pub use buffer::RingBuffer;
pub use window::WindowMean;
