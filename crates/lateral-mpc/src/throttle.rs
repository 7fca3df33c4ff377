//! Tick-counted cooldown for repeated warnings

use signal_core::seconds_to_ticks;

/// Lets a warning through at most once per cooldown period
#[derive(Debug, Clone)]
pub struct WarnThrottle {
    cooldown_ticks: u32,
    /// Ticks since the last warning, `None` before the first one
    since_fired: Option<u32>,
}

impl WarnThrottle {
    pub fn new(cooldown_s: f64) -> Self {
        Self {
            cooldown_ticks: seconds_to_ticks(cooldown_s),
            since_fired: None,
        }
    }

    /// Advance one planning tick
    pub fn tick(&mut self) {
        if let Some(ticks) = self.since_fired.as_mut() {
            *ticks = ticks.saturating_add(1);
        }
    }

    /// True if a warning may fire now; arms the cooldown when it does
    pub fn ready(&mut self) -> bool {
        match self.since_fired {
            Some(ticks) if ticks < self.cooldown_ticks => false,
            _ => {
                self.since_fired = Some(0);
                true
            }
        }
    }
}
