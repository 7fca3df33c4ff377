//! Debounced presence counter

use crate::timing::seconds_to_ticks;
use serde::{Deserialize, Serialize};

/// Signed presence counter that only moves once a flag has held steady
/// for `threshold` consecutive ticks.
///
/// A positive `counter` means "confirmed present" and counts ticks since
/// confirmation; a negative one means "confirmed absent". It never flips
/// sign on a single noisy sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExistCounter {
    counter: i32,
    true_count: u32,
    false_count: u32,
    threshold: u32,
}

impl ExistCounter {
    /// Counter requiring `sustain_s` seconds of agreement before moving
    pub fn new(sustain_s: f64) -> Self {
        Self::with_threshold(seconds_to_ticks(sustain_s))
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            counter: 0,
            true_count: 0,
            false_count: 0,
            threshold,
        }
    }

    /// Feed this tick's flag and get the updated counter
    pub fn update(&mut self, exist: bool) -> i32 {
        if exist {
            self.true_count = self.true_count.saturating_add(1);
            self.false_count = 0;
            if self.true_count >= self.threshold {
                self.counter = self.counter.saturating_add(1).max(1);
            }
        } else {
            self.false_count = self.false_count.saturating_add(1);
            self.true_count = 0;
            if self.false_count >= self.threshold {
                self.counter = self.counter.saturating_sub(1).min(-1);
            }
        }
        self.counter
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        *self = Self::with_threshold(self.threshold);
    }
}

impl Default for ExistCounter {
    fn default() -> Self {
        Self::new(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_needs_sustained_presence() {
        let mut counter = ExistCounter::new(0.2);
        assert_eq!(counter.threshold(), 4);

        for _ in 0..3 {
            assert_eq!(counter.update(true), 0);
        }
        assert_eq!(counter.update(true), 1);
        assert_eq!(counter.update(true), 2);
    }

    #[test]
    fn test_flips_to_absent() {
        let mut counter = ExistCounter::new(0.2);
        for _ in 0..10 {
            counter.update(true);
        }
        assert!(counter.counter() > 0);

        // A single dropout does not move the counter
        let held = counter.counter();
        assert_eq!(counter.update(false), held);

        for _ in 0..3 {
            counter.update(false);
        }
        assert_eq!(counter.counter(), -1);
    }

    proptest! {
        #[test]
        fn prop_single_frame_never_flips(flags in prop::collection::vec(any::<bool>(), 1..200)) {
            let mut counter = ExistCounter::new(0.2);
            let mut prev = counter.counter();
            let mut run = 0u32;
            let mut last_flag = None;
            for flag in flags {
                run = if last_flag == Some(flag) { run + 1 } else { 1 };
                last_flag = Some(flag);
                let next = counter.update(flag);
                if next != prev {
                    // Any change requires the flag to have held for the threshold
                    prop_assert!(run >= counter.threshold());
                }
                prev = next;
            }
        }
    }
}
