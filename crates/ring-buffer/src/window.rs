//! Running mean over a fixed window

use crate::RingBuffer;

/// O(1) running mean over the last `N` samples
#[derive(Debug, Clone, Default)]
pub struct WindowMean<const N: usize> {
    samples: RingBuffer<f64, N>,
    sum: f64,
}

impl<const N: usize> WindowMean<N> {
    pub fn new() -> Self {
        Self {
            samples: RingBuffer::new(),
            sum: 0.0,
        }
    }

    /// Add a sample and return the updated mean
    pub fn push(&mut self, value: f64) -> f64 {
        if let Some(old) = self.samples.push(value) {
            self.sum -= old;
        }
        self.sum += value;
        self.mean()
    }

    /// Mean of the samples in the window (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// Newest minus oldest sample (0.0 with fewer than two samples)
    pub fn span(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => last - first,
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
