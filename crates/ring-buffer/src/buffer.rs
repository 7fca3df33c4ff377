//! Ring Buffer Implementation

/// Fixed-capacity ring buffer that overwrites its oldest entry when full
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Copy + Default, const N: usize> {
    /// Pre-allocated storage
    storage: [T; N],
    /// Index of the oldest entry
    tail: usize,
    /// Number of valid entries
    len: usize,
    /// Total entries written (for statistics)
    total_written: usize,
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    /// Create an empty buffer
    pub fn new() -> Self {
        assert!(N > 0, "RingBuffer capacity must be > 0");
        Self {
            storage: [T::default(); N],
            tail: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push a value, returning the evicted oldest value if the buffer was full
    pub fn push(&mut self, value: T) -> Option<T> {
        self.total_written += 1;

        if self.len < N {
            let idx = (self.tail + self.len) % N;
            self.storage[idx] = value;
            self.len += 1;
            return None;
        }

        let evicted = self.storage[self.tail];
        self.storage[self.tail] = value;
        self.tail = (self.tail + 1) % N;
        Some(evicted)
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Get the buffer capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / N as f64
    }

    /// Oldest entry
    pub fn front(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.tail])
        }
    }

    /// Newest entry
    pub fn back(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[(self.tail + self.len - 1) % N])
        }
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.storage[(self.tail + i) % N])
    }

    /// Read the last `count` entries (most recent first)
    pub fn read_last(&self, count: usize) -> Vec<T> {
        let count = count.min(self.len);
        (0..count)
            .map(|i| self.storage[(self.tail + self.len - 1 - i) % N])
            .collect()
    }

    /// Get total entries written (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.tail = 0;
        self.len = 0;
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
