//! Bounded reading history
//!
//! Holds the most recent readings in arrival order. Once the window is at
//! capacity, each push evicts the single oldest reading before appending.

use std::collections::VecDeque;

use crate::models::Reading;

/// Fixed-capacity FIFO buffer of the most recent readings
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window holding at most `capacity` readings
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// The most recent `min(k, len)` readings, oldest first
    pub fn snapshot(&self, k: usize) -> Vec<Reading> {
        let skip = self.readings.len().saturating_sub(k);
        self.readings.iter().skip(skip).copied().collect()
    }

    /// The most recently pushed reading
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Reading values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.value).collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
