//! Rolling ambient-loudness estimate used to adapt the VAD threshold.

use std::collections::VecDeque;

/// Sliding window over the most recent non-speech loudness samples.
///
/// The window only grows while nobody is speaking; the VAD freezes it during
/// a segment so speech loudness never inflates the ambient estimate. The
/// floor is the exact arithmetic mean of the window, 0.0 when empty.
#[derive(Debug, Clone)]
pub struct NoiseFloor {
    window: VecDeque<f32>,
    capacity: usize,
}

impl NoiseFloor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one ambient loudness sample, evicting the oldest past capacity.
    pub fn observe(&mut self, level: f32) {
        self.window.push_back(level);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Current floor: mean of the window contents.
    pub fn value(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.window.iter().sum();
        sum / self.window.len() as f32
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
