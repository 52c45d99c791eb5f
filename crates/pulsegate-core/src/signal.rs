use std::collections::VecDeque;

/// Longest window a session may request (a little over 9 hours at 30 fps).
pub const MAX_WINDOW_SAMPLES: usize = 1 << 20;

/// Upper bound on storage reserved up front; larger windows grow on demand.
const PREALLOCATED_SAMPLES: usize = 1 << 12;

/// Number of samples a session keeps: `sample_seconds * fps`, truncated.
///
/// Saturates at `usize::MAX`; NaN and non-positive products give 0.
pub fn buffer_capacity(sample_seconds: f64, fps: u32) -> usize {
    let cap = sample_seconds * fps as f64;
    if cap > 0.0 {
        cap as usize
    } else {
        0
    }
}

/// Sliding window of the most recent intensity samples, in capture order.
///
/// Pushing past the capacity evicts from the head, so the buffer always holds
/// the last `capacity` samples. Values are stored untouched.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SignalBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(PREALLOCATED_SAMPLES)),
            capacity,
        }
    }

    /// Buffer sized for a session of `sample_seconds` at `fps`.
    pub fn for_session(sample_seconds: f64, fps: u32) -> Self {
        Self::new(buffer_capacity(sample_seconds, fps))
    }

    pub fn push(&mut self, sample: f64) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the window holds at least `cap` samples.
    pub fn is_full(&self, cap: usize) -> bool {
        self.samples.len() >= cap
    }

    /// Copy of the window, oldest sample first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}
