//! Scalar filters shared by the signal processors.

use std::collections::VecDeque;

/// Single-value low-pass filter: `value <- alpha * input + (1 - alpha) * value`.
#[derive(Debug, Clone)]
pub struct ExponentialSmoother {
    alpha: f32,
    value: f32,
}

impl ExponentialSmoother {
    /// Creates a smoother starting at zero. `alpha` is clamped into the open
    /// interval `(0, 1)`; a non-finite `alpha` becomes `0.5`.
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(f32::EPSILON, 1.0 - f32::EPSILON)
        } else {
            0.5
        };
        Self { alpha, value: 0.0 }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Feeds one sample and returns the filtered value. Non-finite samples
    /// are ignored so a glitching sensor cannot poison the state.
    pub fn update(&mut self, input: f32) -> f32 {
        if input.is_finite() {
            self.value = self.alpha * input + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Arithmetic mean over the last `capacity` samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    capacity: usize,
    samples: VecDeque<f32>,
}

impl MovingAverage {
    /// Creates an empty window. A zero capacity behaves like a window of one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Pushes a sample, evicting the oldest once the window is full, and
    /// returns the new mean.
    pub fn add(&mut self, sample: f32) -> f32 {
        let sample = if sample.is_finite() { sample } else { 0.0 };
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.average()
    }

    /// Mean of the buffered samples, zero when empty.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
