use serde::{Deserialize, Serialize};

use crate::{config::ScrollConfig, smoothing::ExponentialSmoother};

/// Scroll-derived signals for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollData {
    /// Smoothed progress in `[0, 1]`.
    pub progress: f32,
    /// Smoothed progress change per second.
    pub velocity: f32,
    pub acceleration: f32,
    /// `-1`, `0` or `1`.
    pub direction: i8,
}

/// Turns a raw scroll scalar into progress plus its first and second
/// derivatives.
#[derive(Debug, Clone)]
pub struct ScrollSignalProcessor {
    progress: ExponentialSmoother,
    velocity: ExponentialSmoother,
    direction_threshold: f32,
    /// Progress at the last tick that produced a velocity sample.
    anchor_progress: f32,
    last: ScrollData,
}

impl Default for ScrollSignalProcessor {
    fn default() -> Self {
        Self::new(&ScrollConfig::default())
    }
}

impl ScrollSignalProcessor {
    pub fn new(config: &ScrollConfig) -> Self {
        Self {
            progress: ExponentialSmoother::new(config.progress_alpha),
            velocity: ExponentialSmoother::new(config.velocity_alpha),
            direction_threshold: config.direction_threshold.max(0.0),
            anchor_progress: 0.0,
            last: ScrollData::default(),
        }
    }

    /// Latest computed signals without advancing the processor.
    pub fn data(&self) -> ScrollData {
        self.last
    }

    /// Advances the processor by one tick.
    ///
    /// A non-positive or non-finite `delta` still moves the progress filter
    /// but leaves velocity and acceleration exactly as they were.
    pub fn update(&mut self, raw_scroll: f32, delta: f32) -> ScrollData {
        let progress = self.progress.update(raw_scroll).clamp(0.0, 1.0);

        if !(delta > 0.0) || !delta.is_finite() {
            self.last.progress = progress;
            return self.last;
        }

        let instantaneous = (progress - self.anchor_progress) / delta;
        let velocity = sanitize(self.velocity.update(instantaneous));
        let acceleration = sanitize((velocity - self.last.velocity) / delta);
        self.anchor_progress = progress;

        let direction = if velocity.abs() <= self.direction_threshold {
            0
        } else if velocity > 0.0 {
            1
        } else {
            -1
        };

        self.last = ScrollData {
            progress,
            velocity,
            acceleration,
            direction,
        };
        self.last
    }

    pub fn reset(&mut self) {
        self.progress.reset();
        self.velocity.reset();
        self.anchor_progress = 0.0;
        self.last = ScrollData::default();
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
