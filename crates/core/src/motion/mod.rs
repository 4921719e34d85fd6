use serde::{Deserialize, Serialize};

use crate::{
    analysis::unit, AppConfig, AudioBands, AudioMotionMapper, ScrollData, ScrollSignalProcessor,
};

/// Canonical per-tick snapshot handed to every registered engine.
///
/// Bounded fields are always inside their documented range; a new tick
/// produces a new value instead of mutating the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionState {
    /// Seconds since the scheduler started.
    pub time: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
    /// `[0, 1]`
    pub scroll_progress: f32,
    pub scroll_velocity: f32,
    pub scroll_acceleration: f32,
    /// `-1`, `0` or `1`.
    pub scroll_direction: i8,
    /// `[0, 1]`
    pub bass_motion: f32,
    /// `[0, 1]`
    pub mid_motion: f32,
    /// `[0, 1]`
    pub high_motion: f32,
    /// `[0, 1]`, see [`global_motion`].
    pub global_motion: f32,
}

/// Overall scene energy: the strongest of the weighted scroll and audio
/// contributions.
pub fn global_motion(scroll_velocity: f32, bass: f32, mid: f32, high: f32) -> f32 {
    let candidates = [
        0.3 * scroll_velocity.abs(),
        0.4 * bass,
        0.2 * mid,
        0.1 * high,
    ];
    unit(
        candidates
            .into_iter()
            .filter(|value| value.is_finite())
            .fold(0.0, f32::max),
    )
}

/// Combines scroll, audio and time into the [`MotionState`] of record.
#[derive(Debug, Clone, Default)]
pub struct MotionSynchronizer {
    scroll: ScrollSignalProcessor,
    audio: AudioMotionMapper,
    state: MotionState,
}

impl MotionSynchronizer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            scroll: ScrollSignalProcessor::new(&config.scroll),
            audio: AudioMotionMapper::new(&config.mapping),
            state: MotionState::default(),
        }
    }

    pub fn update(
        &mut self,
        time: f32,
        delta: f32,
        raw_scroll: f32,
        audio: AudioBands,
    ) -> MotionState {
        let ScrollData {
            progress,
            velocity,
            acceleration,
            direction,
        } = self.scroll.update(raw_scroll, delta);
        let motion = self.audio.update(audio);

        self.state = MotionState {
            time: finite_or_zero(time),
            delta: finite_or_zero(delta).max(0.0),
            scroll_progress: unit(progress),
            scroll_velocity: velocity,
            scroll_acceleration: acceleration,
            scroll_direction: direction,
            bass_motion: motion.expansion,
            mid_motion: motion.distortion,
            high_motion: motion.shimmer,
            global_motion: global_motion(
                velocity,
                motion.expansion,
                motion.distortion,
                motion.shimmer,
            ),
        };
        self.state
    }

    /// Last computed state, without advancing.
    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn reset(&mut self) {
        self.scroll.reset();
        self.audio.reset();
        self.state = MotionState::default();
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn assert_bounded(state: &MotionState) {
        for value in [
            state.scroll_progress,
            state.bass_motion,
            state.mid_motion,
            state.high_motion,
            state.global_motion,
        ] {
            assert!((0.0..=1.0).contains(&value), "{value} out of range in {state:?}");
        }
    }

    #[test]
    fn global_motion_takes_strongest_contribution() {
        assert!((global_motion(0.0, 1.0, 0.0, 0.0) - 0.4).abs() < 1e-6);
        assert!((global_motion(-2.0, 0.1, 0.1, 0.1) - 0.6).abs() < 1e-6);
        assert_eq!(global_motion(100.0, 0.0, 0.0, 0.0), 1.0);
        assert_eq!(global_motion(f32::NAN, 0.0, 0.0, 0.5), 0.05);
    }

    #[test]
    fn state_stays_bounded_under_hostile_input() {
        let mut sync = MotionSynchronizer::default();
        let inputs = [
            (0.5, AudioBands::new(0.2, 0.4, 0.9)),
            (12.0, AudioBands::new(4.0, -1.0, 2.0)),
            (-7.0, AudioBands::new(f32::NAN, f32::INFINITY, 0.0)),
            (f32::NAN, AudioBands::new(1.0, 1.0, 1.0)),
        ];
        let mut time = 0.0;
        for _ in 0..50 {
            for (scroll, audio) in inputs {
                time += DT;
                let state = sync.update(time, DT, scroll, audio);
                assert_bounded(&state);
            }
        }
    }

    #[test]
    fn retains_last_state() {
        let mut sync = MotionSynchronizer::default();
        let state = sync.update(1.0, DT, 0.3, AudioBands::new(0.5, 0.5, 0.5));
        assert_eq!(sync.state(), state);
        assert_eq!(state.time, 1.0);
        assert_eq!(state.delta, DT);
    }

    #[test]
    fn reset_cascades() {
        let mut sync = MotionSynchronizer::default();
        for i in 0..10 {
            sync.update(i as f32 * DT, DT, 1.0, AudioBands::new(1.0, 1.0, 1.0));
        }
        sync.reset();
        assert_eq!(sync.state(), MotionState::default());

        let state = sync.update(0.0, DT, 0.0, AudioBands::default());
        assert_eq!(state.scroll_velocity, 0.0);
        assert_eq!(state.bass_motion, 0.0);
    }
}
