use serde::{Deserialize, Serialize};

use crate::{analysis::unit, config::MappingConfig, smoothing::ExponentialSmoother, AudioBands};

/// Perceptual motion amounts derived from the audio bands, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMotion {
    /// Low band through an ease-out cubic: fast swell, soft settle.
    pub expansion: f32,
    /// Mid band through an ease-in-out exponential.
    pub distortion: f32,
    /// High band, linear.
    pub shimmer: f32,
}

/// Smooths each band and applies its response curve.
#[derive(Debug, Clone)]
pub struct AudioMotionMapper {
    bass: ExponentialSmoother,
    mid: ExponentialSmoother,
    high: ExponentialSmoother,
    last: AudioMotion,
}

impl Default for AudioMotionMapper {
    fn default() -> Self {
        Self::new(&MappingConfig::default())
    }
}

impl AudioMotionMapper {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            bass: ExponentialSmoother::new(config.bass_alpha),
            mid: ExponentialSmoother::new(config.mid_alpha),
            high: ExponentialSmoother::new(config.high_alpha),
            last: AudioMotion::default(),
        }
    }

    pub fn motion(&self) -> AudioMotion {
        self.last
    }

    pub fn update(&mut self, bands: AudioBands) -> AudioMotion {
        let bands = bands.sanitized();

        self.last = AudioMotion {
            expansion: unit(ease_out_cubic(unit(self.bass.update(bands.bass)))),
            distortion: unit(ease_in_out_expo(unit(self.mid.update(bands.mid)))),
            shimmer: unit(self.high.update(bands.high)),
        };
        self.last
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.high.reset();
        self.last = AudioMotion::default();
    }
}

pub fn ease_out_cubic(x: f32) -> f32 {
    1.0 - (1.0 - x).powi(3)
}

pub fn ease_in_out_expo(x: f32) -> f32 {
    if x <= 0.0 {
        0.0
    } else if x >= 1.0 {
        1.0
    } else if x < 0.5 {
        2f32.powf(20.0 * x - 10.0) / 2.0
    } else {
        (2.0 - 2f32.powf(-20.0 * x + 10.0)) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_their_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_expo(0.0), 0.0);
        assert_eq!(ease_in_out_expo(1.0), 1.0);
        assert!((ease_in_out_expo(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn expansion_responds_faster_than_shimmer() {
        let mut mapper = AudioMotionMapper::default();
        let motion = mapper.update(AudioBands::new(1.0, 1.0, 1.0));

        // One smoothing step lands every band at 0.15 before curving.
        assert!((motion.shimmer - 0.15).abs() < 1e-6);
        assert!(motion.expansion > motion.shimmer);
        assert!(motion.distortion < motion.shimmer);
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut mapper = AudioMotionMapper::default();
        for input in [5.0, -3.0, f32::NAN, f32::INFINITY, 0.7] {
            let motion = mapper.update(AudioBands::new(input, input, input));
            for value in [motion.expansion, motion.distortion, motion.shimmer] {
                assert!((0.0..=1.0).contains(&value), "{value} out of range");
            }
        }
    }

    #[test]
    fn reset_clears_smoothers() {
        let mut mapper = AudioMotionMapper::default();
        mapper.update(AudioBands::new(1.0, 1.0, 1.0));
        mapper.reset();
        assert_eq!(mapper.motion(), AudioMotion::default());
        assert_eq!(mapper.update(AudioBands::default()), AudioMotion::default());
    }
}
