use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CameraConfig, MotionError, Result};

/// Top-level configuration structure for the motion core.
///
/// Every section carries in-process defaults; a JSON document only needs to
/// name the values it wants to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub scroll: ScrollConfig,
    pub audio: AudioConfig,
    pub mapping: MappingConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Parses a (possibly partial) JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Rejects values that would make a processor meaningless rather than
    /// merely noisy.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(MotionError::InvalidInput("sample rate must be positive"));
        }
        if self.audio.fft_size < 2 {
            return Err(MotionError::InvalidInput(
                "fft size must cover at least two samples",
            ));
        }
        if self.audio.max_decibels <= self.audio.min_decibels {
            return Err(MotionError::InvalidInput(
                "max decibels must exceed min decibels",
            ));
        }
        if !(self.scheduler.max_delta > 0.0) {
            return Err(MotionError::InvalidInput("max delta must be positive"));
        }
        Ok(())
    }
}

/// Frame scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound for the per-tick delta in seconds. Protects the dynamics
    /// from a huge step after the host stalls.
    pub max_delta: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_delta: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub progress_alpha: f32,
    pub velocity_alpha: f32,
    /// Velocities at or below this magnitude report no direction.
    pub direction_threshold: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            progress_alpha: 0.1,
            velocity_alpha: 0.3,
            direction_threshold: 0.01,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    /// Moving-average window applied to each band.
    pub band_window: usize,
    pub bass_range_hz: (f32, f32),
    pub mid_range_hz: (f32, f32),
    pub high_range_hz: (f32, f32),
    pub min_decibels: f32,
    pub max_decibels: f32,
    pub smoothing_time_constant: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 2048,
            band_window: 10,
            bass_range_hz: (20.0, 250.0),
            mid_range_hz: (250.0, 4_000.0),
            high_range_hz: (4_000.0, 20_000.0),
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing_time_constant: 0.8,
        }
    }
}

/// Smoothing applied by the audio motion mapper before its response curves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub bass_alpha: f32,
    pub mid_alpha: f32,
    pub high_alpha: f32,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            bass_alpha: 0.15,
            mid_alpha: 0.15,
            high_alpha: 0.15,
        }
    }
}

/// Device-tier knobs carried for the renderer. The core never reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub mobile: bool,
    pub particle_reduction: f32,
    pub segment_reduction: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mobile: false,
            particle_reduction: 0.5,
            segment_reduction: 0.6,
        }
    }
}

impl RenderConfig {
    /// Scales a particle budget down on mobile devices.
    pub fn particle_count(&self, desktop: usize) -> usize {
        if self.mobile {
            ((desktop as f32) * self.particle_reduction.clamp(0.0, 1.0)).round() as usize
        } else {
            desktop
        }
    }

    /// Scales a geometry segment count down on mobile devices, keeping at
    /// least three segments so shapes stay closed.
    pub fn segment_count(&self, desktop: u32) -> u32 {
        if self.mobile {
            (((desktop as f32) * self.segment_reduction.clamp(0.0, 1.0)).round() as u32).max(3)
        } else {
            desktop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(r#"{ "scroll": { "velocity_alpha": 0.5 } }"#)
            .expect("partial config should parse");

        assert_eq!(config.scroll.velocity_alpha, 0.5);
        assert_eq!(config.scroll.progress_alpha, 0.1);
        assert_eq!(config.audio.band_window, 10);
        assert_eq!(config.camera.base_fov, CameraConfig::default().base_fov);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = AppConfig::from_json_str(r#"{ "audio": { "sample_rate": 0 } }"#).unwrap_err();
        assert!(matches!(err, MotionError::InvalidInput(_)));
    }

    #[test]
    fn mobile_tier_reduces_counts() {
        let render = RenderConfig {
            mobile: true,
            ..Default::default()
        };
        assert_eq!(render.particle_count(1000), 500);
        assert_eq!(render.segment_count(4), 3);
        assert_eq!(RenderConfig::default().particle_count(1000), 1000);
    }
}
