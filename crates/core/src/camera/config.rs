use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Camera tuning: the resting pose plus one section per mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub base_position: Vec3,
    pub base_target: Vec3,
    /// Degrees.
    pub base_fov: f32,
    pub near: f32,
    pub far: f32,
    /// Smoothed scroll progress above which scroll-depth takes over.
    pub scroll_activation: f32,
    pub orbit: OrbitConfig,
    pub scroll_depth: ScrollDepthConfig,
    pub guru_focus: GuruFocusConfig,
    pub blessing_pulse: BlessingPulseConfig,
    pub audio_reactive: AudioReactiveConfig,
    pub projection_alignment: ProjectionAlignmentConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_position: Vec3::new(0.0, 0.0, 8.0),
            base_target: Vec3::ZERO,
            base_fov: 60.0,
            near: 0.1,
            far: 1_000.0,
            scroll_activation: 1e-3,
            orbit: OrbitConfig::default(),
            scroll_depth: ScrollDepthConfig::default(),
            guru_focus: GuruFocusConfig::default(),
            blessing_pulse: BlessingPulseConfig::default(),
            audio_reactive: AudioReactiveConfig::default(),
            projection_alignment: ProjectionAlignmentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub radius: f32,
    /// Radians per second.
    pub yaw_rate: f32,
    /// Radians per second of the vertical bob phase.
    pub pitch_rate: f32,
    /// Radians.
    pub pitch_amplitude: f32,
    /// Radians of yaw/pitch per unit of pointer offset.
    pub parallax: f32,
    /// Per-tick retention of the parallax offset, `[0, 1)`.
    pub decay: f32,
    /// Radians.
    pub max_pitch: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            yaw_rate: 0.05,
            pitch_rate: 0.3,
            pitch_amplitude: 0.08,
            parallax: 0.15,
            decay: 0.92,
            max_pitch: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollDepthConfig {
    /// Depth change at full scroll progress; negative moves towards the
    /// scene.
    pub depth_range: f32,
    pub spring_strength: f32,
    pub damping: f32,
    /// Share of scroll velocity injected into the spring each tick.
    pub momentum: f32,
}

impl ScrollDepthConfig {
    /// Damping coefficient that makes a unit-mass spring critically damped.
    pub fn critical_damping(spring_strength: f32) -> f32 {
        2.0 * spring_strength.max(0.0).sqrt()
    }
}

impl Default for ScrollDepthConfig {
    fn default() -> Self {
        let spring_strength = 40.0;
        Self {
            depth_range: -5.0,
            spring_strength,
            damping: Self::critical_damping(spring_strength),
            momentum: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuruFocusConfig {
    pub focal_point: Vec3,
    /// Distance in front of the focal point once fully focused.
    pub focus_depth: f32,
    pub rate: f32,
    /// Fractional position pulse driven by the bass band.
    pub pulse: f32,
}

impl Default for GuruFocusConfig {
    fn default() -> Self {
        Self {
            focal_point: Vec3::new(0.0, 1.5, 0.0),
            focus_depth: 4.0,
            rate: 3.0,
            pulse: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlessingPulseConfig {
    /// Degrees added at full wave progress.
    pub max_fov_offset: f32,
    /// Outward depth push at full wave progress.
    pub depth_push: f32,
    pub rate: f32,
}

impl Default for BlessingPulseConfig {
    fn default() -> Self {
        Self {
            max_fov_offset: 5.0,
            depth_push: 1.5,
            rate: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioReactiveConfig {
    pub shake_amount: f32,
    pub rotation_amount: f32,
    pub shimmer_amount: f32,
    /// Per-tick retention of shake and rotation jitter, `[0, 1)`.
    pub damping: f32,
    /// Positional kick of a one-shot `shake(1.0)`.
    pub impulse: f32,
}

impl Default for AudioReactiveConfig {
    fn default() -> Self {
        Self {
            shake_amount: 0.015,
            rotation_amount: 0.01,
            shimmer_amount: 0.004,
            damping: 0.85,
            impulse: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionAlignmentConfig {
    /// Radians; negative tilts down.
    pub target_pitch: f32,
    pub rate: f32,
}

impl Default for ProjectionAlignmentConfig {
    fn default() -> Self {
        Self {
            target_pitch: -0.35,
            rate: 2.5,
        }
    }
}
