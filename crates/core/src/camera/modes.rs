//! Persistent per-mode state. Each struct only advances while its mode is
//! active and keeps its values while inactive, so a resumed mode picks up
//! where it left off. Two exceptions: audio-reactive advances every tick, and
//! the blessing offsets relax towards zero while another mode is active.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::Rng;

use super::{AudioReactiveConfig, CameraConfig, CameraState};

const MAX_SPRING_STEP: f32 = 1.0 / 120.0;
const MAX_SPRING_SUBSTEPS: f32 = 240.0;

/// Frame-rate independent exponential approach of `current` towards
/// `target`.
pub fn approach(current: f32, target: f32, rate: f32, delta: f32) -> f32 {
    let t = 1.0 - (-rate.max(0.0) * delta.max(0.0)).exp();
    current + (target - current) * t
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrbitState {
    /// Accumulated yaw, wrapped into `[0, TAU)`.
    pub yaw: f32,
    pub pitch_phase: f32,
    /// Damped pointer parallax (x feeds yaw, y feeds pitch).
    pub parallax: Vec2,
}

impl OrbitState {
    pub fn update(
        &mut self,
        config: &CameraConfig,
        center: Vec3,
        mouse: Vec2,
        delta: f32,
    ) -> CameraState {
        let orbit = &config.orbit;
        self.yaw = (self.yaw + orbit.yaw_rate * delta).rem_euclid(TAU);
        self.pitch_phase = (self.pitch_phase + orbit.pitch_rate * delta).rem_euclid(TAU);

        let parallax_target = mouse * orbit.parallax;
        let decay = orbit.decay.clamp(0.0, 1.0);
        self.parallax = parallax_target + (self.parallax - parallax_target) * decay;

        let yaw = self.yaw + self.parallax.x;
        let max_pitch = orbit.max_pitch.abs();
        let pitch = (orbit.pitch_amplitude * self.pitch_phase.sin() + self.parallax.y)
            .clamp(-max_pitch, max_pitch);

        let offset = Vec3::new(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        ) * orbit.radius;

        CameraState {
            position: center + offset,
            // Above the centre means looking down.
            rotation: Vec3::new(-pitch, yaw, 0.0),
            field_of_view: config.base_fov,
            target: center,
        }
    }
}

/// Spring-driven dolly. `offset` is measured from the base depth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollDepthState {
    pub offset: f32,
    pub velocity: f32,
}

impl ScrollDepthState {
    pub fn target_offset(config: &CameraConfig, progress: f32) -> f32 {
        progress.clamp(0.0, 1.0) * config.scroll_depth.depth_range
    }

    pub fn update(
        &mut self,
        config: &CameraConfig,
        look_target: Vec3,
        progress: f32,
        scroll_velocity: f32,
        delta: f32,
    ) -> CameraState {
        let spring = &config.scroll_depth;
        if delta > 0.0 {
            let target = Self::target_offset(config, progress);
            self.velocity += scroll_velocity * spring.depth_range * spring.momentum * delta;

            let steps = (delta / MAX_SPRING_STEP).ceil().clamp(1.0, MAX_SPRING_SUBSTEPS);
            let step = delta / steps;
            for _ in 0..steps as u32 {
                let acceleration = (target - self.offset) * spring.spring_strength
                    - self.velocity * spring.damping;
                self.velocity += acceleration * step;
                self.offset += self.velocity * step;
            }

            if !self.offset.is_finite() || !self.velocity.is_finite() {
                *self = Self::default();
            }
        }

        CameraState {
            position: config.base_position + Vec3::Z * self.offset,
            rotation: Vec3::ZERO,
            field_of_view: config.base_fov,
            target: look_target + Vec3::Z * self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuruFocusState {
    /// `[0, 1]` blend from the base pose to the focused pose.
    pub progress: f32,
}

impl GuruFocusState {
    pub fn update(&mut self, config: &CameraConfig, bass: f32, delta: f32) -> CameraState {
        let focus = &config.guru_focus;
        self.progress = approach(self.progress, 1.0, focus.rate, delta).clamp(0.0, 1.0);

        let focused = focus.focal_point + Vec3::Z * focus.focus_depth;
        let position = config.base_position.lerp(focused, self.progress);
        let pulse = 1.0 + (bass.clamp(0.0, 1.0) * 2.0 - 1.0) * focus.pulse;

        CameraState {
            position: position * pulse,
            rotation: Vec3::ZERO,
            field_of_view: config.base_fov,
            target: config.base_target.lerp(focus.focal_point, self.progress),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlessingPulseState {
    /// Degrees added to the base field of view.
    pub fov_offset: f32,
    pub depth_offset: f32,
}

impl BlessingPulseState {
    pub fn update(
        &mut self,
        config: &CameraConfig,
        wave_progress: f32,
        delta: f32,
    ) -> CameraState {
        let blessing = &config.blessing_pulse;
        let wave_progress = wave_progress.clamp(0.0, 1.0);
        self.fov_offset = approach(
            self.fov_offset,
            wave_progress * blessing.max_fov_offset,
            blessing.rate,
            delta,
        );
        self.depth_offset = approach(
            self.depth_offset,
            wave_progress * blessing.depth_push,
            blessing.rate,
            delta,
        );

        CameraState {
            position: config.base_position + Vec3::Z * self.depth_offset,
            rotation: Vec3::ZERO,
            field_of_view: config.base_fov + self.fov_offset,
            target: config.guru_focus.focal_point,
        }
    }

    /// Decays both offsets towards zero while another mode drives the pose.
    /// Returns `(fov_offset, depth_offset)` to layer onto that pose.
    pub fn relax(&mut self, config: &CameraConfig, delta: f32) -> (f32, f32) {
        let rate = config.blessing_pulse.rate;
        self.fov_offset = approach(self.fov_offset, 0.0, rate, delta);
        self.depth_offset = approach(self.depth_offset, 0.0, rate, delta);
        (self.fov_offset, self.depth_offset)
    }
}

/// Jitter layered over whichever mode is active.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioReactiveState {
    pub shake: Vec3,
    pub rotation: Vec3,
}

impl AudioReactiveState {
    /// Returns `(position_offset, rotation_offset)` for this tick. The
    /// shimmer part of the position offset is not carried over.
    ///
    /// Injection is scaled by `1 - damping`, so a band held at full level
    /// settles at `shake_amount` (or `rotation_amount`) per axis.
    pub fn update<R: Rng>(
        &mut self,
        config: &AudioReactiveConfig,
        bass: f32,
        mid: f32,
        high: f32,
        rng: &mut R,
    ) -> (Vec3, Vec3) {
        let damping = config.damping.clamp(0.0, 1.0);
        let gain = 1.0 - damping;
        self.shake = self.shake * damping + jitter(rng) * bass * config.shake_amount * gain;
        self.rotation =
            self.rotation * damping + jitter(rng) * mid * config.rotation_amount * gain;
        let shimmer = jitter(rng) * high * config.shimmer_amount;
        (self.shake + shimmer, self.rotation)
    }

    pub fn kick<R: Rng>(&mut self, amount: f32, rng: &mut R) {
        self.shake += jitter(rng) * amount;
    }
}

fn jitter<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectionAlignmentState {
    /// Radians.
    pub pitch: f32,
}

impl ProjectionAlignmentState {
    pub fn update(&mut self, config: &CameraConfig, delta: f32) -> CameraState {
        let alignment = &config.projection_alignment;
        self.pitch = approach(self.pitch, alignment.target_pitch, alignment.rate, delta);

        let distance = (config.base_position - config.base_target)
            .length()
            .max(1e-3);
        let forward = Vec3::new(0.0, self.pitch.sin(), -self.pitch.cos());

        CameraState {
            position: config.base_position,
            rotation: Vec3::new(self.pitch, 0.0, 0.0),
            field_of_view: config.base_fov,
            target: config.base_position + forward * distance,
        }
    }
}

/// Every mode's persistent state, owned by the camera engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeStates {
    pub orbit: OrbitState,
    pub scroll_depth: ScrollDepthState,
    pub guru_focus: GuruFocusState,
    pub blessing_pulse: BlessingPulseState,
    pub audio_reactive: AudioReactiveState,
    pub projection_alignment: ProjectionAlignmentState,
}
