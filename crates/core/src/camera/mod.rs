//! Camera mode engine: a priority-arbitrated state machine that turns the
//! per-tick [`MotionState`] and the UI interaction flags into a camera pose.

mod config;
mod modes;

use std::{cell::RefCell, fmt, rc::Rc, str::FromStr};

use glam::{Vec2, Vec3};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use config::{
    AudioReactiveConfig, BlessingPulseConfig, CameraConfig, GuruFocusConfig, OrbitConfig,
    ProjectionAlignmentConfig, ScrollDepthConfig,
};
pub use modes::{
    approach, AudioReactiveState, BlessingPulseState, GuruFocusState, ModeStates, OrbitState,
    ProjectionAlignmentState, ScrollDepthState,
};

use crate::{analysis::unit, InteractionState, MotionError, MotionState, Orchestrator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraMode {
    #[default]
    Orbit,
    ScrollDepth,
    GuruFocus,
    BlessingPulse,
    /// Always layered on top; selecting it explicitly leaves the base pose
    /// to the orbit behaviour.
    AudioReactive,
    ProjectionAlignment,
}

impl CameraMode {
    pub const ALL: [CameraMode; 6] = [
        CameraMode::Orbit,
        CameraMode::ScrollDepth,
        CameraMode::GuruFocus,
        CameraMode::BlessingPulse,
        CameraMode::AudioReactive,
        CameraMode::ProjectionAlignment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CameraMode::Orbit => "orbit",
            CameraMode::ScrollDepth => "scroll-depth",
            CameraMode::GuruFocus => "guru-focus",
            CameraMode::BlessingPulse => "blessing-pulse",
            CameraMode::AudioReactive => "audio-reactive",
            CameraMode::ProjectionAlignment => "projection-alignment",
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraMode {
    type Err = MotionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| MotionError::msg(format!("unknown camera mode `{value}`")))
    }
}

/// Published camera pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub position: Vec3,
    /// Pitch, yaw, roll in radians.
    pub rotation: Vec3,
    /// Degrees.
    pub field_of_view: f32,
    /// Look-at point.
    pub target: Vec3,
}

impl CameraState {
    /// Resting pose for `config`.
    pub fn initial(config: &CameraConfig) -> Self {
        Self {
            position: config.base_position,
            rotation: Vec3::ZERO,
            field_of_view: config.base_fov,
            target: config.base_target,
        }
    }

    fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.field_of_view.is_finite()
            && self.target.is_finite()
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::initial(&CameraConfig::default())
    }
}

/// Everything the camera reads on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInputs {
    pub scroll_progress: f32,
    pub scroll_velocity: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub is_guru_hovered: bool,
    pub is_blessing_wave_active: bool,
    pub blessing_wave_progress: f32,
    pub mouse: Vec2,
}

impl CameraInputs {
    pub fn from_motion(motion: &MotionState, interaction: &InteractionState) -> Self {
        Self {
            scroll_progress: motion.scroll_progress,
            scroll_velocity: motion.scroll_velocity,
            bass: motion.bass_motion,
            mid: motion.mid_motion,
            high: motion.high_motion,
            is_guru_hovered: interaction.is_guru_hovered,
            is_blessing_wave_active: interaction.is_blessing_wave_active,
            blessing_wave_progress: interaction.blessing_wave_progress,
            mouse: Vec2::new(interaction.mouse_x, interaction.mouse_y),
        }
    }

    /// Clamps every signal into its documented range; non-finite values
    /// become zero.
    pub fn sanitized(self) -> Self {
        let finite = |value: f32| if value.is_finite() { value } else { 0.0 };
        Self {
            scroll_progress: unit(self.scroll_progress),
            scroll_velocity: finite(self.scroll_velocity),
            bass: unit(self.bass),
            mid: unit(self.mid),
            high: unit(self.high),
            blessing_wave_progress: unit(self.blessing_wave_progress),
            mouse: Vec2::new(finite(self.mouse.x), finite(self.mouse.y))
                .clamp(Vec2::NEG_ONE, Vec2::ONE),
            ..self
        }
    }
}

/// Picks the mode that drives the base pose this tick. Interaction flags
/// outrank the explicitly selected mode:
///
/// 1. an active blessing wave with progress → blessing-pulse
/// 2. guru hovered, or a blessing wave still starting → guru-focus
/// 3. scroll progress above `scroll_activation` → scroll-depth
/// 4. otherwise `current`
///
/// The engine calls this with [`CameraConfig::scroll_activation`].
pub fn resolve_mode(
    current: CameraMode,
    inputs: &CameraInputs,
    scroll_activation: f32,
) -> CameraMode {
    if inputs.is_blessing_wave_active && inputs.blessing_wave_progress > 0.0 {
        CameraMode::BlessingPulse
    } else if inputs.is_guru_hovered || inputs.is_blessing_wave_active {
        CameraMode::GuruFocus
    } else if inputs.scroll_progress > scroll_activation.max(0.0) {
        CameraMode::ScrollDepth
    } else {
        current
    }
}

/// Camera state machine. Owns the published [`CameraState`] and every
/// mode's persistent state.
pub struct CameraModeEngine {
    config: CameraConfig,
    state: CameraState,
    current_mode: CameraMode,
    active_mode: CameraMode,
    modes: ModeStates,
    look_target: Vec3,
    offset: Vec3,
    rng: StdRng,
}

impl CameraModeEngine {
    pub fn new(config: CameraConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic jitter, for tests and offline renders.
    pub fn with_seed(config: CameraConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: CameraConfig, rng: StdRng) -> Self {
        Self {
            state: CameraState::initial(&config),
            look_target: config.base_target,
            config,
            current_mode: CameraMode::Orbit,
            active_mode: CameraMode::Orbit,
            modes: ModeStates::default(),
            offset: Vec3::ZERO,
            rng,
        }
    }

    /// Advances the active mode and the audio layer by one tick.
    ///
    /// If the computation degenerates the previous pose is kept.
    pub fn update(&mut self, delta: f32, inputs: &CameraInputs) -> &CameraState {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        let inputs = &inputs.sanitized();

        let mode = resolve_mode(self.current_mode, inputs, self.config.scroll_activation);
        if mode != self.active_mode {
            tracing::debug!(from = %self.active_mode, to = %mode, "camera mode changed");
            self.active_mode = mode;
        }

        let config = &self.config;
        let mut pose = match mode {
            CameraMode::Orbit | CameraMode::AudioReactive => {
                self.modes
                    .orbit
                    .update(config, self.look_target, inputs.mouse, delta)
            }
            CameraMode::ScrollDepth => self.modes.scroll_depth.update(
                config,
                self.look_target,
                inputs.scroll_progress,
                inputs.scroll_velocity,
                delta,
            ),
            CameraMode::GuruFocus => self.modes.guru_focus.update(config, inputs.bass, delta),
            CameraMode::BlessingPulse => {
                self.modes
                    .blessing_pulse
                    .update(config, inputs.blessing_wave_progress, delta)
            }
            CameraMode::ProjectionAlignment => {
                self.modes.projection_alignment.update(config, delta)
            }
        };

        if mode != CameraMode::BlessingPulse {
            let (fov_offset, depth_offset) = self.modes.blessing_pulse.relax(config, delta);
            pose.field_of_view += fov_offset;
            pose.position += Vec3::Z * depth_offset;
        }

        let (shake, jitter) = self.modes.audio_reactive.update(
            &config.audio_reactive,
            inputs.bass,
            inputs.mid,
            inputs.high,
            &mut self.rng,
        );
        pose.position += shake + self.offset;
        pose.rotation += jitter;

        if pose.is_finite() {
            self.state = pose;
        } else {
            tracing::warn!(mode = %mode, "camera pose degenerated; keeping previous pose");
            self.modes.audio_reactive = AudioReactiveState::default();
        }
        &self.state
    }

    /// Selects the mode used when no interaction flag takes priority.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode != self.current_mode {
            tracing::debug!(from = %self.current_mode, to = %mode, "camera mode selected");
            self.current_mode = mode;
        }
    }

    /// Moves the look-at point used by orbit and scroll-depth.
    pub fn set_target(&mut self, target: Vec3) {
        self.look_target = target;
        self.state.target = target;
    }

    /// Sets the positional offset added on top of every mode, replacing the
    /// previous one. The published position moves by the difference right
    /// away.
    pub fn set_offset(&mut self, offset: Vec3) {
        self.state.position += offset - self.offset;
        self.offset = offset;
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// One-shot positional jitter; decays like bass shake.
    pub fn shake(&mut self, intensity: f32) {
        let intensity = if intensity.is_finite() { intensity.max(0.0) } else { 0.0 };
        let amount = self.config.audio_reactive.impulse * intensity;
        self.modes.audio_reactive.kick(amount, &mut self.rng);
    }

    /// Returns every mode and the published pose to their defaults.
    pub fn reset(&mut self) {
        self.modes = ModeStates::default();
        self.state = CameraState::initial(&self.config);
        self.look_target = self.config.base_target;
        self.offset = Vec3::ZERO;
        self.current_mode = CameraMode::Orbit;
        self.active_mode = CameraMode::Orbit;
    }

    /// Applies a partial configuration change in place. Takes effect on the
    /// next [`update`](Self::update).
    pub fn update_config(&mut self, apply: impl FnOnce(&mut CameraConfig)) {
        apply(&mut self.config);
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn current_mode(&self) -> CameraMode {
        self.current_mode
    }

    /// Mode that drove the most recent update.
    pub fn active_mode(&self) -> CameraMode {
        self.active_mode
    }

    pub fn modes(&self) -> &ModeStates {
        &self.modes
    }
}

impl Default for CameraModeEngine {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl fmt::Debug for CameraModeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraModeEngine")
            .field("current_mode", &self.current_mode)
            .field("active_mode", &self.active_mode)
            .field("state", &self.state)
            .field("modes", &self.modes)
            .finish()
    }
}

/// A camera engine registered with an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct CameraRig {
    camera: Rc<RefCell<CameraModeEngine>>,
}

impl CameraRig {
    pub const ENGINE_NAME: &'static str = "camera";

    /// Registers `camera` so it advances on every orchestrator tick, reading
    /// the orchestrator's interaction state.
    pub fn attach(orchestrator: &Orchestrator, camera: CameraModeEngine) -> Self {
        let camera = Rc::new(RefCell::new(camera));
        let interaction = orchestrator.interaction_handle();
        let engine = Rc::clone(&camera);

        orchestrator.register_engine(Self::ENGINE_NAME, move |motion| {
            let inputs = CameraInputs::from_motion(motion, &interaction.get());
            let mut camera = engine
                .try_borrow_mut()
                .map_err(|_| MotionError::msg("camera is borrowed outside the tick"))?;
            camera.update(motion.delta, &inputs);
            Ok(())
        });

        Self { camera }
    }

    pub fn detach(&self, orchestrator: &Orchestrator) -> bool {
        orchestrator.unregister_engine(Self::ENGINE_NAME)
    }

    /// Latest published pose.
    pub fn state(&self) -> CameraState {
        *self.camera.borrow().state()
    }

    pub fn active_mode(&self) -> CameraMode {
        self.camera.borrow().active_mode()
    }

    /// Runs `f` against the camera between ticks (mode changes, shakes,
    /// offsets).
    pub fn with_camera<R>(&self, f: impl FnOnce(&mut CameraModeEngine) -> R) -> R {
        f(&mut self.camera.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;
    const ACTIVATION: f32 = 1e-3;

    fn engine() -> CameraModeEngine {
        CameraModeEngine::with_seed(CameraConfig::default(), 42)
    }

    fn silent() -> CameraInputs {
        CameraInputs::default()
    }

    #[test]
    fn blessing_outranks_guru_and_scroll() {
        let inputs = CameraInputs {
            is_blessing_wave_active: true,
            blessing_wave_progress: 0.5,
            is_guru_hovered: true,
            scroll_progress: 0.8,
            ..Default::default()
        };
        assert_eq!(
            resolve_mode(CameraMode::Orbit, &inputs, ACTIVATION),
            CameraMode::BlessingPulse
        );
    }

    #[test]
    fn arbitration_falls_through_in_order() {
        let starting_wave = CameraInputs {
            is_blessing_wave_active: true,
            scroll_progress: 0.8,
            ..Default::default()
        };
        assert_eq!(
            resolve_mode(CameraMode::Orbit, &starting_wave, ACTIVATION),
            CameraMode::GuruFocus
        );

        let scrolled = CameraInputs {
            scroll_progress: 0.2,
            ..Default::default()
        };
        assert_eq!(
            resolve_mode(CameraMode::ProjectionAlignment, &scrolled, ACTIVATION),
            CameraMode::ScrollDepth
        );

        assert_eq!(
            resolve_mode(CameraMode::ProjectionAlignment, &silent(), ACTIVATION),
            CameraMode::ProjectionAlignment
        );
    }

    #[test]
    fn engine_uses_the_same_scroll_threshold_as_resolve_mode() {
        assert_eq!(CameraConfig::default().scroll_activation, ACTIVATION);
        for (progress, expected) in [
            (0.0005, CameraMode::Orbit),
            (0.002, CameraMode::ScrollDepth),
        ] {
            let mut camera = engine();
            let inputs = CameraInputs {
                scroll_progress: progress,
                ..Default::default()
            };
            camera.update(DT, &inputs);
            assert_eq!(camera.active_mode(), expected, "progress {progress}");
            assert_eq!(
                resolve_mode(CameraMode::Orbit, &inputs, camera.config().scroll_activation),
                expected
            );
        }
    }

    #[test]
    fn parses_mode_names() {
        for mode in CameraMode::ALL {
            assert_eq!(mode.as_str().parse::<CameraMode>().unwrap(), mode);
        }
        assert!("sideways".parse::<CameraMode>().is_err());
        assert_eq!(
            serde_json::to_string(&CameraMode::GuruFocus).unwrap(),
            "\"guru-focus\""
        );
    }

    #[test]
    fn reset_restores_initial_pose() {
        let mut camera = engine();
        let initial = *camera.state();
        let inputs = CameraInputs {
            scroll_progress: 0.7,
            scroll_velocity: 1.5,
            bass: 0.8,
            mid: 0.6,
            high: 0.4,
            ..Default::default()
        };
        for _ in 0..30 {
            camera.update(DT, &inputs);
        }
        assert_eq!(camera.active_mode(), CameraMode::ScrollDepth);
        assert_ne!(*camera.state(), initial);

        camera.reset();
        assert_eq!(*camera.state(), CameraState::initial(camera.config()));
        assert_eq!(*camera.state(), initial);
        assert_eq!(*camera.modes(), ModeStates::default());
        assert_eq!(camera.current_mode(), CameraMode::Orbit);
    }

    #[test]
    fn mode_state_persists_while_inactive() {
        let mut camera = engine();
        let scrolling = CameraInputs {
            scroll_progress: 1.0,
            ..Default::default()
        };
        for _ in 0..20 {
            camera.update(DT, &scrolling);
        }
        let depth = camera.modes().scroll_depth;

        let hovering = CameraInputs {
            is_guru_hovered: true,
            ..Default::default()
        };
        for _ in 0..20 {
            camera.update(DT, &hovering);
        }
        assert_eq!(camera.active_mode(), CameraMode::GuruFocus);
        assert_eq!(camera.modes().scroll_depth, depth);
        assert!(camera.modes().guru_focus.progress > 0.0);
    }

    #[test]
    fn blessing_widens_field_of_view() {
        let mut camera = engine();
        let base = camera.config().base_fov;
        let inputs = CameraInputs {
            is_blessing_wave_active: true,
            blessing_wave_progress: 1.0,
            ..Default::default()
        };
        for _ in 0..300 {
            camera.update(DT, &inputs);
        }
        assert!((camera.state().field_of_view - (base + 5.0)).abs() < 1e-2);
    }

    #[test]
    fn projection_alignment_runs_only_when_selected() {
        let mut camera = engine();
        camera.set_mode(CameraMode::ProjectionAlignment);
        for _ in 0..60 {
            camera.update(DT, &silent());
        }
        let pitch = camera.modes().projection_alignment.pitch;
        assert!(pitch < 0.0);

        let hovering = CameraInputs {
            is_guru_hovered: true,
            ..Default::default()
        };
        camera.update(DT, &hovering);
        assert_eq!(camera.modes().projection_alignment.pitch, pitch);
    }

    #[test]
    fn offset_and_target_are_applied() {
        let mut camera = engine();
        camera.set_offset(Vec3::new(0.0, 1.0, 0.0));
        camera.set_target(Vec3::new(2.0, 0.0, 0.0));
        let pose = *camera.update(DT, &silent());
        assert_eq!(pose.target, Vec3::new(2.0, 0.0, 0.0));
        assert!(pose.position.y > 0.5);
    }

    #[test]
    fn repeated_offsets_do_not_drift() {
        let mut repeated = engine();
        let mut once = engine();
        let offset = Vec3::new(0.0, 0.1, 0.0);
        once.set_offset(offset);
        for _ in 0..100 {
            repeated.set_offset(offset);
            repeated.update(DT, &silent());
            once.update(DT, &silent());
        }
        assert_eq!(repeated.state().position, once.state().position);
        assert!(repeated.state().position.y < 1.0);

        let before = repeated.state().position;
        repeated.set_offset(Vec3::ZERO);
        assert_eq!(repeated.offset(), Vec3::ZERO);
        assert!((repeated.state().position - (before - offset)).length() < 1e-6);
    }

    #[test]
    fn blessing_field_of_view_relaxes_after_wave_ends() {
        let mut camera = engine();
        let base = camera.config().base_fov;
        let wave = CameraInputs {
            is_blessing_wave_active: true,
            blessing_wave_progress: 1.0,
            ..Default::default()
        };
        for _ in 0..120 {
            camera.update(DT, &wave);
        }
        let peak = camera.state().field_of_view;
        assert!(peak > base + 4.9);

        let mut previous = peak;
        for tick in 0..30 {
            let fov = camera.update(DT, &silent()).field_of_view;
            assert_eq!(camera.active_mode(), CameraMode::Orbit);
            assert!(fov < previous, "tick {tick}: {fov} >= {previous}");
            assert!(previous - fov < 0.5, "tick {tick}: jumped from {previous} to {fov}");
            previous = fov;
        }
        assert!(previous > base);

        for _ in 0..600 {
            camera.update(DT, &silent());
        }
        assert!((camera.state().field_of_view - base).abs() < 1e-3);
    }

    #[test]
    fn shake_injects_decaying_jitter() {
        let mut camera = engine();
        camera.shake(1.0);
        let kicked = camera.modes().audio_reactive.shake.length();
        assert!(kicked > 0.0);
        for _ in 0..200 {
            camera.update(DT, &silent());
        }
        assert!(camera.modes().audio_reactive.shake.length() < kicked * 1e-3);
    }

    #[test]
    fn degenerate_input_keeps_pose_finite() {
        let mut camera = engine();
        let hostile = CameraInputs {
            scroll_progress: 0.5,
            scroll_velocity: f32::INFINITY,
            bass: f32::NAN,
            ..Default::default()
        };
        for _ in 0..10 {
            let pose = camera.update(f32::NAN, &hostile);
            assert!(pose.position.is_finite());
        }
        let pose = *camera.update(DT, &hostile);
        assert!(pose.position.is_finite());
        assert!(camera.modes().audio_reactive.shake.is_finite());
        assert_eq!(camera.active_mode(), CameraMode::ScrollDepth);
    }

    #[test]
    fn update_config_changes_base_fov() {
        let mut camera = engine();
        camera.update_config(|config| config.base_fov = 45.0);
        camera.update(DT, &silent());
        assert_eq!(camera.state().field_of_view, 45.0);
    }
}
