//! Core library for the motion orchestration runtime.
//!
//! A single [`FrameScheduler`] drives every per-frame consumer. The
//! [`Orchestrator`] subscribes to it once, folds raw scroll and audio
//! readings into a [`MotionState`] through the [`MotionSynchronizer`], and
//! hands that state to each registered engine. The [`CameraModeEngine`] is
//! the main such engine: it arbitrates between six camera behaviours based on
//! the motion state and the UI interaction flags.
//!
//! Everything on the tick path is single threaded. Audio may be produced on
//! another thread and handed over through [`AudioFeed`].

pub mod analysis;
pub mod audio;
pub mod camera;
pub mod config;
pub mod error;
pub mod mapping;
pub mod motion;
pub mod orchestrator;
pub mod scroll;
pub mod smoothing;
pub mod timeline;

pub use analysis::{AudioBands, BandRanges, FrequencyBandAnalyzer, SpectrumAnalyser};
pub use audio::{AudioFeed, AudioHandle};
pub use camera::{
    resolve_mode, CameraConfig, CameraInputs, CameraMode, CameraModeEngine, CameraRig,
    CameraState,
};
pub use config::{
    AppConfig, AudioConfig, MappingConfig, RenderConfig, SchedulerConfig, ScrollConfig,
};
pub use error::{MotionError, Result};
pub use mapping::{AudioMotion, AudioMotionMapper};
pub use motion::{MotionState, MotionSynchronizer};
pub use orchestrator::{
    EngineRegistry, InteractionHandle, InteractionState, InteractionUpdate, Orchestrator,
};
pub use scroll::{ScrollData, ScrollSignalProcessor};
pub use smoothing::{ExponentialSmoother, MovingAverage};
pub use timeline::{
    FrameClock, FrameData, FrameScheduler, FrameSubscription, ManualClock, SystemClock,
};
