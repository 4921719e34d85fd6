use std::{
    f32::consts::TAU,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand};
use motion_sync_core::{
    AppConfig, AudioFeed, CameraMode, CameraModeEngine, CameraRig, CameraState, FrameClock,
    FrameScheduler, InteractionUpdate, ManualClock, MotionState, Orchestrator, SystemClock,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> motion_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            frames,
            fps,
            config,
            realtime,
            blessing_at,
            hover_at,
        } => {
            let config = load_config(config.as_deref())?;
            let script = Script {
                frames,
                fps: fps.max(1.0),
                blessing_at,
                hover_at,
            };
            if realtime {
                let period = Duration::from_secs_f32(1.0 / script.fps);
                run_simulation(&config, &script, SystemClock::new(), || {
                    std::thread::sleep(period)
                })
            } else {
                let clock = ManualClock::new();
                let driver = clock.clone();
                let step = 1.0 / f64::from(script.fps);
                run_simulation(&config, &script, clock, move || driver.advance(step))
            }
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> motion_sync_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Scripted inputs for a headless run.
struct Script {
    frames: u64,
    fps: f32,
    blessing_at: Option<u64>,
    hover_at: Option<u64>,
}

/// Frames a blessing wave takes to sweep from 0 to 1.
const BLESSING_FRAMES: u64 = 90;

impl Script {
    /// Scroll position ramps to the bottom of the page over the first half of
    /// the run and stays there.
    fn scroll(&self, frame: u64) -> f32 {
        let half = (self.frames / 2).max(1);
        (frame as f32 / half as f32).min(1.0)
    }

    fn interaction(&self, frame: u64) -> Option<InteractionUpdate> {
        if self.hover_at == Some(frame) {
            return Some(InteractionUpdate {
                is_guru_hovered: Some(true),
                ..Default::default()
            });
        }
        let start = self.blessing_at?;
        let elapsed = frame.checked_sub(start)?;
        if elapsed > BLESSING_FRAMES {
            return None;
        }
        let active = elapsed < BLESSING_FRAMES;
        Some(InteractionUpdate {
            is_blessing_wave_active: Some(active),
            blessing_wave_progress: Some(if active {
                elapsed as f32 / BLESSING_FRAMES as f32
            } else {
                0.0
            }),
            ..Default::default()
        })
    }
}

/// Pulsing 60 Hz kick under a steady 1 kHz tone with a faint 8 kHz hiss.
fn synthetic_block(start: u64, len: usize, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    (0..len)
        .map(|offset| {
            let t = (start + offset as u64) as f32 / rate;
            let envelope = 0.5 + 0.5 * (TAU * 2.0 * t).sin();
            0.05 * envelope * (TAU * 60.0 * t).sin()
                + 0.01 * (TAU * 1_000.0 * t).sin()
                + 0.002 * (TAU * 8_000.0 * t).sin()
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameReport {
    frame: u64,
    motion: MotionState,
    mode: CameraMode,
    camera: CameraState,
}

fn run_simulation<C: FrameClock + 'static>(
    config: &AppConfig,
    script: &Script,
    clock: C,
    mut advance: impl FnMut(),
) -> motion_sync_core::Result<()> {
    tracing::info!(frames = script.frames, fps = script.fps, "starting simulation");

    let audio = AudioFeed::new(&config.audio)?;
    let scheduler = FrameScheduler::new(clock, &config.scheduler);
    let orchestrator = Orchestrator::new(scheduler, config);
    let camera = CameraRig::attach(&orchestrator, CameraModeEngine::new(config.camera.clone()));

    let block_len = (config.audio.sample_rate as f32 / script.fps).round().max(1.0) as usize;
    let mut sample_cursor = 0u64;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    orchestrator.start();
    for frame in 0..script.frames {
        advance();

        let block = synthetic_block(sample_cursor, block_len, config.audio.sample_rate);
        sample_cursor += block_len as u64;
        let bands = audio.push_samples(&block)?;

        let scheduler = orchestrator.scheduler();
        scheduler.set_audio(bands);
        scheduler.set_scroll(script.scroll(frame));
        if let Some(update) = script.interaction(frame) {
            orchestrator.set_interaction_state(update);
        }
        scheduler.tick();

        let report = FrameReport {
            frame,
            motion: orchestrator.motion_state(),
            mode: camera.active_mode(),
            camera: camera.state(),
        };
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
    }
    tracing::info!(
        ticks = orchestrator.ticks(),
        camera_faults = orchestrator.fault_count(CameraRig::ENGINE_NAME),
        "simulation finished"
    );
    orchestrator.teardown();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless motion and camera orchestration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the orchestrator with scripted scroll, audio and interaction
    /// input, printing one JSON line per frame.
    Simulate {
        /// Number of frames to run.
        #[arg(short = 'n', long, default_value_t = 300)]
        frames: u64,
        /// Frame rate of the simulated host.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Pace frames against the wall clock instead of a simulated one.
        #[arg(long)]
        realtime: bool,
        /// Frame at which a blessing wave starts.
        #[arg(long)]
        blessing_at: Option<u64>,
        /// Frame at which the pointer starts hovering the guru.
        #[arg(long)]
        hover_at: Option<u64>,
    },
    /// Print the effective configuration as JSON.
    Config {
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
