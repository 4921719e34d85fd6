//! Per-frame tick source.
//!
//! The host owns the actual refresh callback (a window event loop, a timer,
//! a test) and calls [`FrameScheduler::tick`] whenever it fires. The
//! scheduler turns that into a [`FrameData`] value and fans it out to its
//! subscribers in registration order.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
    time::Instant,
};

use serde::{Deserialize, Serialize};

use crate::{config::SchedulerConfig, AudioBands, MotionError, Result};

/// Monotonic time source, in seconds.
pub trait FrameClock {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally driven clock. Clones share the same reading, so a host can
/// hand one clone to the scheduler and advance another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Inputs captured for a single tick. Built fresh every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    /// Seconds since the scheduler was (re)started.
    pub time: f32,
    /// Seconds since the previous tick, clamped to the configured maximum.
    pub delta: f32,
    /// Raw scroll value as last set by the host.
    pub scroll: f32,
    /// Raw band energies as last set by the host.
    pub audio: AudioBands,
}

type FrameCallback = Rc<RefCell<dyn FnMut(&FrameData) -> Result<()>>>;

struct Subscriber {
    id: u64,
    callback: FrameCallback,
}

/// Drives the per-frame loop and holds the latest raw inputs.
pub struct FrameScheduler {
    clock: Box<dyn FrameClock>,
    max_delta: f32,
    running: Cell<bool>,
    origin: Cell<f64>,
    last_tick: Cell<f64>,
    scroll: Cell<f32>,
    audio: Cell<AudioBands>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_id: Cell<u64>,
    frames: Cell<u64>,
    faults: Cell<u64>,
}

impl FrameScheduler {
    pub fn new(clock: impl FrameClock + 'static, config: &SchedulerConfig) -> Rc<Self> {
        let max_delta = if config.max_delta.is_finite() && config.max_delta > 0.0 {
            config.max_delta
        } else {
            SchedulerConfig::default().max_delta
        };

        Rc::new(Self {
            clock: Box::new(clock),
            max_delta,
            running: Cell::new(false),
            origin: Cell::new(0.0),
            last_tick: Cell::new(0.0),
            scroll: Cell::new(0.0),
            audio: Cell::new(AudioBands::default()),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            frames: Cell::new(0),
            faults: Cell::new(0),
        })
    }

    /// Begins ticking. Calling it while already running does nothing;
    /// otherwise the loop origin and the delta baseline are reset to now so
    /// an idle gap never shows up as one huge step.
    pub fn start(&self) {
        if self.running.get() {
            return;
        }
        let now = self.clock.now();
        self.origin.set(now);
        self.last_tick.set(now);
        self.running.set(true);
        tracing::debug!(origin = now, "frame scheduler started");
    }

    /// Stops ticking. Idempotent; a later [`start`](Self::start) resumes
    /// cleanly.
    pub fn stop(&self) {
        if self.running.replace(false) {
            tracing::debug!(frames = self.frames.get(), "frame scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Registers a callback that receives every tick's [`FrameData`].
    ///
    /// The returned handle removes exactly this callback. Dropping the
    /// handle without calling [`FrameSubscription::unsubscribe`] keeps the
    /// callback registered.
    pub fn on_frame<F>(self: &Rc<Self>, callback: F) -> FrameSubscription
    where
        F: FnMut(&FrameData) -> Result<()> + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let callback: FrameCallback = Rc::new(RefCell::new(callback));
        self.subscribers
            .borrow_mut()
            .push(Subscriber { id, callback });

        FrameSubscription {
            scheduler: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|subscriber| subscriber.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Last-write-wins scroll input for the next tick.
    pub fn set_scroll(&self, value: f32) {
        self.scroll.set(value);
    }

    /// Last-write-wins audio input for the next tick.
    pub fn set_audio(&self, bands: AudioBands) {
        self.audio.set(bands);
    }

    /// Ticks completed since construction.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Subscriber invocations that returned an error.
    pub fn faults(&self) -> u64 {
        self.faults.get()
    }

    /// Runs one tick. Returns `false` without doing anything when stopped.
    ///
    /// Subscriber errors are logged and counted; they never stop the loop
    /// or keep later subscribers from running.
    pub fn tick(&self) -> bool {
        if !self.running.get() {
            return false;
        }

        let now = self.clock.now();
        let elapsed = now - self.last_tick.get();
        self.last_tick.set(now);
        let delta = if elapsed.is_finite() {
            (elapsed as f32).clamp(0.0, self.max_delta)
        } else {
            0.0
        };

        let frame = FrameData {
            time: (now - self.origin.get()) as f32,
            delta,
            scroll: self.scroll.get(),
            audio: self.audio.get(),
        };

        // Callbacks may subscribe or unsubscribe while we iterate.
        let snapshot: Vec<(u64, FrameCallback)> = self
            .subscribers
            .borrow()
            .iter()
            .map(|subscriber| (subscriber.id, subscriber.callback.clone()))
            .collect();

        for (id, callback) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            let result = match callback.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(&frame),
                Err(_) => Err(MotionError::msg("frame subscriber re-entered")),
            };
            if let Err(error) = result {
                self.faults.set(self.faults.get() + 1);
                tracing::warn!(subscriber = id, %error, "frame subscriber failed");
            }
        }

        self.frames.set(self.frames.get() + 1);
        tracing::trace!(time = frame.time, delta = frame.delta, "frame dispatched");
        true
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("running", &self.running.get())
            .field("max_delta", &self.max_delta)
            .field("subscribers", &self.subscriber_count())
            .field("frames", &self.frames.get())
            .finish()
    }
}

/// Handle returned by [`FrameScheduler::on_frame`].
#[derive(Debug)]
pub struct FrameSubscription {
    scheduler: Weak<FrameScheduler>,
    id: u64,
}

impl FrameSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the callback. Returns `false` if it was already gone or the
    /// scheduler no longer exists.
    pub fn unsubscribe(self) -> bool {
        self.scheduler
            .upgrade()
            .map(|scheduler| scheduler.unsubscribe(self.id))
            .unwrap_or(false)
    }
}
