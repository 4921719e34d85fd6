//! Process-lifetime coordinator: one scheduler subscription, one motion
//! synchronizer, and the registry of engines that consume its output.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, FrameData, FrameScheduler, FrameSubscription, MotionError, MotionState,
    MotionSynchronizer, Result,
};

type EngineCallback = Rc<RefCell<dyn FnMut(&MotionState) -> Result<()>>>;

/// Named engine callbacks in registration order.
///
/// Registering an existing name replaces its callback in place, so the
/// engine keeps its original position in the dispatch order.
#[derive(Default)]
pub struct EngineRegistry {
    entries: Vec<(String, EngineCallback)>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an existing registration was overwritten.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F) -> bool
    where
        F: FnMut(&MotionState) -> Result<()> + 'static,
    {
        let name = name.into();
        let callback: EngineCallback = Rc::new(RefCell::new(callback));
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => {
                entry.1 = callback;
                true
            }
            None => {
                self.entries.push((name, callback));
                false
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != name);
        self.entries.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Point-in-time copy used for dispatch.
    fn snapshot(&self) -> Vec<(String, EngineCallback)> {
        self.entries.clone()
    }

    /// Whether `callback` is still the live registration for `name`.
    fn is_current(&self, name: &str, callback: &EngineCallback) -> bool {
        self.entries
            .iter()
            .any(|(existing, live)| existing == name && Rc::ptr_eq(live, callback))
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(name, _)| name)).finish()
    }
}

/// UI-driven flags the camera arbitrates on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionState {
    pub is_guru_hovered: bool,
    pub is_blessing_wave_active: bool,
    /// `[0, 1]`
    pub blessing_wave_progress: f32,
    pub blessing_intent: bool,
    /// Normalised pointer position, `[-1, 1]` on both axes.
    pub mouse_x: f32,
    pub mouse_y: f32,
}

/// Partial update for [`InteractionState`]; absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionUpdate {
    pub is_guru_hovered: Option<bool>,
    pub is_blessing_wave_active: Option<bool>,
    pub blessing_wave_progress: Option<f32>,
    pub blessing_intent: Option<bool>,
    pub mouse_x: Option<f32>,
    pub mouse_y: Option<f32>,
}

impl InteractionState {
    /// Shallow merge of `update` into `self`.
    pub fn merge(&mut self, update: InteractionUpdate) {
        if let Some(value) = update.is_guru_hovered {
            self.is_guru_hovered = value;
        }
        if let Some(value) = update.is_blessing_wave_active {
            self.is_blessing_wave_active = value;
        }
        if let Some(value) = update.blessing_wave_progress {
            self.blessing_wave_progress = clamp_finite(value, 0.0, 1.0);
        }
        if let Some(value) = update.blessing_intent {
            self.blessing_intent = value;
        }
        if let Some(value) = update.mouse_x {
            self.mouse_x = clamp_finite(value, -1.0, 1.0);
        }
        if let Some(value) = update.mouse_y {
            self.mouse_y = clamp_finite(value, -1.0, 1.0);
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// Shared reference to the orchestrator's interaction record, handed to
/// engines that need to read it from inside their callback.
#[derive(Debug, Clone, Default)]
pub struct InteractionHandle {
    state: Rc<RefCell<InteractionState>>,
}

impl InteractionHandle {
    pub fn get(&self) -> InteractionState {
        *self.state.borrow()
    }

    pub fn update(&self, update: InteractionUpdate) {
        self.state.borrow_mut().merge(update);
    }
}

struct Dispatch {
    synchronizer: RefCell<MotionSynchronizer>,
    registry: RefCell<EngineRegistry>,
    latest: Cell<MotionState>,
    ticks: Cell<u64>,
    faults: RefCell<HashMap<String, u64>>,
}

impl Dispatch {
    fn run(&self, frame: &FrameData) {
        let state = self.synchronizer.borrow_mut().update(
            frame.time,
            frame.delta,
            frame.scroll,
            frame.audio,
        );
        self.latest.set(state);
        self.ticks.set(self.ticks.get() + 1);

        let engines = self.registry.borrow().snapshot();
        for (name, callback) in engines {
            // Skip engines removed or replaced earlier in this dispatch.
            if !self.registry.borrow().is_current(&name, &callback) {
                continue;
            }
            let result = match callback.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(&state),
                Err(_) => Err(MotionError::msg("engine re-entered during dispatch")),
            };
            if let Err(error) = result {
                *self.faults.borrow_mut().entry(name.clone()).or_insert(0) += 1;
                tracing::warn!(engine = %name, %error, "engine failed; retrying next tick");
            }
        }
    }
}

/// Owns the engine registry and feeds it one [`MotionState`] per tick.
///
/// Construct one per application run and pass it (or an `Rc` of it) to the
/// collaborators that register engines.
pub struct Orchestrator {
    scheduler: Rc<FrameScheduler>,
    dispatch: Rc<Dispatch>,
    interaction: InteractionHandle,
    subscription: RefCell<Option<FrameSubscription>>,
}

impl Orchestrator {
    pub fn new(scheduler: Rc<FrameScheduler>, config: &AppConfig) -> Self {
        Self {
            scheduler,
            dispatch: Rc::new(Dispatch {
                synchronizer: RefCell::new(MotionSynchronizer::new(config)),
                registry: RefCell::new(EngineRegistry::new()),
                latest: Cell::new(MotionState::default()),
                ticks: Cell::new(0),
                faults: RefCell::new(HashMap::new()),
            }),
            interaction: InteractionHandle::default(),
            subscription: RefCell::new(None),
        }
    }

    pub fn scheduler(&self) -> &Rc<FrameScheduler> {
        &self.scheduler
    }

    /// Subscribes to the scheduler (once) and starts it.
    pub fn start(&self) {
        let mut subscription = self.subscription.borrow_mut();
        if subscription.is_none() {
            let dispatch = Rc::clone(&self.dispatch);
            *subscription = Some(self.scheduler.on_frame(move |frame| {
                dispatch.run(frame);
                Ok(())
            }));
            tracing::debug!("orchestrator subscribed to frame scheduler");
        }
        self.scheduler.start();
    }

    /// Unsubscribes and stops the scheduler. Idempotent.
    pub fn stop(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
            tracing::debug!(ticks = self.ticks(), "orchestrator unsubscribed");
        }
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.subscription.borrow().is_some() && self.scheduler.is_running()
    }

    /// Stops the loop, drops every engine and resets the motion state.
    pub fn teardown(&self) {
        self.stop();
        self.dispatch.registry.borrow_mut().clear();
        self.dispatch.faults.borrow_mut().clear();
        self.dispatch.synchronizer.borrow_mut().reset();
        self.dispatch.latest.set(MotionState::default());
    }

    /// Registers (or replaces) a named engine. Safe to call mid-dispatch.
    pub fn register_engine<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&MotionState) -> Result<()> + 'static,
    {
        let name = name.into();
        if self.dispatch.registry.borrow_mut().register(name.clone(), callback) {
            tracing::debug!(engine = %name, "engine registration replaced");
        }
    }

    pub fn unregister_engine(&self, name: &str) -> bool {
        self.dispatch.registry.borrow_mut().unregister(name)
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.dispatch.registry.borrow().names()
    }

    /// Most recent state, without forcing a tick.
    pub fn motion_state(&self) -> MotionState {
        self.dispatch.latest.get()
    }

    pub fn set_interaction_state(&self, update: InteractionUpdate) {
        self.interaction.update(update);
    }

    pub fn interaction_state(&self) -> InteractionState {
        self.interaction.get()
    }

    pub fn interaction_handle(&self) -> InteractionHandle {
        self.interaction.clone()
    }

    /// Ticks dispatched since construction.
    pub fn ticks(&self) -> u64 {
        self.dispatch.ticks.get()
    }

    /// Failed invocations recorded for `name`.
    pub fn fault_count(&self, name: &str) -> u64 {
        self.dispatch
            .faults
            .borrow()
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("running", &self.is_running())
            .field("engines", &*self.dispatch.registry.borrow())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    fn orchestrator() -> (ManualClock, Orchestrator) {
        let clock = ManualClock::new();
        let config = AppConfig::default();
        let scheduler = FrameScheduler::new(clock.clone(), &config.scheduler);
        (clock, Orchestrator::new(scheduler, &config))
    }

    fn step(clock: &ManualClock, orchestrator: &Orchestrator, ticks: usize) {
        for _ in 0..ticks {
            clock.advance(1.0 / 60.0);
            orchestrator.scheduler().tick();
        }
    }

    #[test]
    fn registry_overwrites_in_place() {
        let mut registry = EngineRegistry::new();
        assert!(!registry.register("a", |_| Ok(())));
        assert!(!registry.register("b", |_| Ok(())));
        assert!(registry.register("a", |_| Ok(())));
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_registration_wins() {
        let (clock, orchestrator) = orchestrator();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let (a, b) = (first.clone(), second.clone());
        orchestrator.register_engine("scene", move |_| {
            a.set(a.get() + 1);
            Ok(())
        });
        orchestrator.register_engine("scene", move |_| {
            b.set(b.get() + 1);
            Ok(())
        });
        orchestrator.start();
        step(&clock, &orchestrator, 3);

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 3);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (clock, orchestrator) = orchestrator();
        orchestrator.start();
        orchestrator.start();
        assert_eq!(orchestrator.scheduler().subscriber_count(), 1);

        step(&clock, &orchestrator, 2);
        assert_eq!(orchestrator.ticks(), 2);

        orchestrator.stop();
        orchestrator.stop();
        assert!(!orchestrator.is_running());
        assert_eq!(orchestrator.scheduler().subscriber_count(), 0);
        step(&clock, &orchestrator, 2);
        assert_eq!(orchestrator.ticks(), 2);
    }

    #[test]
    fn engine_may_unregister_itself_mid_dispatch() {
        let (clock, orchestrator) = orchestrator();
        let orchestrator = Rc::new(orchestrator);
        let calls = Rc::new(Cell::new(0));
        let weak = Rc::downgrade(&orchestrator);
        let counter = calls.clone();
        orchestrator.register_engine("once", move |_| {
            counter.set(counter.get() + 1);
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.unregister_engine("once");
            }
            Ok(())
        });
        orchestrator.start();
        step(&clock, &orchestrator, 3);

        assert_eq!(calls.get(), 1);
        assert!(orchestrator.engine_names().is_empty());
    }

    #[test]
    fn exposes_latest_motion_state() {
        let (clock, orchestrator) = orchestrator();
        assert_eq!(orchestrator.motion_state(), MotionState::default());
        orchestrator.start();
        orchestrator.scheduler().set_scroll(1.0);
        step(&clock, &orchestrator, 5);

        let state = orchestrator.motion_state();
        assert!(state.scroll_progress > 0.0);
        assert!(state.time > 0.0);
    }

    #[test]
    fn interaction_updates_merge_shallowly() {
        let (_, orchestrator) = orchestrator();
        orchestrator.set_interaction_state(InteractionUpdate {
            is_guru_hovered: Some(true),
            mouse_x: Some(3.0),
            ..Default::default()
        });
        orchestrator.set_interaction_state(InteractionUpdate {
            blessing_wave_progress: Some(0.4),
            ..Default::default()
        });

        let state = orchestrator.interaction_state();
        assert!(state.is_guru_hovered);
        assert_eq!(state.mouse_x, 1.0);
        assert_eq!(state.blessing_wave_progress, 0.4);
        assert!(!state.is_blessing_wave_active);
    }

    #[test]
    fn interaction_update_parses_partial_json() {
        let update: InteractionUpdate =
            serde_json::from_str(r#"{ "isBlessingWaveActive": true }"#).unwrap();
        assert_eq!(update.is_blessing_wave_active, Some(true));
        assert_eq!(update.is_guru_hovered, None);
    }

    #[test]
    fn teardown_clears_registry() {
        let (clock, orchestrator) = orchestrator();
        orchestrator.register_engine("scene", |_| Err(MotionError::msg("not mounted")));
        orchestrator.start();
        step(&clock, &orchestrator, 2);
        assert_eq!(orchestrator.fault_count("scene"), 2);

        orchestrator.teardown();
        assert!(orchestrator.engine_names().is_empty());
        assert_eq!(orchestrator.fault_count("scene"), 0);
        assert_eq!(orchestrator.motion_state(), MotionState::default());
    }
}
