/// Session manager — the host-facing entry point. Owns every live
/// session, enforces at-most-one scene stack per actor, arms timers
/// for delayed advances and chains nested scenes.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::conditions::ConditionEvaluator;
use crate::core::effects::EffectExecutor;
use crate::core::registry::{RegistryError, SceneRegistry};
use crate::core::scheduler::{CancelToken, Scheduler};
use crate::core::session::{
    RenderedChoice, SceneSession, SessionError, SessionEvent, SessionPhase,
};
use crate::core::world::{Messaging, World};
use crate::schema::actor::ActorId;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("actor {0} is already in a scene")]
    AlreadyInScene(ActorId),
    #[error("actor {0} has no active scene")]
    NoActiveScene(ActorId),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What one driven step produced, for hosts that want the output
/// in-band rather than through the messaging surface.
#[derive(Debug, Default)]
pub struct SceneOutput {
    /// Narration delivered to the actor, in order.
    pub lines: Vec<String>,
    /// The choice list now awaiting input, if any.
    pub choices: Vec<RenderedChoice>,
    /// True once the actor's whole scene stack has unwound.
    pub over: bool,
}

/// Read-only snapshot of an actor's live traversal.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub scene: String,
    pub node: String,
    pub awaiting_choice: bool,
    pub choices: Vec<RenderedChoice>,
    /// Stack depth; greater than 1 inside a nested scene.
    pub depth: usize,
}

struct ActorSlot {
    /// Innermost session last. Parents below the top are suspended.
    stack: Vec<SceneSession>,
    timer: Option<CancelToken>,
    /// Bumped whenever the pending timer changes hands; a fired
    /// callback carrying a stale generation is ignored.
    generation: u64,
}

impl ActorSlot {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            timer: None,
            generation: 0,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
        self.generation += 1;
    }
}

/// Central coordinator for all actors' scene sessions. Construct one
/// per game process and share it behind an [`Arc`]; timer callbacks
/// hold only a [`Weak`] back-reference.
pub struct SessionManager {
    registry: Arc<SceneRegistry>,
    world: Arc<dyn World>,
    scheduler: Arc<dyn Scheduler>,
    evaluator: ConditionEvaluator,
    executor: EffectExecutor,
    actors: Mutex<FxHashMap<ActorId, ActorSlot>>,
    next_seed: AtomicU64,
}

impl SessionManager {
    pub fn new(
        registry: Arc<SceneRegistry>,
        world: Arc<dyn World>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            registry,
            world,
            scheduler,
            evaluator: ConditionEvaluator::new(),
            executor: EffectExecutor::new(),
            actors: Mutex::new(FxHashMap::default()),
            next_seed: AtomicU64::new(0),
        }
    }

    /// Fix the base seed for per-session randomness. For tests and
    /// reproducible replays.
    pub fn with_seed(self, seed: u64) -> Self {
        self.next_seed.store(seed, Ordering::SeqCst);
        self
    }

    /// Mutable access for registering `ext` condition handlers before
    /// the manager is shared.
    pub fn evaluator_mut(&mut self) -> &mut ConditionEvaluator {
        &mut self.evaluator
    }

    /// Mutable access for registering `ext` effect handlers before
    /// the manager is shared.
    pub fn executor_mut(&mut self) -> &mut EffectExecutor {
        &mut self.executor
    }

    /// Begin a scene for an actor. Refused while the actor has any
    /// live session, suspended parents included.
    pub fn start_scene(
        self: &Arc<Self>,
        actor: ActorId,
        scene_id: &str,
    ) -> Result<SceneOutput, ManagerError> {
        let definition = self.registry.lookup(scene_id)?;

        let mut actors = self.actors.lock();
        let slot = actors.entry(actor).or_insert_with(ActorSlot::new);
        if !slot.stack.is_empty() {
            return Err(ManagerError::AlreadyInScene(actor));
        }

        info!(actor = actor.0, scene = %scene_id, "starting scene");
        let mut session = SceneSession::new(definition, actor, self.draw_seed());
        let mut output = SceneOutput::default();
        let result = session
            .start(self.world.as_ref(), &self.evaluator, &self.executor)
            .map_err(ManagerError::from)
            .and_then(|events| {
                slot.stack.push(session);
                self.pump(slot, actor, events, &mut output)
            });
        self.settle(&mut actors, actor, result, output)
    }

    /// Handle actor input selecting a choice by its displayed number.
    /// Invalid and unavailable selections leave the session untouched
    /// so the host can re-display the standing choice list.
    pub fn submit_choice(
        self: &Arc<Self>,
        actor: ActorId,
        index: usize,
    ) -> Result<SceneOutput, ManagerError> {
        let mut actors = self.actors.lock();
        let submitted = match actors.get_mut(&actor).and_then(|s| s.stack.last_mut()) {
            Some(top) => top.submit(index, self.world.as_ref(), &self.evaluator, &self.executor),
            None => return Err(ManagerError::NoActiveScene(actor)),
        };
        let events = match submitted {
            Ok(events) => events,
            // Bad input is recoverable; the session stands.
            Err(
                err @ (SessionError::InvalidChoice(_)
                | SessionError::ChoiceUnavailable(_)
                | SessionError::NotAwaitingChoice),
            ) => return Err(err.into()),
            Err(err) => {
                let err = ManagerError::from(err);
                return self.settle(&mut actors, actor, Err(err), SceneOutput::default());
            }
        };

        let mut output = SceneOutput::default();
        let result = match actors.get_mut(&actor) {
            Some(slot) => self.pump(slot, actor, events, &mut output),
            None => Ok(()),
        };
        self.settle(&mut actors, actor, result, output)
    }

    /// Force-terminate an actor's entire scene stack. Pending timers
    /// are cancelled; no further effects run. Returns false if the
    /// actor had no live session.
    pub fn abort(&self, actor: ActorId) -> bool {
        let mut actors = self.actors.lock();
        match actors.get_mut(&actor) {
            Some(slot) if !slot.stack.is_empty() => {
                info!(actor = actor.0, depth = slot.stack.len(), "aborting scene stack");
                slot.cancel_timer();
                for session in slot.stack.iter_mut() {
                    session.abort();
                }
                actors.remove(&actor);
                true
            }
            _ => false,
        }
    }

    /// Read-only peek at the actor's innermost live session.
    pub fn status(&self, actor: ActorId) -> Option<SessionStatus> {
        let actors = self.actors.lock();
        let slot = actors.get(&actor)?;
        let top = slot.stack.last()?;
        Some(SessionStatus {
            scene: top.scene_id().to_string(),
            node: top.current_node().to_string(),
            awaiting_choice: *top.phase() == SessionPhase::AwaitingChoice,
            choices: top.rendered_choices().to_vec(),
            depth: slot.stack.len(),
        })
    }

    pub fn is_in_scene(&self, actor: ActorId) -> bool {
        self.actors
            .lock()
            .get(&actor)
            .map(|s| !s.stack.is_empty())
            .unwrap_or(false)
    }

    fn draw_seed(&self) -> u64 {
        // Splitmix-style stride keeps per-session streams apart.
        self.next_seed
            .fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::SeqCst)
    }

    /// Drive events to quiescence: deliver narration, push chained
    /// scenes, arm timers, unwind finished sessions into their
    /// suspended parents.
    fn pump(
        self: &Arc<Self>,
        slot: &mut ActorSlot,
        actor: ActorId,
        mut events: Vec<SessionEvent>,
        output: &mut SceneOutput,
    ) -> Result<(), ManagerError> {
        loop {
            let mut chain: Option<String> = None;
            let mut delay: Option<f64> = None;

            for event in events.drain(..) {
                match event {
                    SessionEvent::Narration(text) => {
                        self.deliver(actor, &text);
                        output.lines.push(text);
                    }
                    SessionEvent::Choices(choices) => {
                        for choice in &choices {
                            self.deliver(actor, &format!("{}. {}", choice.index, choice.text));
                        }
                        output.choices = choices;
                    }
                    SessionEvent::ScheduleAdvance { delay: d } => delay = Some(d),
                    SessionEvent::ChainScene(scene) => chain = Some(scene),
                    SessionEvent::Ended { .. } => {}
                }
            }

            if let Some(scene_id) = chain {
                let definition = self.registry.lookup(&scene_id)?;
                info!(actor = actor.0, scene = %scene_id, depth = slot.stack.len() + 1, "chaining nested scene");
                let mut session = SceneSession::new(definition, actor, self.draw_seed());
                events = session.start(self.world.as_ref(), &self.evaluator, &self.executor)?;
                slot.stack.push(session);
                continue;
            }

            if let Some(delay) = delay {
                self.arm_timer(slot, actor, delay);
                return Ok(());
            }

            if slot.stack.last().map(SceneSession::is_over).unwrap_or(false) {
                let finished = match slot.stack.pop() {
                    Some(finished) => finished,
                    None => return Ok(()),
                };
                info!(actor = actor.0, scene = %finished.scene_id(), "scene over");
                match slot.stack.last_mut() {
                    Some(parent) => {
                        events = parent.resume(
                            self.world.as_ref(),
                            &self.evaluator,
                            &self.executor,
                        )?;
                        continue;
                    }
                    None => {
                        output.over = true;
                        return Ok(());
                    }
                }
            }

            return Ok(());
        }
    }

    /// Apply a pump result: drop emptied or failed slots. A session
    /// error force-aborts the actor's entire stack.
    fn settle(
        &self,
        actors: &mut FxHashMap<ActorId, ActorSlot>,
        actor: ActorId,
        result: Result<(), ManagerError>,
        output: SceneOutput,
    ) -> Result<SceneOutput, ManagerError> {
        match result {
            Ok(()) => {
                if actors
                    .get(&actor)
                    .map(|s| s.stack.is_empty())
                    .unwrap_or(false)
                {
                    actors.remove(&actor);
                }
                Ok(output)
            }
            Err(err) => {
                warn!(actor = actor.0, error = %err, "scene stack aborted on error");
                if let Some(slot) = actors.get_mut(&actor) {
                    slot.cancel_timer();
                    for session in slot.stack.iter_mut() {
                        session.abort();
                    }
                }
                actors.remove(&actor);
                Err(err)
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, slot: &mut ActorSlot, actor: ActorId, delay: f64) {
        slot.cancel_timer();
        let generation = slot.generation;
        let weak: Weak<SessionManager> = Arc::downgrade(self);
        let token = self.scheduler.schedule_once(
            Duration::from_secs_f64(delay),
            Box::new(move || {
                if let Some(manager) = weak.upgrade() {
                    manager.fire_timer(actor, generation);
                }
            }),
        );
        slot.timer = Some(token);
    }

    fn fire_timer(self: &Arc<Self>, actor: ActorId, generation: u64) {
        let mut actors = self.actors.lock();
        let slot = match actors.get_mut(&actor) {
            Some(slot) if slot.generation == generation => slot,
            // Stale callback from a superseded or aborted timer.
            _ => return,
        };
        slot.timer = None;

        let result = match slot.stack.last_mut() {
            Some(top) => top
                .fire_auto_advance(self.world.as_ref(), &self.evaluator, &self.executor)
                .map_err(ManagerError::from)
                .and_then(|events| {
                    let mut output = SceneOutput::default();
                    self.pump(slot, actor, events, &mut output)
                }),
            None => Ok(()),
        };
        if let Err(err) = self.settle(&mut actors, actor, result, SceneOutput::default()) {
            warn!(actor = actor.0, error = %err, "timed advance failed");
        }
    }

    fn deliver(&self, actor: ActorId, text: &str) {
        if let Err(err) = self.world.send_to_actor(actor, text) {
            warn!(actor = actor.0, error = %err, "scene output not delivered");
        }
    }
}
