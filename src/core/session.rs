/// Scene sessions — one actor's live traversal of a scene definition.
/// Owns the node-entry algorithm and the phase machine; the session
/// manager drives it and interprets the events it emits.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::conditions::{ConditionError, ConditionEvaluator};
use crate::core::effects::{EffectError, EffectExecutor, EffectOutcome};
use crate::core::template::{render_text, RenderContext};
use crate::core::world::{ActorInfo, Currency, World};
use crate::schema::actor::{ActorId, Value};
use crate::schema::scene::{Choice, SceneDefinition, SceneNode, START_NODE};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("scene '{scene}' references missing node '{node}'")]
    UnknownNode { scene: String, node: String },
    #[error("no choice numbered {0} here")]
    InvalidChoice(usize),
    #[error("choice {0} is not available right now")]
    ChoiceUnavailable(usize),
    #[error("session is not awaiting a choice")]
    NotAwaitingChoice,
    #[error("session is not auto-advancing")]
    NotAutoAdvancing,
    #[error("session is not suspended")]
    NotSuspended,
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// Mutable per-session traversal state. Owned exclusively by one
/// session; discarded wholesale when the session ends.
#[derive(Debug, Clone)]
pub struct ScenePlayState {
    pub actor: ActorId,
    pub current_node: String,
    pub visited_nodes: FxHashSet<String>,
    pub flags: FxHashMap<String, Value>,
}

impl ScenePlayState {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            current_node: START_NODE.to_string(),
            visited_nodes: FxHashSet::default(),
            flags: FxHashMap::default(),
        }
    }
}

/// Where the session currently rests.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// Presenting a choice list, waiting for actor input.
    AwaitingChoice,
    /// A timed advance toward `target` is scheduled.
    AutoAdvancing { target: String },
    /// Waiting for a nested scene on the same actor to terminate.
    Suspended,
    /// Reached an ending; the session is complete.
    Terminal,
    /// Force-terminated; no further node effects ran.
    Aborted,
}

/// One choice as shown to the actor. `index` is the choice's declared
/// 1-based position, so hidden choices leave gaps rather than
/// renumbering the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChoice {
    pub index: usize,
    pub text: String,
    pub selectable: bool,
}

/// What happened during one driven step. The manager acts on these:
/// narration is forwarded to the messaging surface, `ScheduleAdvance`
/// arms a timer, `ChainScene` pushes a nested session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Rendered text for a node that was entered.
    Narration(String),
    /// The choice list now awaiting input.
    Choices(Vec<RenderedChoice>),
    /// A timed auto-advance must be scheduled after `delay` seconds.
    ScheduleAdvance { delay: f64 },
    /// A nested scene must be started on the same actor.
    ChainScene(String),
    /// The session reached a terminal node.
    Ended { node: String },
}

/// What a suspended session does once its nested scene terminates.
#[derive(Debug, Clone)]
enum ResumeAction {
    /// Classify the current node (its entry effects already ran).
    ClassifyCurrent,
    /// Enter the node a taken choice pointed at.
    EnterNode(String),
}

enum Step {
    Enter(String),
    Classify,
}

/// One actor's live traversal of one scene definition.
pub struct SceneSession {
    definition: Arc<SceneDefinition>,
    state: ScenePlayState,
    phase: SessionPhase,
    rng: StdRng,
    rendered_choices: Vec<RenderedChoice>,
    resume_action: Option<ResumeAction>,
}

impl SceneSession {
    pub fn new(definition: Arc<SceneDefinition>, actor: ActorId, seed: u64) -> Self {
        Self {
            definition,
            state: ScenePlayState::new(actor),
            // Phase is provisional until start() runs.
            phase: SessionPhase::Suspended,
            rng: StdRng::seed_from_u64(seed),
            rendered_choices: Vec::new(),
            resume_action: None,
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.definition.id
    }

    pub fn actor(&self) -> ActorId {
        self.state.actor
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn current_node(&self) -> &str {
        &self.state.current_node
    }

    pub fn state(&self) -> &ScenePlayState {
        &self.state
    }

    /// The choice list from the most recent node entry. Re-displays
    /// reuse this; nothing is re-rolled.
    pub fn rendered_choices(&self) -> &[RenderedChoice] {
        &self.rendered_choices
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, SessionPhase::Terminal | SessionPhase::Aborted)
    }

    /// Begin traversal at the `start` node.
    pub fn start(
        &mut self,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        executor: &EffectExecutor,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        debug!(scene = %self.definition.id, actor = self.state.actor.0, "scene session starting");
        self.run(Step::Enter(START_NODE.to_string()), world, evaluator, executor)
    }

    /// Handle actor input selecting a choice by its displayed number.
    /// Invalid or unavailable selections change nothing; the cached
    /// choice list stands for re-display.
    pub fn submit(
        &mut self,
        index: usize,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        executor: &EffectExecutor,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if self.phase != SessionPhase::AwaitingChoice {
            return Err(SessionError::NotAwaitingChoice);
        }
        let rendered = self
            .rendered_choices
            .iter()
            .find(|c| c.index == index)
            .ok_or(SessionError::InvalidChoice(index))?;
        if !rendered.selectable {
            return Err(SessionError::ChoiceUnavailable(index));
        }

        let node = self.current_node_def()?;
        let choice = node
            .choices
            .get(index - 1)
            .cloned()
            .ok_or(SessionError::InvalidChoice(index))?;

        let chain = self.apply_effects(&choice.effects, world, executor)?;
        if let Some(scene) = chain {
            self.phase = SessionPhase::Suspended;
            self.resume_action = Some(ResumeAction::EnterNode(choice.goto.clone()));
            return Ok(vec![SessionEvent::ChainScene(scene)]);
        }
        self.run(Step::Enter(choice.goto), world, evaluator, executor)
    }

    /// Fired by the manager when a scheduled auto-advance comes due.
    pub fn fire_auto_advance(
        &mut self,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        executor: &EffectExecutor,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let target = match &self.phase {
            SessionPhase::AutoAdvancing { target } => target.clone(),
            _ => return Err(SessionError::NotAutoAdvancing),
        };
        self.run(Step::Enter(target), world, evaluator, executor)
    }

    /// Resume after a nested scene on the same actor terminated.
    pub fn resume(
        &mut self,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        executor: &EffectExecutor,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if self.phase != SessionPhase::Suspended {
            return Err(SessionError::NotSuspended);
        }
        match self.resume_action.take() {
            Some(ResumeAction::ClassifyCurrent) => {
                self.run(Step::Classify, world, evaluator, executor)
            }
            Some(ResumeAction::EnterNode(node)) => {
                self.run(Step::Enter(node), world, evaluator, executor)
            }
            None => Err(SessionError::NotSuspended),
        }
    }

    /// Force-terminate without running further node effects.
    pub fn abort(&mut self) {
        self.phase = SessionPhase::Aborted;
        self.rendered_choices.clear();
    }

    fn current_node_def(&self) -> Result<SceneNode, SessionError> {
        self.definition
            .nodes
            .get(&self.state.current_node)
            .cloned()
            .ok_or_else(|| SessionError::UnknownNode {
                scene: self.definition.id.clone(),
                node: self.state.current_node.clone(),
            })
    }

    /// Drive the traversal loop. Zero-delay gotos chain inline; a
    /// positive delay, a choice list, a terminal node, or a nested
    /// scene request ends the step.
    fn run(
        &mut self,
        first: Step,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        executor: &EffectExecutor,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        let mut step = Some(first);

        while let Some(current) = step.take() {
            let node = match current {
                Step::Enter(name) => {
                    let node = self.definition.nodes.get(&name).cloned().ok_or_else(|| {
                        SessionError::UnknownNode {
                            scene: self.definition.id.clone(),
                            node: name.clone(),
                        }
                    })?;
                    self.state.current_node = name.clone();
                    self.state.visited_nodes.insert(name);

                    // Text is rolled once per entry; re-displays reuse it.
                    let raw = node.text.pick(&mut self.rng).to_string();
                    let rendered = self.render(&raw, world);
                    events.push(SessionEvent::Narration(rendered));

                    let chain = self.apply_effects(&node.effects, world, executor)?;
                    if let Some(scene) = chain {
                        self.phase = SessionPhase::Suspended;
                        self.resume_action = Some(ResumeAction::ClassifyCurrent);
                        events.push(SessionEvent::ChainScene(scene));
                        return Ok(events);
                    }
                    node
                }
                Step::Classify => self.current_node_def()?,
            };

            step = self
                .classify(&node, world, evaluator, &mut events)?
                .map(Step::Enter);
        }

        Ok(events)
    }

    /// Decide what the current node means now that its entry effects
    /// have run. Returns the next node for an immediate advance.
    fn classify(
        &mut self,
        node: &SceneNode,
        world: &dyn World,
        evaluator: &ConditionEvaluator,
        events: &mut Vec<SessionEvent>,
    ) -> Result<Option<String>, SessionError> {
        if node.is_terminal() {
            self.phase = SessionPhase::Terminal;
            self.rendered_choices.clear();
            events.push(SessionEvent::Ended {
                node: self.state.current_node.clone(),
            });
            return Ok(None);
        }

        if let Some(goto) = &node.goto {
            let target = goto.pick(&mut self.rng).to_string();
            if node.delay > 0.0 {
                self.phase = SessionPhase::AutoAdvancing { target };
                events.push(SessionEvent::ScheduleAdvance { delay: node.delay });
                return Ok(None);
            }
            return Ok(Some(target));
        }

        let rendered = self.render_choices(&node.choices, world, evaluator)?;
        if !rendered.iter().any(|c| c.selectable) {
            // No selectable way forward, so the scene ends here rather
            // than leaving the actor at a dead prompt.
            self.phase = SessionPhase::Terminal;
            self.rendered_choices.clear();
            events.push(SessionEvent::Ended {
                node: self.state.current_node.clone(),
            });
            return Ok(None);
        }

        self.rendered_choices = rendered.clone();
        self.phase = SessionPhase::AwaitingChoice;
        events.push(SessionEvent::Choices(rendered));
        Ok(None)
    }

    /// Apply an effect list in declared order. Returns the first
    /// nested-scene request, if any. Insufficient funds logs and
    /// continues; an unsupported kind aborts the step (effects
    /// already applied stand).
    fn apply_effects(
        &mut self,
        effects: &[crate::schema::effect::Effect],
        world: &dyn World,
        executor: &EffectExecutor,
    ) -> Result<Option<String>, SessionError> {
        let mut chain: Option<String> = None;
        for effect in effects {
            match executor.apply(effect, world, &mut self.state) {
                Ok(EffectOutcome::Applied) => {}
                Ok(EffectOutcome::StartScene(scene)) => {
                    if chain.is_none() {
                        chain = Some(scene);
                    } else {
                        warn!(
                            scene = %self.definition.id,
                            dropped = %scene,
                            "multiple start_scene effects in one list; keeping the first"
                        );
                    }
                }
                Err(EffectError::InsufficientFunds(shortfall)) => {
                    warn!(
                        scene = %self.definition.id,
                        actor = self.state.actor.0,
                        %shortfall,
                        "take_currency skipped"
                    );
                }
                Err(err @ EffectError::Unsupported(_)) => return Err(err.into()),
            }
        }
        Ok(chain)
    }

    fn render_choices(
        &mut self,
        choices: &[Choice],
        world: &dyn World,
        evaluator: &ConditionEvaluator,
    ) -> Result<Vec<RenderedChoice>, SessionError> {
        let mut rendered = Vec::new();
        for (i, choice) in choices.iter().enumerate() {
            let index = i + 1;
            let met = match &choice.condition {
                Some(condition) => evaluator.evaluate(condition, world, &self.state, &mut self.rng)?,
                None => true,
            };
            if met {
                rendered.push(RenderedChoice {
                    index,
                    text: choice.text.clone(),
                    selectable: true,
                });
            } else if !choice.hidden {
                let text = choice
                    .disabled_text
                    .clone()
                    .unwrap_or_else(|| format!("{} (unavailable)", choice.text));
                rendered.push(RenderedChoice {
                    index,
                    text,
                    selectable: false,
                });
            }
        }
        Ok(rendered)
    }

    fn render(&self, raw: &str, world: &dyn World) -> String {
        let name = world.name(self.state.actor);
        let ctx = RenderContext {
            name: &name,
            pronouns: world.pronouns(self.state.actor),
            currency: world.balance(self.state.actor),
            flags: &self.state.flags,
        };
        render_text(raw, &ctx)
    }
}
