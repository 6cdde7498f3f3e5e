/// Effect execution — stateless dispatch of effect descriptors to
/// collaborators, with the two scene-local exceptions (`set_flag`,
/// `clear_flag`) and `start_scene` surfaced to the session as a chain
/// request.

use rustc_hash::FxHashMap;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::core::session::ScenePlayState;
use crate::core::world::{
    Attributes, Currency, InsufficientFunds, Inventory, Location, Messaging, StatusEffects, Tags,
    World,
};
use crate::schema::actor::{ActorId, Value};
use crate::schema::effect::Effect;

#[derive(Debug, Error)]
pub enum EffectError {
    /// An `ext` effect kind with no registered handler.
    #[error("unsupported effect kind: {0}")]
    Unsupported(String),
    /// `take_currency` against an insufficient balance. Nothing was
    /// debited; the caller picks the policy.
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),
}

/// What a successful apply produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    /// The side effect happened (or was best-effort attempted).
    Applied,
    /// A `start_scene` request: the caller must suspend and chain
    /// into the named scene.
    StartScene(String),
}

/// Handler for a host-defined `ext` effect kind. Returns false if the
/// effect could not be applied (logged, non-fatal).
pub type ExtEffectHandler = Box<
    dyn Fn(&HashMap<String, Value>, ActorId, &dyn World, &mut ScenePlayState) -> bool
        + Send
        + Sync,
>;

/// Applies effect descriptors one at a time. Effect lists are not
/// transactional; callers that stop mid-list leave earlier effects
/// standing.
#[derive(Default)]
pub struct EffectExecutor {
    ext: FxHashMap<String, ExtEffectHandler>,
}

impl EffectExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an `ext` effect kind. Later
    /// registrations replace earlier ones.
    pub fn register(&mut self, kind: &str, handler: ExtEffectHandler) {
        self.ext.insert(kind.to_string(), handler);
    }

    /// Apply one effect for the session's actor.
    pub fn apply(
        &self,
        effect: &Effect,
        world: &dyn World,
        state: &mut ScenePlayState,
    ) -> Result<EffectOutcome, EffectError> {
        let actor = state.actor;
        match effect {
            Effect::Message { text } => {
                if let Err(err) = world.send_to_actor(actor, text) {
                    warn!(actor = actor.0, error = %err, "message effect not delivered");
                }
            }
            Effect::MessageRoom {
                text,
                exclude_actor,
            } => {
                if let Err(err) = world.send_to_surroundings(actor, text, *exclude_actor) {
                    warn!(actor = actor.0, error = %err, "room message effect not delivered");
                }
            }
            Effect::ApplyEffect {
                key,
                category,
                duration,
            } => world.apply_status(actor, key, category, *duration),
            Effect::RemoveEffect { key } => world.remove_status(actor, key),
            Effect::Transform {
                key,
                species,
                features,
                duration,
            } => world.transform(actor, key, species.as_deref(), features, *duration),
            Effect::GiveCurrency { amount } => world.deposit(actor, *amount),
            Effect::TakeCurrency { amount } => world.withdraw(actor, *amount)?,
            Effect::GiveItem { key } => world.give_item(actor, key),
            Effect::TakeItem { key } => {
                if !world.take_item(actor, key) {
                    warn!(actor = actor.0, item = %key, "take_item: actor holds no such item");
                }
            }
            Effect::Teleport { destination } => {
                if !world.teleport(actor, destination) {
                    warn!(actor = actor.0, destination = %destination, "teleport destination unknown");
                }
            }
            Effect::SetAttr { attr, value } => world.set_attr(actor, attr, value.clone()),
            Effect::AddTag { tag, category } => world.add_tag(actor, tag, category.as_deref()),
            Effect::RemoveTag { tag, category } => {
                world.remove_tag(actor, tag, category.as_deref())
            }
            Effect::SetFlag { flag, value } => {
                state.flags.insert(flag.clone(), value.clone());
            }
            Effect::ClearFlag { flag } => {
                state.flags.remove(flag);
            }
            Effect::StartScene { scene } => {
                return Ok(EffectOutcome::StartScene(scene.clone()));
            }
            Effect::Ext { kind, params } => match self.ext.get(kind) {
                Some(handler) => {
                    if !handler(params, actor, world, state) {
                        warn!(kind = %kind, "ext effect handler reported failure");
                    }
                }
                None => return Err(EffectError::Unsupported(kind.clone())),
            },
        }
        Ok(EffectOutcome::Applied)
    }
}
