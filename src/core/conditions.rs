/// Condition evaluation — stateless dispatch of condition descriptors
/// against collaborator queries and session-local state.

use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::session::ScenePlayState;
use crate::core::world::{Currency, Inventory, StatusEffects, Tags, World};
use crate::schema::actor::{ActorId, Value};
use crate::schema::condition::Condition;

#[derive(Debug, Error)]
pub enum ConditionError {
    /// An `ext` condition kind with no registered handler. Surfaced
    /// loudly so content typos reach authors instead of defaulting to
    /// a visibility guess.
    #[error("unsupported condition kind: {0}")]
    Unsupported(String),
}

/// Handler for a host-defined `ext` condition kind.
pub type ExtConditionHandler =
    Box<dyn Fn(&HashMap<String, Value>, ActorId, &dyn World, &ScenePlayState) -> bool + Send + Sync>;

/// Evaluates condition descriptors. Built-in kinds are fixed;
/// host-specific kinds are registered by name.
#[derive(Default)]
pub struct ConditionEvaluator {
    ext: FxHashMap<String, ExtConditionHandler>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an `ext` condition kind. Later
    /// registrations replace earlier ones.
    pub fn register(&mut self, kind: &str, handler: ExtConditionHandler) {
        self.ext.insert(kind.to_string(), handler);
    }

    /// Evaluate one condition for the session's actor.
    ///
    /// `random` kinds roll fresh on every call; nothing here is
    /// memoized.
    pub fn evaluate(
        &self,
        condition: &Condition,
        world: &dyn World,
        state: &ScenePlayState,
        rng: &mut StdRng,
    ) -> Result<bool, ConditionError> {
        let actor = state.actor;
        let met = match condition {
            Condition::HasItem { item } => world.has_item(actor, item),
            Condition::LacksItem { item } => !world.has_item(actor, item),
            Condition::CurrencyGte { amount } => world.balance(actor) >= *amount,
            Condition::CurrencyLt { amount } => world.balance(actor) < *amount,
            Condition::HasEffect { effect } => world.has_status(actor, effect),
            Condition::LacksEffect { effect } => !world.has_status(actor, effect),
            Condition::HasTag { tag, category } => {
                world.has_tag(actor, tag, category.as_deref())
            }
            Condition::LacksTag { tag, category } => {
                !world.has_tag(actor, tag, category.as_deref())
            }
            Condition::VisitedNode { node } => state.visited_nodes.contains(node),
            Condition::SceneFlag { flag } => {
                state.flags.get(flag).map(Value::truthy).unwrap_or(false)
            }
            Condition::Random { chance } => rng.gen::<f64>() < *chance,
            Condition::Always => true,
            Condition::Never => false,
            Condition::All(inner) => {
                for c in inner {
                    if !self.evaluate(c, world, state, rng)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any(inner) => {
                for c in inner {
                    if self.evaluate(c, world, state, rng)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(inner) => !self.evaluate(inner, world, state, rng)?,
            Condition::Ext { kind, params } => match self.ext.get(kind) {
                Some(handler) => handler(params, actor, world, state),
                None => return Err(ConditionError::Unsupported(kind.clone())),
            },
        };
        Ok(met)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::world::{Currency, Inventory, MemoryWorld, StatusEffects, Tags};
    use rand::SeedableRng;

    fn state(actor: ActorId) -> ScenePlayState {
        ScenePlayState::new(actor)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn item_conditions_are_complements() {
        let world = MemoryWorld::new();
        let actor = ActorId(1);
        let evaluator = ConditionEvaluator::new();
        let state = state(actor);
        let has = Condition::HasItem {
            item: "rope".to_string(),
        };
        let lacks = Condition::LacksItem {
            item: "rope".to_string(),
        };

        assert!(!evaluator.evaluate(&has, &world, &state, &mut rng()).unwrap());
        assert!(evaluator.evaluate(&lacks, &world, &state, &mut rng()).unwrap());

        world.give_item(actor, "rope");
        assert!(evaluator.evaluate(&has, &world, &state, &mut rng()).unwrap());
        assert!(!evaluator.evaluate(&lacks, &world, &state, &mut rng()).unwrap());
    }

    #[test]
    fn currency_threshold_comparisons() {
        let world = MemoryWorld::new();
        let actor = ActorId(1);
        world.set_balance(actor, 50);
        let evaluator = ConditionEvaluator::new();
        let state = state(actor);

        let gte = Condition::CurrencyGte { amount: 50 };
        let lt = Condition::CurrencyLt { amount: 50 };
        assert!(evaluator.evaluate(&gte, &world, &state, &mut rng()).unwrap());
        assert!(!evaluator.evaluate(&lt, &world, &state, &mut rng()).unwrap());

        world.withdraw(actor, 1).unwrap();
        assert!(!evaluator.evaluate(&gte, &world, &state, &mut rng()).unwrap());
        assert!(evaluator.evaluate(&lt, &world, &state, &mut rng()).unwrap());
    }

    #[test]
    fn status_and_tag_conditions() {
        let world = MemoryWorld::new();
        let actor = ActorId(1);
        world.apply_status(actor, "poisoned", "debuff", None);
        world.add_tag(actor, "initiate", Some("guild"));
        let evaluator = ConditionEvaluator::new();
        let state = state(actor);

        assert!(evaluator
            .evaluate(
                &Condition::HasEffect {
                    effect: "poisoned".to_string()
                },
                &world,
                &state,
                &mut rng()
            )
            .unwrap());
        assert!(evaluator
            .evaluate(
                &Condition::HasTag {
                    tag: "initiate".to_string(),
                    category: Some("guild".to_string())
                },
                &world,
                &state,
                &mut rng()
            )
            .unwrap());
        assert!(evaluator
            .evaluate(
                &Condition::LacksTag {
                    tag: "initiate".to_string(),
                    category: None
                },
                &world,
                &state,
                &mut rng()
            )
            .unwrap());
    }

    #[test]
    fn visited_node_and_scene_flag() {
        let world = MemoryWorld::new();
        let evaluator = ConditionEvaluator::new();
        let mut state = state(ActorId(1));

        let visited = Condition::VisitedNode {
            node: "cellar".to_string(),
        };
        let flag = Condition::SceneFlag {
            flag: "found_key".to_string(),
        };
        assert!(!evaluator.evaluate(&visited, &world, &state, &mut rng()).unwrap());
        assert!(!evaluator.evaluate(&flag, &world, &state, &mut rng()).unwrap());

        state.visited_nodes.insert("cellar".to_string());
        state
            .flags
            .insert("found_key".to_string(), Value::Bool(true));
        assert!(evaluator.evaluate(&visited, &world, &state, &mut rng()).unwrap());
        assert!(evaluator.evaluate(&flag, &world, &state, &mut rng()).unwrap());

        state
            .flags
            .insert("found_key".to_string(), Value::Int(0));
        assert!(!evaluator.evaluate(&flag, &world, &state, &mut rng()).unwrap());
    }

    #[test]
    fn random_extremes_are_deterministic() {
        let world = MemoryWorld::new();
        let evaluator = ConditionEvaluator::new();
        let state = state(ActorId(1));
        let mut rng = rng();
        for _ in 0..50 {
            assert!(!evaluator
                .evaluate(&Condition::Random { chance: 0.0 }, &world, &state, &mut rng)
                .unwrap());
            assert!(evaluator
                .evaluate(&Condition::Random { chance: 1.0 }, &world, &state, &mut rng)
                .unwrap());
        }
    }

    #[test]
    fn composites() {
        let world = MemoryWorld::new();
        let evaluator = ConditionEvaluator::new();
        let state = state(ActorId(1));
        let mut rng = rng();

        let all = Condition::All(vec![Condition::Always, Condition::Never]);
        let any = Condition::Any(vec![Condition::Never, Condition::Always]);
        let not = Condition::Not(Box::new(Condition::Never));
        let empty_all = Condition::All(Vec::new());
        let empty_any = Condition::Any(Vec::new());

        assert!(!evaluator.evaluate(&all, &world, &state, &mut rng).unwrap());
        assert!(evaluator.evaluate(&any, &world, &state, &mut rng).unwrap());
        assert!(evaluator.evaluate(&not, &world, &state, &mut rng).unwrap());
        assert!(evaluator.evaluate(&empty_all, &world, &state, &mut rng).unwrap());
        assert!(!evaluator.evaluate(&empty_any, &world, &state, &mut rng).unwrap());
    }

    #[test]
    fn unregistered_ext_kind_fails_loud() {
        let world = MemoryWorld::new();
        let evaluator = ConditionEvaluator::new();
        let state = state(ActorId(1));
        let cond = Condition::Ext {
            kind: "moon_phase".to_string(),
            params: HashMap::new(),
        };
        assert!(matches!(
            evaluator.evaluate(&cond, &world, &state, &mut rng()),
            Err(ConditionError::Unsupported(kind)) if kind == "moon_phase"
        ));
    }

    #[test]
    fn registered_ext_kind_dispatches() {
        let world = MemoryWorld::new();
        let mut evaluator = ConditionEvaluator::new();
        evaluator.register(
            "moon_phase",
            Box::new(|params, _actor, _world, _state| {
                matches!(params.get("phase"), Some(Value::String(s)) if s == "full")
            }),
        );
        let state = state(ActorId(1));
        let cond = Condition::Ext {
            kind: "moon_phase".to_string(),
            params: HashMap::from([(
                "phase".to_string(),
                Value::String("full".to_string()),
            )]),
        };
        assert!(evaluator.evaluate(&cond, &world, &state, &mut rng()).unwrap());
    }
}
