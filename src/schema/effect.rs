/// Effect descriptors — declarative instructions for one observable
/// side effect, attached to nodes (fired on entry) and choices (fired
/// on selection).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::actor::Value;

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "status".to_string()
}

fn default_flag_value() -> Value {
    Value::Bool(true)
}

/// A single effect descriptor. Apart from `set_flag`/`clear_flag`,
/// which mutate the session's own scene-local flags, every kind
/// delegates to an external collaborator.
///
/// Effect lists are not transactional: a failure partway through a
/// list leaves already-applied effects standing. Narrative
/// consequences are irreversible by nature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Send text to the actor. Best-effort; delivery failure is
    /// logged and never fails the apply sequence.
    Message { text: String },
    /// Send text to the actor's surroundings, optionally excluding
    /// the actor (excluded by default). Best-effort.
    MessageRoom {
        text: String,
        #[serde(default = "default_true")]
        exclude_actor: bool,
    },
    /// Apply a status effect with key, category and optional duration
    /// in seconds.
    ApplyEffect {
        key: String,
        #[serde(default = "default_category")]
        category: String,
        #[serde(default)]
        duration: Option<f64>,
    },
    /// Remove a status effect by key.
    RemoveEffect { key: String },
    /// Apply a transformation with optional species and trait payload.
    Transform {
        key: String,
        #[serde(default)]
        species: Option<String>,
        #[serde(default)]
        features: HashMap<String, Value>,
        #[serde(default)]
        duration: Option<f64>,
    },
    /// Credit the actor's currency balance.
    GiveCurrency { amount: i64 },
    /// Debit the actor's currency balance. Insufficient balance is a
    /// signal to the caller, not a hard failure; nothing is debited.
    TakeCurrency { amount: i64 },
    /// Spawn an item into the actor's inventory.
    GiveItem { key: String },
    /// Remove an item from the actor's inventory by key.
    TakeItem { key: String },
    /// Move the actor to a destination known to the host.
    Teleport { destination: String },
    /// Set a persistent attribute on the actor.
    SetAttr { attr: String, value: Value },
    /// Add a (tag, category) pair to the actor.
    AddTag {
        tag: String,
        #[serde(default)]
        category: Option<String>,
    },
    /// Remove a (tag, category) pair from the actor.
    RemoveTag {
        tag: String,
        #[serde(default)]
        category: Option<String>,
    },
    /// Set a scene-local flag. Discarded when the session ends.
    SetFlag {
        flag: String,
        #[serde(default = "default_flag_value")]
        value: Value,
    },
    /// Clear a scene-local flag.
    ClearFlag { flag: String },
    /// Start a nested scene on the same actor. The current session
    /// suspends until the nested session terminates.
    StartScene { scene: String },
    /// Host-defined effect, dispatched through the executor's handler
    /// table. Unregistered kinds fail loudly at application.
    Ext {
        kind: String,
        #[serde(default)]
        params: HashMap<String, Value>,
    },
}
