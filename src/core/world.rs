/// Collaborator traits — the narrow seams between the scene engine
/// and the host game. The engine holds no durable actor state of its
/// own; every query and mutation goes through these.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use thiserror::Error;

use crate::schema::actor::{ActorId, Pronouns, Value};

/// Signal raised by [`Currency::withdraw`] when the balance does not
/// cover the debit. Nothing is debited; policy is the caller's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient funds: required {required}, available {available}")]
pub struct InsufficientFunds {
    pub required: i64,
    pub available: i64,
}

/// Delivery failure from the messaging surface. Message effects treat
/// this as best-effort: logged, never fatal to an apply sequence.
#[derive(Debug, Clone, Error)]
#[error("message delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Display identity for an actor.
pub trait ActorInfo {
    fn name(&self, actor: ActorId) -> String;
    fn pronouns(&self, actor: ActorId) -> Pronouns;
}

/// Keyed inventory queries and mutations.
pub trait Inventory {
    fn has_item(&self, actor: ActorId, key: &str) -> bool;
    fn give_item(&self, actor: ActorId, key: &str);
    /// Returns false if the actor held no such item.
    fn take_item(&self, actor: ActorId, key: &str) -> bool;
}

/// Currency balance queries and transfers.
pub trait Currency {
    fn balance(&self, actor: ActorId) -> i64;
    fn deposit(&self, actor: ActorId, amount: i64);
    fn withdraw(&self, actor: ActorId, amount: i64) -> Result<(), InsufficientFunds>;
}

/// Status effects and transformations on an actor.
pub trait StatusEffects {
    fn has_status(&self, actor: ActorId, key: &str) -> bool;
    fn apply_status(&self, actor: ActorId, key: &str, category: &str, duration: Option<f64>);
    fn remove_status(&self, actor: ActorId, key: &str);
    fn transform(
        &self,
        actor: ActorId,
        key: &str,
        species: Option<&str>,
        features: &HashMap<String, Value>,
        duration: Option<f64>,
    );
}

/// (tag, category) pairs on an actor.
pub trait Tags {
    fn has_tag(&self, actor: ActorId, tag: &str, category: Option<&str>) -> bool;
    fn add_tag(&self, actor: ActorId, tag: &str, category: Option<&str>);
    fn remove_tag(&self, actor: ActorId, tag: &str, category: Option<&str>);
}

/// Persistent attributes on an actor, distinct from scene-local flags.
pub trait Attributes {
    fn set_attr(&self, actor: ActorId, attr: &str, value: Value);
    fn attr(&self, actor: ActorId, attr: &str) -> Option<Value>;
}

/// Moving actors between host-defined locations.
pub trait Location {
    /// Returns false if the destination is unknown to the host.
    fn teleport(&self, actor: ActorId, destination: &str) -> bool;
}

/// Text delivery to an actor or their surroundings.
pub trait Messaging {
    fn send_to_actor(&self, actor: ActorId, text: &str) -> Result<(), DeliveryError>;
    fn send_to_surroundings(
        &self,
        actor: ActorId,
        text: &str,
        exclude_actor: bool,
    ) -> Result<(), DeliveryError>;
}

/// Umbrella trait for a complete host. Anything implementing the
/// individual collaborator traits qualifies. Sessions for different
/// actors may run concurrently, so hosts must be shareable.
pub trait World:
    ActorInfo
    + Inventory
    + Currency
    + StatusEffects
    + Tags
    + Attributes
    + Location
    + Messaging
    + Send
    + Sync
{
}

impl<T> World for T where
    T: ActorInfo
        + Inventory
        + Currency
        + StatusEffects
        + Tags
        + Attributes
        + Location
        + Messaging
        + Send
        + Sync
{
}

#[derive(Debug, Default)]
struct ActorRecord {
    name: String,
    pronouns: Pronouns,
    items: FxHashMap<String, u32>,
    balance: i64,
    statuses: FxHashMap<String, String>,
    tags: FxHashMap<String, Option<String>>,
    attrs: FxHashMap<String, Value>,
    location: Option<String>,
}

/// In-memory world for tests and the preview tool. Every mutation is
/// inspectable; messages are captured rather than delivered anywhere.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    actors: Mutex<FxHashMap<ActorId, ActorRecord>>,
    actor_messages: Mutex<Vec<(ActorId, String)>>,
    room_messages: Mutex<Vec<String>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_actor(&self, actor: ActorId, name: &str, pronouns: Pronouns) {
        let mut actors = self.actors.lock();
        let record = actors.entry(actor).or_default();
        record.name = name.to_string();
        record.pronouns = pronouns;
    }

    pub fn set_balance(&self, actor: ActorId, balance: i64) {
        self.actors.lock().entry(actor).or_default().balance = balance;
    }

    /// Messages captured for one actor, in delivery order.
    pub fn messages_for(&self, actor: ActorId) -> Vec<String> {
        self.actor_messages
            .lock()
            .iter()
            .filter(|(a, _)| *a == actor)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Messages broadcast to surroundings, in delivery order.
    pub fn room_messages(&self) -> Vec<String> {
        self.room_messages.lock().clone()
    }

    pub fn location_of(&self, actor: ActorId) -> Option<String> {
        self.actors
            .lock()
            .get(&actor)
            .and_then(|r| r.location.clone())
    }

    pub fn item_count(&self, actor: ActorId, key: &str) -> u32 {
        self.actors
            .lock()
            .get(&actor)
            .and_then(|r| r.items.get(key).copied())
            .unwrap_or(0)
    }

    fn tag_key(tag: &str, category: Option<&str>) -> String {
        match category {
            Some(category) => format!("{}:{}", category, tag),
            None => tag.to_string(),
        }
    }
}

impl ActorInfo for MemoryWorld {
    fn name(&self, actor: ActorId) -> String {
        self.actors
            .lock()
            .get(&actor)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| format!("actor#{}", actor.0))
    }

    fn pronouns(&self, actor: ActorId) -> Pronouns {
        self.actors
            .lock()
            .get(&actor)
            .map(|r| r.pronouns)
            .unwrap_or_default()
    }
}

impl Inventory for MemoryWorld {
    fn has_item(&self, actor: ActorId, key: &str) -> bool {
        self.item_count(actor, key) > 0
    }

    fn give_item(&self, actor: ActorId, key: &str) {
        let mut actors = self.actors.lock();
        *actors
            .entry(actor)
            .or_default()
            .items
            .entry(key.to_string())
            .or_insert(0) += 1;
    }

    fn take_item(&self, actor: ActorId, key: &str) -> bool {
        let mut actors = self.actors.lock();
        let record = actors.entry(actor).or_default();
        match record.items.get_mut(key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    record.items.remove(key);
                }
                true
            }
            _ => false,
        }
    }
}

impl Currency for MemoryWorld {
    fn balance(&self, actor: ActorId) -> i64 {
        self.actors
            .lock()
            .get(&actor)
            .map(|r| r.balance)
            .unwrap_or(0)
    }

    fn deposit(&self, actor: ActorId, amount: i64) {
        self.actors.lock().entry(actor).or_default().balance += amount;
    }

    fn withdraw(&self, actor: ActorId, amount: i64) -> Result<(), InsufficientFunds> {
        let mut actors = self.actors.lock();
        let record = actors.entry(actor).or_default();
        if record.balance < amount {
            return Err(InsufficientFunds {
                required: amount,
                available: record.balance,
            });
        }
        record.balance -= amount;
        Ok(())
    }
}

impl StatusEffects for MemoryWorld {
    fn has_status(&self, actor: ActorId, key: &str) -> bool {
        self.actors
            .lock()
            .get(&actor)
            .map(|r| r.statuses.contains_key(key))
            .unwrap_or(false)
    }

    fn apply_status(&self, actor: ActorId, key: &str, category: &str, _duration: Option<f64>) {
        self.actors
            .lock()
            .entry(actor)
            .or_default()
            .statuses
            .insert(key.to_string(), category.to_string());
    }

    fn remove_status(&self, actor: ActorId, key: &str) {
        if let Some(record) = self.actors.lock().get_mut(&actor) {
            record.statuses.remove(key);
        }
    }

    fn transform(
        &self,
        actor: ActorId,
        key: &str,
        _species: Option<&str>,
        _features: &HashMap<String, Value>,
        _duration: Option<f64>,
    ) {
        // Recorded as a status under its own category.
        self.actors
            .lock()
            .entry(actor)
            .or_default()
            .statuses
            .insert(key.to_string(), "transformation".to_string());
    }
}

impl Tags for MemoryWorld {
    fn has_tag(&self, actor: ActorId, tag: &str, category: Option<&str>) -> bool {
        self.actors
            .lock()
            .get(&actor)
            .map(|r| r.tags.contains_key(&Self::tag_key(tag, category)))
            .unwrap_or(false)
    }

    fn add_tag(&self, actor: ActorId, tag: &str, category: Option<&str>) {
        self.actors
            .lock()
            .entry(actor)
            .or_default()
            .tags
            .insert(Self::tag_key(tag, category), category.map(str::to_string));
    }

    fn remove_tag(&self, actor: ActorId, tag: &str, category: Option<&str>) {
        if let Some(record) = self.actors.lock().get_mut(&actor) {
            record.tags.remove(&Self::tag_key(tag, category));
        }
    }
}

impl Attributes for MemoryWorld {
    fn set_attr(&self, actor: ActorId, attr: &str, value: Value) {
        self.actors
            .lock()
            .entry(actor)
            .or_default()
            .attrs
            .insert(attr.to_string(), value);
    }

    fn attr(&self, actor: ActorId, attr: &str) -> Option<Value> {
        self.actors
            .lock()
            .get(&actor)
            .and_then(|r| r.attrs.get(attr).cloned())
    }
}

impl Location for MemoryWorld {
    fn teleport(&self, actor: ActorId, destination: &str) -> bool {
        self.actors.lock().entry(actor).or_default().location = Some(destination.to_string());
        true
    }
}

impl Messaging for MemoryWorld {
    fn send_to_actor(&self, actor: ActorId, text: &str) -> Result<(), DeliveryError> {
        self.actor_messages.lock().push((actor, text.to_string()));
        Ok(())
    }

    fn send_to_surroundings(
        &self,
        _actor: ActorId,
        text: &str,
        _exclude_actor: bool,
    ) -> Result<(), DeliveryError> {
        self.room_messages.lock().push(text.to_string());
        Ok(())
    }
}
