//! Declarative content types: actor identity, condition and effect
//! descriptors, and scene definitions with their validation rules.

pub mod actor;
pub mod condition;
pub mod effect;
pub mod scene;
