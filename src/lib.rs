//! Scene Engine — branching scene and dialogue traversal for games.
//!
//! Plays declarative scene definitions (nodes, conditional choices,
//! effects, timed auto-advances) against a host-provided world. The
//! engine owns traversal state only; every durable query and mutation
//! goes through narrow collaborator traits the host implements.

pub mod core;
pub mod schema;
