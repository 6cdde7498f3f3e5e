pub mod conditions;
pub mod effects;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod template;
pub mod world;
