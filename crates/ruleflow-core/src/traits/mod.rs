//! Capability traits at the engine's seams.

pub mod action;
pub mod rule;
pub mod scheduler;

pub use action::Action;
pub use rule::Rule;
pub use scheduler::Scheduler;
