//! # RuleFlow Core
//!
//! Shared vocabulary for the RuleFlow engine: the error taxonomy, the task
//! record exchanged with schedulers, the capability traits implemented by
//! rules, actions and schedulers, and the TOML configuration model.

pub mod config;
pub mod error;
pub mod task;
pub mod traits;

pub use config::FlowConfig;
pub use error::{FlowError, Result, Stage};
pub use task::{Context, Flag, MAX_DELAY_SECS, Task, TriggerPolicy};
pub use traits::{Action, Rule, Scheduler};
