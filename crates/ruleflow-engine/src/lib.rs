//! # RuleFlow Engine
//!
//! Channels subscribe to named events. Each channel carries immediate rules,
//! postponed rules, an optional delay and repeat interval, and the actions
//! fired on a match. [`Flow::message`] runs the immediate check and hands a
//! [`ruleflow_core::Task`] to the [`ruleflow_core::Scheduler`];
//! [`Flow::process`] runs the postponed check once the scheduler redelivers it.

pub mod actions;
pub mod builder;
pub mod channel;
pub mod declare;
pub mod flow;
pub mod memory;
pub mod rules;
pub mod runner;

pub use actions::{FnAction, LogAction};
pub use builder::{ChannelBuilder, Subscription};
pub use channel::{Channel, Dispatch};
pub use declare::declare;
pub use flow::{Flow, Processed};
pub use memory::MemoryScheduler;
pub use rules::{All, Always, Any, FieldRule, FnRule, Never, Not};
pub use runner::{RedeliveryStats, redeliver_due, run_until_idle, spawn_redelivery};

pub use ruleflow_core::{
    Action, Context, Flag, FlowConfig, FlowError, Result, Rule, Scheduler, Stage, Task,
    TriggerPolicy,
};
