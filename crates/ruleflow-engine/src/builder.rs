//! Fluent declaration API.
//!
//! ```ignore
//! flow.subscribe("order:created")
//!     .channel("remind")?
//!     .after(300)
//!     .comply(FieldRule::new("/status", Comparison::Eq, json!("pending")))
//!     .trigger(LogAction::new("order {{context/id}} still pending"));
//! ```
//!
//! The subscribed event lives in the builder value, never on the flow, so
//! two declaration chains cannot see each other's event.

use ruleflow_core::{Action, Result, Rule, TriggerPolicy};

use crate::channel::Channel;
use crate::flow::Flow;

/// Result of `Flow::subscribe`: remembers the event for the next `channel` call.
pub struct Subscription<'a, H: Send + Sync + 'static> {
    flow: &'a mut Flow<H>,
    event: String,
}

impl<'a, H: Send + Sync + 'static> Subscription<'a, H> {
    pub(crate) fn new(flow: &'a mut Flow<H>, event: &str) -> Self {
        Self {
            flow,
            event: event.to_string(),
        }
    }

    /// Register a channel on the subscribed event.
    ///
    /// Fails when the event or the name is empty, or when the pair is taken.
    pub fn channel(self, name: &str) -> Result<ChannelBuilder<'a, H>> {
        let index = self.flow.register(&self.event, name)?;
        Ok(ChannelBuilder {
            flow: self.flow,
            index,
        })
    }
}

/// Configures a freshly registered channel.
pub struct ChannelBuilder<'a, H: Send + Sync + 'static> {
    flow: &'a mut Flow<H>,
    index: usize,
}

impl<'a, H: Send + Sync + 'static> ChannelBuilder<'a, H> {
    fn channel_mut(&mut self) -> &mut Channel<H> {
        self.flow.channel_at_mut(self.index)
    }

    /// Wait `seconds` before the first (postponed) check.
    pub fn after(mut self, seconds: u64) -> Self {
        self.channel_mut().set_delay(seconds);
        self
    }

    /// Check again every `seconds` after each postponed check (at least 1).
    pub fn every(mut self, seconds: u64) -> Self {
        self.channel_mut().set_every(seconds);
        self
    }

    /// Add a rule: postponed on a delayed channel, immediate otherwise.
    pub fn comply(mut self, rule: impl Rule<H> + 'static) -> Self {
        self.channel_mut().push_rule(Box::new(rule), false);
        self
    }

    /// Add a rule checked only when a scheduled task comes due.
    pub fn comply_postponed(mut self, rule: impl Rule<H> + 'static) -> Self {
        self.channel_mut().push_rule(Box::new(rule), true);
        self
    }

    pub fn trigger(mut self, action: impl Action<H> + 'static) -> Self {
        self.channel_mut().push_action(Box::new(action));
        self
    }

    pub fn trigger_policy(mut self, policy: TriggerPolicy) -> Self {
        self.channel_mut().set_policy(policy);
        self
    }

    /// Register a sibling channel on the same event.
    pub fn channel(self, name: &str) -> Result<ChannelBuilder<'a, H>> {
        let event = self.flow.channel_at(self.index).event().to_string();
        Subscription::new(self.flow, &event).channel(name)
    }
}
