//! Flow: the channel registry and dispatcher.
//!
//! ## Dispatch paths
//! ```text
//! message(event, context)
//!   → every channel on `event`, fanned out and joined
//!     → immediate rules (skipped on delayed channels)
//!     → match: Scheduler.schedule(task due now + delay)
//!
//! [scheduler waits until task.date]
//!
//! process(task)
//!   → find channel, reject unknown or early tasks
//!   → postponed rules against the task's context
//!   → repeat: Scheduler.schedule(task due now + every), match or not
//!   → match + trigger policy: fire every action in order
//! ```
//!
//! `message` is all-or-nothing: it fails if any channel on the event rejects
//! the context, even though the other channels have already scheduled their
//! tasks. Callers that need per-channel outcomes use `message_each` or watch
//! the scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use ruleflow_core::{Context, FlowError, Result, Scheduler, Stage, Task};

use crate::builder::Subscription;
use crate::channel::{Channel, Dispatch};

/// Outcome of a successful `process` call.
#[derive(Debug)]
pub struct Processed {
    /// Next tick, for repeating channels.
    pub rescheduled: Option<Task>,
    /// Actions invoked.
    pub fired: usize,
    /// The rules matched but the trigger policy held the actions back.
    pub suppressed: bool,
    /// Actions that returned an error, by name. Later actions still ran.
    pub failures: Vec<(String, FlowError)>,
}

pub struct Flow<H: Send + Sync + 'static> {
    helpers: H,
    scheduler: Arc<dyn Scheduler>,
    channels: Vec<Channel<H>>,
}

impl<H: Send + Sync + 'static> Flow<H> {
    /// Create a flow. `helpers` is passed unchanged to every rule and action.
    pub fn new(helpers: H, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            helpers,
            scheduler,
            channels: Vec::new(),
        }
    }

    pub fn helpers(&self) -> &H {
        &self.helpers
    }

    /// Registered channels, in registration order.
    pub fn channels(&self) -> &[Channel<H>] {
        &self.channels
    }

    /// Start declaring channels for `event`.
    pub fn subscribe(&mut self, event: &str) -> Subscription<'_, H> {
        Subscription::new(self, event)
    }

    pub fn find(&self, event: &str, name: &str) -> Option<&Channel<H>> {
        self.channels
            .iter()
            .find(|c| c.event() == event && c.name() == name)
    }

    pub(crate) fn register(&mut self, event: &str, name: &str) -> Result<usize> {
        if name.is_empty() {
            return Err(FlowError::MissingName);
        }
        if event.is_empty() {
            return Err(FlowError::MissingEvent);
        }
        if self.find(event, name).is_some() {
            return Err(FlowError::DuplicateChannel {
                event: event.to_string(),
                name: name.to_string(),
            });
        }

        tracing::info!("📡 Registered channel {event}/{name}");
        self.channels.push(Channel::new(event, name));
        Ok(self.channels.len() - 1)
    }

    pub(crate) fn channel_at(&self, index: usize) -> &Channel<H> {
        &self.channels[index]
    }

    pub(crate) fn channel_at_mut(&mut self, index: usize) -> &mut Channel<H> {
        &mut self.channels[index]
    }

    /// Deliver an event now. See [`Flow::message_at`].
    pub async fn message(&self, event: &str, context: Context) -> Result<Vec<Task>> {
        self.message_at(event, context, Utc::now()).await
    }

    /// Deliver an event to every channel subscribed to it.
    ///
    /// Returns the scheduled tasks in registration order. Fails with
    /// `NoChannels` when nothing listens to `event`, or with the first
    /// channel's error when any channel rejects the context.
    pub async fn message_at(
        &self,
        event: &str,
        context: Context,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let outcomes = self.message_each(event, context, now).await;
        if outcomes.is_empty() {
            return Err(FlowError::NoChannels(event.to_string()));
        }
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Deliver an event and report each channel's outcome separately.
    pub async fn message_each(
        &self,
        event: &str,
        context: Context,
        now: DateTime<Utc>,
    ) -> Vec<(String, Result<Task>)> {
        let selected: Vec<&Channel<H>> =
            self.channels.iter().filter(|c| c.event() == event).collect();
        if selected.is_empty() {
            tracing::debug!("No channel subscribed to '{event}'");
        }

        let checks = selected
            .iter()
            .map(|channel| self.check_immediate(channel, &context, now));
        let outcomes = join_all(checks).await;

        selected
            .iter()
            .map(|c| c.name().to_string())
            .zip(outcomes)
            .collect()
    }

    async fn check_immediate(
        &self,
        channel: &Channel<H>,
        context: &Context,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        if !channel.match_immediate(context, &self.helpers).await {
            tracing::debug!(
                "Immediate rules rejected {}/{}",
                channel.event(),
                channel.name()
            );
            return Err(FlowError::NoMatch {
                event: channel.event().to_string(),
                channel: channel.name().to_string(),
                stage: Stage::Immediate,
            });
        }
        let task = channel.to_task(context.clone(), now)?;
        self.emit(task).await
    }

    /// Handle a redelivered task now. See [`Flow::process_at`].
    pub async fn process(&self, task: &Task) -> Result<Processed> {
        self.process_at(task, Utc::now()).await
    }

    /// Run the postponed check for a task that came due.
    ///
    /// Unknown channels and tasks dated after `now` are rejected before any
    /// rule runs. The repeat decision runs whether or not the rules match;
    /// actions fire only on a match the trigger policy lets through.
    pub async fn process_at(&self, task: &Task, now: DateTime<Utc>) -> Result<Processed> {
        let Some(channel) = self.find(task.event(), task.channel()) else {
            return Err(FlowError::UnknownChannel {
                event: task.event().to_string(),
                channel: task.channel().to_string(),
            });
        };
        if !task.is_due(now) {
            return Err(FlowError::NotDue {
                event: task.event().to_string(),
                channel: task.channel().to_string(),
                due: task.date(),
            });
        }

        let dispatch = Dispatch::from_task(task, now);
        let matched = channel
            .match_postponed(&dispatch.context, &self.helpers)
            .await;
        let rescheduled = self.repeat(channel, &dispatch, matched).await?;

        if !matched {
            tracing::debug!(
                "Postponed rules rejected {}/{}",
                channel.event(),
                channel.name()
            );
            return Err(FlowError::NoMatch {
                event: channel.event().to_string(),
                channel: channel.name().to_string(),
                stage: Stage::Postponed,
            });
        }

        if !channel.should_trigger(&dispatch) {
            tracing::debug!(
                "Trigger policy held back {}/{}",
                channel.event(),
                channel.name()
            );
            return Ok(Processed {
                rescheduled,
                fired: 0,
                suppressed: true,
                failures: Vec::new(),
            });
        }

        let failures = self.fire(channel, &dispatch.context).await;
        Ok(Processed {
            rescheduled,
            fired: channel.action_count(),
            suppressed: false,
            failures,
        })
    }

    async fn emit(&self, task: Task) -> Result<Task> {
        if let Err(e) = self.scheduler.schedule(task.clone()).await {
            tracing::warn!(
                "⚠️ Failed to schedule {}/{}: {e}",
                task.event(),
                task.channel()
            );
            return Err(e);
        }
        tracing::info!(
            "📅 Scheduled {}/{} for {}",
            task.event(),
            task.channel(),
            task.date()
        );
        Ok(task)
    }

    async fn repeat(
        &self,
        channel: &Channel<H>,
        dispatch: &Dispatch,
        matched: bool,
    ) -> Result<Option<Task>> {
        match channel.repeat_task(dispatch, matched)? {
            Some(task) => self.emit(task).await.map(Some),
            None => Ok(None),
        }
    }

    async fn fire(&self, channel: &Channel<H>, context: &Context) -> Vec<(String, FlowError)> {
        tracing::info!("🔔 Channel {}/{} triggered", channel.event(), channel.name());
        let mut failures = Vec::new();
        for action in channel.actions() {
            if let Err(e) = action.fire(context, &self.helpers).await {
                tracing::warn!(
                    "⚠️ Action '{}' on {}/{} failed: {e}",
                    action.name(),
                    channel.event(),
                    channel.name()
                );
                failures.push((action.name().to_string(), e));
            }
        }
        failures
    }
}
