//! Channel: the declarative unit bound to one (event, name) pair.
//!
//! A channel owns two rule sets (immediate and postponed), its actions, the
//! delay before the first postponed check and an optional repeat interval.
//! It carries no dispatch state: everything a redelivered task brings along
//! travels in a [`Dispatch`] record instead.

use chrono::{DateTime, Utc};
use ruleflow_core::{Action, Context, Flag, Result, Rule, Task, TriggerPolicy};

/// A rule plus where it was asked to run.
struct Compliance<H: Send + Sync + 'static> {
    rule: Box<dyn Rule<H>>,
    postponed: bool,
}

/// Immutable snapshot of a redelivered task, threaded through the postponed
/// check, the repeat decision and the trigger decision.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub flag: Option<Flag>,
    pub context: Context,
    pub now: DateTime<Utc>,
}

impl Dispatch {
    pub fn from_task(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            flag: task.flag(),
            context: task.context().clone(),
            now,
        }
    }
}

pub struct Channel<H: Send + Sync + 'static> {
    event: String,
    name: String,
    delay: u64,
    every: Option<u64>,
    policy: TriggerPolicy,
    rules: Vec<Compliance<H>>,
    actions: Vec<Box<dyn Action<H>>>,
}

impl<H: Send + Sync + 'static> Channel<H> {
    pub(crate) fn new(event: &str, name: &str) -> Self {
        Self {
            event: event.to_string(),
            name: name.to_string(),
            delay: 0,
            every: None,
            policy: TriggerPolicy::default(),
            rules: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds before the first postponed check.
    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn repeat_interval(&self) -> Option<u64> {
        self.every
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        self.policy
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Rules checked when the event arrives. A delayed channel has none.
    pub fn immediate_rules(&self) -> Vec<&dyn Rule<H>> {
        if self.delay > 0 {
            return Vec::new();
        }
        self.rules
            .iter()
            .filter(|c| !c.postponed)
            .map(|c| c.rule.as_ref())
            .collect()
    }

    /// Rules checked when a scheduled task comes due. On a delayed channel
    /// every rule lands here, whichever order `after` and `comply` were called in.
    pub fn postponed_rules(&self) -> Vec<&dyn Rule<H>> {
        let delayed = self.delay > 0;
        self.rules
            .iter()
            .filter(|c| delayed || c.postponed)
            .map(|c| c.rule.as_ref())
            .collect()
    }

    pub async fn match_immediate(&self, context: &Context, helpers: &H) -> bool {
        match_all(&self.immediate_rules(), context, helpers).await
    }

    pub async fn match_postponed(&self, context: &Context, helpers: &H) -> bool {
        match_all(&self.postponed_rules(), context, helpers).await
    }

    /// First-delivery task for a context that passed the immediate check.
    pub fn to_task(&self, context: Context, now: DateTime<Utc>) -> Result<Task> {
        Task::due_in(&self.name, &self.event, self.delay, None, context, now)
    }

    pub fn should_repeat(&self) -> bool {
        self.every.is_some()
    }

    /// Next tick's task, built from the dispatched context. `None` when the
    /// channel does not repeat.
    pub fn repeat_task(&self, dispatch: &Dispatch, matched: bool) -> Result<Option<Task>> {
        let Some(every) = self.every else {
            return Ok(None);
        };
        let flag = match self.policy {
            TriggerPolicy::RisingEdge if matched => Flag::Triggered,
            _ => Flag::Available,
        };
        Task::due_in(
            &self.name,
            &self.event,
            every,
            Some(flag),
            dispatch.context.clone(),
            dispatch.now,
        )
        .map(Some)
    }

    /// Whether a matching postponed check should fire the actions.
    pub fn should_trigger(&self, dispatch: &Dispatch) -> bool {
        match self.policy {
            TriggerPolicy::EveryMatch => true,
            TriggerPolicy::RisingEdge => dispatch.flag != Some(Flag::Triggered),
        }
    }

    pub(crate) fn actions(&self) -> &[Box<dyn Action<H>>] {
        &self.actions
    }

    pub(crate) fn set_delay(&mut self, seconds: u64) {
        self.delay = seconds;
    }

    /// A zero interval would redeliver in a tight loop; it becomes one second.
    pub(crate) fn set_every(&mut self, seconds: u64) {
        if seconds == 0 {
            tracing::warn!(
                "⚠️ {}/{}: every(0) raised to 1s",
                self.event,
                self.name
            );
        }
        self.every = Some(seconds.max(1));
    }

    pub(crate) fn set_policy(&mut self, policy: TriggerPolicy) {
        self.policy = policy;
    }

    pub(crate) fn push_rule(&mut self, rule: Box<dyn Rule<H>>, postponed: bool) {
        self.rules.push(Compliance { rule, postponed });
    }

    pub(crate) fn push_action(&mut self, action: Box<dyn Action<H>>) {
        self.actions.push(action);
    }
}

impl<H: Send + Sync + 'static> std::fmt::Debug for Channel<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("event", &self.event)
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("every", &self.every)
            .field("policy", &self.policy)
            .field("rules", &self.rules.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Every rule must accept the context; an empty set always matches.
/// Evaluation stops at the first rejection. A failing rule counts as a rejection.
async fn match_all<H: Send + Sync + 'static>(
    rules: &[&dyn Rule<H>],
    context: &Context,
    helpers: &H,
) -> bool {
    for rule in rules {
        match rule.matches(context, helpers).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Rule '{}' rejected context", rule.name());
                return false;
            }
            Err(e) => {
                tracing::warn!("⚠️ Rule '{}' failed, treating as no match: {e}", rule.name());
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Always, FnRule, Never};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn dispatch(flag: Option<Flag>) -> Dispatch {
        Dispatch {
            flag,
            context: json!({"id": 7}),
            now: at(100),
        }
    }

    #[test]
    fn test_comply_placement_follows_delay() {
        let mut ch: Channel<()> = Channel::new("yellow:submarine", "emerge");
        ch.push_rule(Box::new(Always), false);
        ch.push_rule(Box::new(Never), true);
        assert_eq!(ch.immediate_rules().len(), 1);
        assert_eq!(ch.postponed_rules().len(), 1);

        // A delay set after the rules still moves them all to the postponed set.
        ch.set_delay(5);
        assert!(ch.immediate_rules().is_empty());
        assert_eq!(ch.postponed_rules().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_rule_sets_match() {
        let ch: Channel<()> = Channel::new("e", "n");
        assert!(ch.match_immediate(&json!({}), &()).await);
        assert!(ch.match_postponed(&json!({}), &()).await);
    }

    #[tokio::test]
    async fn test_failing_rule_is_no_match() {
        struct Broken;
        #[async_trait::async_trait]
        impl Rule<()> for Broken {
            async fn matches(&self, _: &Context, _: &()) -> ruleflow_core::Result<bool> {
                Err(ruleflow_core::FlowError::Rule("backend down".into()))
            }
        }

        let mut ch: Channel<()> = Channel::new("e", "n");
        ch.push_rule(Box::new(Broken), false);
        assert!(!ch.match_immediate(&json!({}), &()).await);
    }

    #[tokio::test]
    async fn test_rules_see_helpers() {
        let mut ch: Channel<u32> = Channel::new("e", "n");
        ch.push_rule(
            Box::new(FnRule::new("limit", |ctx: &Context, limit: &u32| {
                ctx["qty"].as_u64().unwrap_or(0) <= u64::from(*limit)
            })),
            false,
        );
        assert!(ch.match_immediate(&json!({"qty": 3}), &5).await);
        assert!(!ch.match_immediate(&json!({"qty": 9}), &5).await);
    }

    #[test]
    fn test_to_task_uses_delay() {
        let mut ch: Channel<()> = Channel::new("order:created", "remind");
        ch.set_delay(5);
        let task = ch.to_task(json!({"id": 1}), at(10)).unwrap();
        assert_eq!(task.channel(), "remind");
        assert_eq!(task.event(), "order:created");
        assert_eq!(task.date(), at(15));
        assert_eq!(task.flag(), None);
    }

    #[test]
    fn test_repeat_task_every_match() {
        let mut ch: Channel<()> = Channel::new("e", "n");
        assert!(!ch.should_repeat());
        assert!(ch.repeat_task(&dispatch(None), true).unwrap().is_none());

        ch.set_every(5);
        let next = ch.repeat_task(&dispatch(None), false).unwrap().unwrap();
        assert_eq!(next.date(), at(105));
        assert_eq!(next.flag(), Some(Flag::Available));
        assert_eq!(next.context(), &json!({"id": 7}));

        let next = ch.repeat_task(&dispatch(None), true).unwrap().unwrap();
        assert_eq!(next.flag(), Some(Flag::Available));
    }

    #[test]
    fn test_rising_edge_policy() {
        let mut ch: Channel<()> = Channel::new("e", "n");
        ch.set_every(5);
        ch.set_policy(TriggerPolicy::RisingEdge);

        // Matching tick marks the next delivery as already triggered.
        let next = ch.repeat_task(&dispatch(Some(Flag::Available)), true).unwrap().unwrap();
        assert_eq!(next.flag(), Some(Flag::Triggered));
        let next = ch.repeat_task(&dispatch(Some(Flag::Triggered)), false).unwrap().unwrap();
        assert_eq!(next.flag(), Some(Flag::Available));

        assert!(ch.should_trigger(&dispatch(None)));
        assert!(ch.should_trigger(&dispatch(Some(Flag::Available))));
        assert!(!ch.should_trigger(&dispatch(Some(Flag::Triggered))));
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let mut ch: Channel<()> = Channel::new("e", "n");
        ch.set_every(0);
        assert_eq!(ch.repeat_interval(), Some(1));
        let next = ch.repeat_task(&dispatch(None), false).unwrap().unwrap();
        assert_eq!(next.date(), at(101));
    }

    #[test]
    fn test_huge_delay_is_an_error() {
        let mut ch: Channel<()> = Channel::new("e", "n");
        ch.set_delay(u64::MAX);
        assert!(ch.to_task(json!({}), at(0)).unwrap_err().is_configuration());

        ch.set_every(u64::MAX);
        assert!(ch.repeat_task(&dispatch(None), true).is_err());
    }

    #[test]
    fn test_unknown_flag_still_triggers() {
        let mut ch: Channel<()> = Channel::new("e", "n");
        ch.set_policy(TriggerPolicy::RisingEdge);
        assert!(ch.should_trigger(&dispatch(Some(Flag::Unknown))));
    }

    #[test]
    fn test_every_match_always_triggers() {
        let ch: Channel<()> = Channel::new("e", "n");
        assert!(ch.should_trigger(&dispatch(Some(Flag::Triggered))));
    }
}
