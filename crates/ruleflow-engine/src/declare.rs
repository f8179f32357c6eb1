//! Register channels declared in a [`FlowConfig`].

use ruleflow_core::config::{ActionConfig, ChannelConfig};
use ruleflow_core::{FlowConfig, Result};

use crate::actions::LogAction;
use crate::builder::ChannelBuilder;
use crate::flow::Flow;
use crate::rules::{FieldRule, Not};

/// Register every `[[channels]]` entry. Returns how many were added.
///
/// Stops at the first configuration error (missing event or name, duplicate
/// pair); channels declared before it stay registered.
pub fn declare<H: Send + Sync + 'static>(flow: &mut Flow<H>, config: &FlowConfig) -> Result<usize> {
    for channel in &config.channels {
        declare_channel(flow, channel)?;
    }
    Ok(config.channels.len())
}

fn declare_channel<H: Send + Sync + 'static>(flow: &mut Flow<H>, config: &ChannelConfig) -> Result<()> {
    let mut builder = flow
        .subscribe(&config.event)
        .channel(&config.name)?
        .after(config.after)
        .trigger_policy(config.trigger_policy);
    if let Some(every) = config.every {
        builder = builder.every(every);
    }

    for rule in &config.rules {
        let field = FieldRule::from_config(rule);
        builder = match (rule.negate, rule.postponed) {
            (false, false) => builder.comply(field),
            (false, true) => builder.comply_postponed(field),
            (true, false) => builder.comply(Not(field)),
            (true, true) => builder.comply_postponed(Not(field)),
        };
    }

    for action in &config.actions {
        builder = add_action(builder, action);
    }
    Ok(())
}

fn add_action<'a, H: Send + Sync + 'static>(
    builder: ChannelBuilder<'a, H>,
    action: &ActionConfig,
) -> ChannelBuilder<'a, H> {
    match action {
        ActionConfig::Log { message } => builder.trigger(LogAction::new(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScheduler;
    use chrono::DateTime;
    use ruleflow_core::{FlowError, Task, TriggerPolicy};
    use serde_json::json;
    use std::sync::Arc;

    const CONFIG: &str = r#"
        [[channels]]
        event = "order:created"
        name = "remind"
        after = 300
        every = 600
        trigger_policy = "rising_edge"

        [[channels.rules]]
        pointer = "/status"
        value = "pending"

        [[channels.rules]]
        pointer = "/test"
        op = "exists"
        negate = true

        [[channels.actions]]
        kind = "log"
        message = "order {{context/id}} still pending"

        [[channels]]
        event = "order:created"
        name = "welcome"

        [[channels.rules]]
        pointer = "/customer/new"
        value = true
    "#;

    #[tokio::test]
    async fn test_declare_from_config() {
        let config = FlowConfig::parse(CONFIG).unwrap();
        let sched = Arc::new(MemoryScheduler::new());
        let mut flow = Flow::new(json!({}), sched.clone());

        assert_eq!(declare(&mut flow, &config).unwrap(), 2);

        let remind = flow.find("order:created", "remind").unwrap();
        assert_eq!(remind.delay(), 300);
        assert_eq!(remind.repeat_interval(), Some(600));
        assert_eq!(remind.trigger_policy(), TriggerPolicy::RisingEdge);
        assert_eq!(remind.postponed_rules().len(), 2);
        assert_eq!(remind.action_count(), 1);

        let welcome = flow.find("order:created", "welcome").unwrap();
        assert_eq!(welcome.immediate_rules().len(), 1);

        // "welcome" rejects a returning customer, so the aggregate fails.
        let each = flow
            .message_each(
                "order:created",
                json!({"id": 9, "status": "pending", "customer": {"new": false}}),
                DateTime::from_timestamp(0, 0).unwrap(),
            )
            .await;
        assert!(each[0].1.is_ok());
        assert!(each[1].1.is_err());

        let task: &Task = each[0].1.as_ref().unwrap();
        let done = flow.process_at(task, task.date()).await.unwrap();
        assert_eq!(done.fired, 1);
    }

    #[test]
    fn test_declare_rejects_duplicates() {
        let config = FlowConfig::parse(
            r#"
            [[channels]]
            event = "a"
            name = "b"
            [[channels]]
            event = "a"
            name = "b"
            "#,
        )
        .unwrap();
        let mut flow = Flow::new((), Arc::new(MemoryScheduler::new()));
        let err = declare(&mut flow, &config).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateChannel { .. }));
        assert_eq!(flow.channels().len(), 1);
    }

    #[test]
    fn test_declare_rejects_missing_name() {
        let config = FlowConfig::parse("[[channels]]\nevent = \"a\"\n").unwrap();
        let mut flow = Flow::new((), Arc::new(MemoryScheduler::new()));
        assert!(matches!(
            declare(&mut flow, &config),
            Err(FlowError::MissingName)
        ));
    }
}
