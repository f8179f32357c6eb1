//! RuleFlow error types.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Which rule set rejected a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Rules evaluated when the event arrives.
    Immediate,
    /// Rules evaluated when a scheduled task comes due.
    Postponed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Immediate => write!(f, "immediate"),
            Stage::Postponed => write!(f, "postponed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    // Declaration time.
    #[error("Channel event is compulsory")]
    MissingEvent,

    #[error("Channel name is compulsory")]
    MissingName,

    #[error("Channel already exists: {event}/{name}")]
    DuplicateChannel { event: String, name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // Dispatch time, expected outcomes.
    #[error("No channel subscribed to event '{0}'")]
    NoChannels(String),

    #[error("{stage} rules rejected context for {event}/{channel}")]
    NoMatch {
        event: String,
        channel: String,
        stage: Stage,
    },

    #[error("Unknown channel: {event}/{channel}")]
    UnknownChannel { event: String, channel: String },

    #[error("Task {event}/{channel} is not due until {due}")]
    NotDue {
        event: String,
        channel: String,
        due: DateTime<Utc>,
    },

    // External collaborators.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Rule error: {0}")]
    Rule(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// True for outcomes callers should treat as a normal branch rather than a bug:
    /// rules that did not match, and tasks that are early or point nowhere.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            FlowError::NoChannels(_)
                | FlowError::NoMatch { .. }
                | FlowError::UnknownChannel { .. }
                | FlowError::NotDue { .. }
        )
    }

    /// True for errors raised while declaring channels.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FlowError::MissingEvent
                | FlowError::MissingName
                | FlowError::DuplicateChannel { .. }
                | FlowError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(FlowError::MissingName.is_configuration());
        assert!(!FlowError::MissingName.is_expected());

        let no_match = FlowError::NoMatch {
            event: "order:created".into(),
            channel: "remind".into(),
            stage: Stage::Postponed,
        };
        assert!(no_match.is_expected());
        assert_eq!(
            no_match.to_string(),
            "postponed rules rejected context for order:created/remind"
        );

        assert!(!FlowError::Scheduler("down".into()).is_expected());
    }

    #[test]
    fn test_duplicate_message() {
        let err = FlowError::DuplicateChannel {
            event: "yellow:submarine".into(),
            name: "emerge".into(),
        };
        assert!(err.to_string().starts_with("Channel already exists"));
    }
}
