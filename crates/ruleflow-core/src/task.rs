//! Task model: the snapshot handed to the scheduler and redelivered to the flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Longest delay or repeat interval accepted, in seconds (about 136 years).
pub const MAX_DELAY_SECS: u64 = u32::MAX as u64;

/// Event payload carried by messages and tasks.
pub type Context = serde_json::Value;

/// Delivery marker carried by a task.
///
/// A task without a flag is the first delivery for its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Repeat delivery; the previous tick did not fire actions.
    Available,
    /// Repeat delivery; the previous tick matched (edge-triggered channels only).
    Triggered,
    /// Any other marker written by an external queue. Treated as a repeat
    /// delivery that has not triggered.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Available => write!(f, "available"),
            Flag::Triggered => write!(f, "triggered"),
            Flag::Unknown => write!(f, "unknown"),
        }
    }
}

/// When a channel fires its actions after the postponed rules match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Fire on every matching check.
    #[default]
    EveryMatch,
    /// Fire once per transition into the matching state. Repeat tasks carry
    /// [`Flag::Triggered`] while the rules keep matching.
    RisingEdge,
}

/// "Check this channel again at `date` with this context."
///
/// Immutable once built. The serialized record is
/// `{channel, event, date, flag, context}`; `name` is accepted for `channel`
/// when reading a record back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "name")]
    channel: String,
    event: String,
    date: DateTime<Utc>,
    #[serde(default)]
    flag: Option<Flag>,
    #[serde(default)]
    context: Context,
}

impl Task {
    /// Build a task due at an absolute instant.
    pub fn new(
        channel: &str,
        event: &str,
        date: DateTime<Utc>,
        flag: Option<Flag>,
        context: Context,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            event: event.to_string(),
            date,
            flag,
            context,
        }
    }

    /// Build a task due `delay_secs` after `now`.
    ///
    /// Fails with `Config` when the delay exceeds [`MAX_DELAY_SECS`] or the
    /// due date falls outside the representable range.
    pub fn due_in(
        channel: &str,
        event: &str,
        delay_secs: u64,
        flag: Option<Flag>,
        context: Context,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let date = due_date(now, delay_secs).ok_or_else(|| {
            FlowError::Config(format!(
                "{event}/{channel}: delay of {delay_secs}s is out of range"
            ))
        })?;
        Ok(Self::new(channel, event, date, flag, context))
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn flag(&self) -> Option<Flag> {
        self.flag
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether the task may be processed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.date
    }

    /// Render as a plain JSON record for an external queue.
    pub fn to_record(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Read a record redelivered by an external queue.
    pub fn from_record(record: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(record)?)
    }
}

fn due_date(now: DateTime<Utc>, delay_secs: u64) -> Option<DateTime<Utc>> {
    if delay_secs > MAX_DELAY_SECS {
        return None;
    }
    let secs = i64::try_from(delay_secs).ok()?;
    now.checked_add_signed(chrono::TimeDelta::try_seconds(secs)?)
}
