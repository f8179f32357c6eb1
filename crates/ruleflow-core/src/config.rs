//! RuleFlow configuration system.
//!
//! A flow file declares engine settings, the helpers handed to every rule and
//! action, and the channels to register:
//!
//! ```toml
//! [engine]
//! tick_secs = 1
//!
//! [helpers]
//! region = "eu"
//!
//! [[channels]]
//! event = "order:created"
//! name = "remind"
//! after = 5
//! every = 60
//! trigger_policy = "rising_edge"
//!
//! [[channels.rules]]
//! pointer = "/status"
//! op = "eq"
//! value = "pending"
//!
//! [[channels.actions]]
//! kind = "log"
//! message = "order {{context/id}} still pending"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};
use crate::task::{MAX_DELAY_SECS, TriggerPolicy};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Opaque value passed unchanged to every rule and action.
    #[serde(default = "default_helpers")]
    pub helpers: serde_json::Value,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn default_helpers() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            helpers: default_helpers(),
            channels: Vec::new(),
        }
    }
}

impl FlowConfig {
    /// Load config from the default path (~/.ruleflow/flow.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FlowError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_secs == 0 {
            return Err(FlowError::Config("engine.tick_secs must be positive".into()));
        }
        for ch in &self.channels {
            if ch.every == Some(0) {
                return Err(FlowError::Config(format!(
                    "channel {}/{}: every must be positive",
                    ch.event, ch.name
                )));
            }
            if ch.after > MAX_DELAY_SECS || ch.every.is_some_and(|s| s > MAX_DELAY_SECS) {
                return Err(FlowError::Config(format!(
                    "channel {}/{}: after and every must not exceed {MAX_DELAY_SECS}s",
                    ch.event, ch.name
                )));
            }
            for rule in &ch.rules {
                if !rule.pointer.is_empty() && !rule.pointer.starts_with('/') {
                    return Err(FlowError::Config(format!(
                        "channel {}/{}: rule pointer '{}' must start with '/'",
                        ch.event, ch.name, rule.pointer
                    )));
                }
            }
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ruleflow")
            .join("flow.toml")
    }
}

/// Redelivery loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often the in-memory scheduler looks for due tasks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Stop the loop once no task is left in the queue.
    #[serde(default = "bool_true")]
    pub idle_exit: bool,
}

fn default_tick_secs() -> u64 { 1 }
fn bool_true() -> bool { true }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            idle_exit: true,
        }
    }
}

/// One `[[channels]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub name: String,
    /// Seconds before the first check (0 = check on arrival).
    #[serde(default)]
    pub after: u64,
    /// Seconds between repeated checks.
    #[serde(default)]
    pub every: Option<u64>,
    #[serde(default)]
    pub trigger_policy: TriggerPolicy,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// Field comparison against the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// JSON pointer into the context ("" = whole context).
    #[serde(default)]
    pub pointer: String,
    #[serde(default)]
    pub op: Comparison,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Force the rule into the postponed set.
    #[serde(default)]
    pub postponed: bool,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Exists,
    Contains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Log a message rendered from the context.
    Log {
        #[serde(default = "default_log_message")]
        message: String,
    },
}

fn default_log_message() -> String { "{{context}}".into() }
