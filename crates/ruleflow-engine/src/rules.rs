//! Built-in rules: constants, composites, closure adapter and field comparison.
//!
//! Composites wrap other rules behind the same [`Rule`] interface. An error
//! from an inner rule propagates unchanged, so a failing check stays a
//! non-match even under [`Not`].

use std::cmp::Ordering;

use async_trait::async_trait;
use ruleflow_core::config::{Comparison, RuleConfig};
use ruleflow_core::{Context, Result, Rule};

/// Accepts every context.
pub struct Always;

#[async_trait]
impl<H: Send + Sync + 'static> Rule<H> for Always {
    fn name(&self) -> &str {
        "always"
    }

    async fn matches(&self, _context: &Context, _helpers: &H) -> Result<bool> {
        Ok(true)
    }
}

/// Rejects every context.
pub struct Never;

#[async_trait]
impl<H: Send + Sync + 'static> Rule<H> for Never {
    fn name(&self) -> &str {
        "never"
    }

    async fn matches(&self, _context: &Context, _helpers: &H) -> Result<bool> {
        Ok(false)
    }
}

/// Negation.
pub struct Not<R>(pub R);

#[async_trait]
impl<H, R> Rule<H> for Not<R>
where
    H: Send + Sync + 'static,
    R: Rule<H>,
{
    fn name(&self) -> &str {
        "not"
    }

    async fn matches(&self, context: &Context, helpers: &H) -> Result<bool> {
        Ok(!self.0.matches(context, helpers).await?)
    }
}

/// Conjunction; short-circuits on the first rejection. Empty = true.
pub struct All<H: Send + Sync + 'static> {
    rules: Vec<Box<dyn Rule<H>>>,
}

impl<H: Send + Sync + 'static> All<H> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, rule: impl Rule<H> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

impl<H: Send + Sync + 'static> Default for All<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<H: Send + Sync + 'static> Rule<H> for All<H> {
    fn name(&self) -> &str {
        "all"
    }

    async fn matches(&self, context: &Context, helpers: &H) -> Result<bool> {
        for rule in &self.rules {
            if !rule.matches(context, helpers).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Disjunction; short-circuits on the first acceptance. Empty = false.
pub struct Any<H: Send + Sync + 'static> {
    rules: Vec<Box<dyn Rule<H>>>,
}

impl<H: Send + Sync + 'static> Any<H> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, rule: impl Rule<H> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

impl<H: Send + Sync + 'static> Default for Any<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<H: Send + Sync + 'static> Rule<H> for Any<H> {
    fn name(&self) -> &str {
        "any"
    }

    async fn matches(&self, context: &Context, helpers: &H) -> Result<bool> {
        for rule in &self.rules {
            if rule.matches(context, helpers).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Synchronous predicate as a rule.
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F> {
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

#[async_trait]
impl<H, F> Rule<H> for FnRule<F>
where
    H: Send + Sync + 'static,
    F: Fn(&Context, &H) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn matches(&self, context: &Context, helpers: &H) -> Result<bool> {
        Ok((self.f)(context, helpers))
    }
}

/// Compare the value at a JSON pointer with a constant.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    pointer: String,
    op: Comparison,
    value: serde_json::Value,
}

impl FieldRule {
    pub fn new(pointer: &str, op: Comparison, value: serde_json::Value) -> Self {
        Self {
            name: format!("field{pointer}:{op:?}").to_lowercase(),
            pointer: pointer.to_string(),
            op,
            value,
        }
    }

    pub fn from_config(config: &RuleConfig) -> Self {
        Self::new(&config.pointer, config.op, config.value.clone())
    }

    fn evaluate(&self, context: &Context) -> bool {
        let actual = context.pointer(&self.pointer);
        match self.op {
            Comparison::Exists => actual.is_some_and(|v| !v.is_null()),
            Comparison::Eq => actual.is_some_and(|v| json_eq(v, &self.value)),
            Comparison::Ne => !actual.is_some_and(|v| json_eq(v, &self.value)),
            Comparison::Gt => compare(actual, &self.value).is_some_and(|o| o.is_gt()),
            Comparison::Ge => compare(actual, &self.value).is_some_and(|o| o.is_ge()),
            Comparison::Lt => compare(actual, &self.value).is_some_and(|o| o.is_lt()),
            Comparison::Le => compare(actual, &self.value).is_some_and(|o| o.is_le()),
            Comparison::Contains => match actual {
                Some(serde_json::Value::String(s)) => {
                    self.value.as_str().is_some_and(|needle| s.contains(needle))
                }
                Some(serde_json::Value::Array(items)) => {
                    items.iter().any(|item| json_eq(item, &self.value))
                }
                _ => false,
            },
        }
    }
}

#[async_trait]
impl<H: Send + Sync + 'static> Rule<H> for FieldRule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn matches(&self, context: &Context, _helpers: &H) -> Result<bool> {
        Ok(self.evaluate(context))
    }
}

/// Numbers compare by value, so `1` equals `1.0`. Integers compare exactly;
/// floats are used only when either side has a fraction.
fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a, b) {
        (serde_json::Value::Number(x), serde_json::Value::Number(y)) => {
            number_cmp(x, y).is_some_and(|o| o.is_eq())
        }
        _ => a == b,
    }
}

fn compare(actual: Option<&serde_json::Value>, expected: &serde_json::Value) -> Option<Ordering> {
    match (actual?, expected) {
        (serde_json::Value::Number(x), serde_json::Value::Number(y)) => number_cmp(x, y),
        (serde_json::Value::String(x), serde_json::Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn number_cmp(x: &serde_json::Number, y: &serde_json::Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    // Mixed sign with one side above i64::MAX.
    match (x.as_i64(), y.as_u64(), x.as_u64(), y.as_i64()) {
        (Some(_), Some(_), None, _) => return Some(Ordering::Less),
        (_, None, Some(_), Some(_)) => return Some(Ordering::Greater),
        _ => {}
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}
