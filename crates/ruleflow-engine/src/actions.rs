//! Built-in actions: closure adapter and a log sink.

use async_trait::async_trait;
use ruleflow_core::{Action, Context, Result};

/// Synchronous effect as an action.
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

#[async_trait]
impl<H, F> Action<H> for FnAction<F>
where
    H: Send + Sync + 'static,
    F: Fn(&Context, &H) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn fire(&self, context: &Context, helpers: &H) -> Result<()> {
        (self.f)(context, helpers)
    }
}

/// Log a message rendered from the context.
///
/// Template variables: `{{context}}` (whole payload as JSON) and
/// `{{context/<pointer>}}` (a single field, strings unquoted).
#[derive(Debug, Clone)]
pub struct LogAction {
    message: String,
}

impl LogAction {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn render(&self, context: &Context) -> String {
        let mut out = String::with_capacity(self.message.len());
        let mut rest = self.message.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = after[..end].trim();
            match key.strip_prefix("context") {
                Some("") => out.push_str(&context.to_string()),
                Some(pointer) if pointer.starts_with('/') => {
                    match context.pointer(pointer) {
                        Some(serde_json::Value::String(s)) => out.push_str(s),
                        Some(v) => out.push_str(&v.to_string()),
                        None => {}
                    }
                }
                _ => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

#[async_trait]
impl<H: Send + Sync + 'static> Action<H> for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    async fn fire(&self, context: &Context, _helpers: &H) -> Result<()> {
        tracing::info!("📢 {}", self.render(context));
        Ok(())
    }
}
