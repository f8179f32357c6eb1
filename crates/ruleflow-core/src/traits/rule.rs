//! Rule trait: a predicate over a context and the shared helpers.

use async_trait::async_trait;

use crate::error::Result;
use crate::task::Context;

/// A condition a channel checks before scheduling or firing.
///
/// Rules may suspend (I/O-bound checks). An `Err` counts as "no match".
#[async_trait]
pub trait Rule<H>: Send + Sync
where
    H: Send + Sync + 'static,
{
    /// Short label used in logs.
    fn name(&self) -> &str {
        "rule"
    }

    /// Does the context satisfy this rule?
    async fn matches(&self, context: &Context, helpers: &H) -> Result<bool>;
}
