//! Action trait: the side effect a channel fires once its rules hold.

use async_trait::async_trait;

use crate::error::Result;
use crate::task::Context;

#[async_trait]
pub trait Action<H>: Send + Sync
where
    H: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "action"
    }

    /// Run the effect. Failures belong to the action; the flow only records them.
    async fn fire(&self, context: &Context, helpers: &H) -> Result<()>;
}
