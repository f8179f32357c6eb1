//! Scheduler trait: the acknowledge boundary.
//!
//! The engine never sleeps on its own. Whenever a channel wants to be checked
//! again later it hands a [`Task`] to the scheduler, which owns durability and
//! timing and must redeliver the task to `Flow::process` once `task.date()`
//! has passed. Redeliveries of the same task must not overlap.

use async_trait::async_trait;

use crate::error::Result;
use crate::task::Task;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Hold `task` and redeliver it once due.
    async fn schedule(&self, task: Task) -> Result<()>;
}
