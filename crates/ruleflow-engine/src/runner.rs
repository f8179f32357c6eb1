//! Redelivery loop: feeds due tasks from a [`MemoryScheduler`] back into a flow.
//! Uses tokio::interval, so it sleeps between checks.
//!
//! Tasks are processed one at a time, which keeps redeliveries for a channel
//! from overlapping.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::flow::Flow;
use crate::memory::MemoryScheduler;

/// Counters for one or more redelivery passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedeliveryStats {
    /// Tasks handed to `Flow::process`.
    pub processed: u64,
    /// Tasks whose channel fired its actions.
    pub triggered: u64,
    /// Tasks that ended in an expected rejection (no match, early, unknown).
    pub rejected: u64,
    /// Tasks that failed for any other reason.
    pub failed: u64,
}

impl RedeliveryStats {
    fn absorb(&mut self, other: RedeliveryStats) {
        self.processed += other.processed;
        self.triggered += other.triggered;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

/// Process every task due at `now`, earliest first.
pub async fn redeliver_due<H: Send + Sync + 'static>(
    flow: &Flow<H>,
    scheduler: &MemoryScheduler,
    now: DateTime<Utc>,
) -> RedeliveryStats {
    let mut stats = RedeliveryStats::default();

    for task in scheduler.take_due(now).await {
        stats.processed += 1;
        match flow.process_at(&task, now).await {
            Ok(done) if done.fired > 0 => {
                stats.triggered += 1;
                if !done.failures.is_empty() {
                    tracing::warn!(
                        "⚠️ {}/{}: {} of {} actions failed",
                        task.event(),
                        task.channel(),
                        done.failures.len(),
                        done.fired
                    );
                }
            }
            Ok(_) => {}
            Err(e) if e.is_expected() => {
                tracing::debug!("{}/{} not triggered: {e}", task.event(), task.channel());
                stats.rejected += 1;
            }
            Err(e) => {
                tracing::warn!("⚠️ {}/{} failed: {e}", task.event(), task.channel());
                stats.failed += 1;
            }
        }
    }

    stats
}

/// Spawn the redelivery loop as a background tokio task.
pub fn spawn_redelivery<H: Send + Sync + 'static>(
    flow: Arc<Flow<H>>,
    scheduler: Arc<MemoryScheduler>,
    tick: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("⏰ Redelivery loop started (check every {:?})", tick);
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            redeliver_due(&flow, &scheduler, Utc::now()).await;
        }
    })
}

/// Drive redelivery until the queue drains, or until `max_ticks` passes when
/// given (repeating channels never drain on their own).
pub async fn run_until_idle<H: Send + Sync + 'static>(
    flow: &Flow<H>,
    scheduler: &MemoryScheduler,
    tick: Duration,
    max_ticks: Option<u64>,
) -> RedeliveryStats {
    let mut stats = RedeliveryStats::default();
    let mut interval = tokio::time::interval(tick);
    let mut ticks = 0u64;

    while !scheduler.is_empty().await {
        if max_ticks.is_some_and(|max| ticks >= max) {
            tracing::info!(
                "⏹️ Stopping after {ticks} ticks with {} tasks queued",
                scheduler.len().await
            );
            break;
        }
        interval.tick().await;
        ticks += 1;
        stats.absorb(redeliver_due(flow, scheduler, Utc::now()).await);
    }

    stats
}
